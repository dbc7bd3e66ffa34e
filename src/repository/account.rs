//! Account repository implementation backed by Diesel.
//!
//! Supplies the [`AccountReader`] trait for [`DieselRepository`].

use diesel::prelude::*;

use crate::domain::Account as DomainAccount;
use crate::domain::types::OwnerId;
use crate::models::account::Account as DbAccount;
use crate::repository::errors::RepositoryResult;
use crate::repository::{AccountReader, DieselRepository};

impl AccountReader for DieselRepository {
    fn get_account_by_id(&self, id: OwnerId) -> RepositoryResult<Option<DomainAccount>> {
        use crate::schema::accounts;
        let mut conn = self.conn()?;
        let result = accounts::table
            .filter(accounts::id.eq(id.get()))
            .select(DbAccount::as_select())
            .first::<DbAccount>(&mut conn)
            .optional()?;
        Ok(result.map(Into::into))
    }
}
