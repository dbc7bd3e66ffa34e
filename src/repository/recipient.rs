//! Recipient repository implementation backed by Diesel.
//!
//! Provides [`RecipientReader`] and [`RecipientWriter`] trait
//! implementations for [`DieselRepository`].

use chrono::Utc;
use diesel::prelude::*;

use crate::domain::types::{OwnerId, RecipientId};
use crate::domain::{NewRecipient as DomainNewRecipient, Recipient as DomainRecipient};
use crate::models::recipient::{NewRecipient as DbNewRecipient, Recipient as DbRecipient};
use crate::repository::errors::{RepositoryError, RepositoryResult};
use crate::repository::{DieselRepository, RecipientReader, RecipientWriter};

impl RecipientReader for DieselRepository {
    fn list_pending(&self, owner_id: OwnerId) -> RepositoryResult<Vec<DomainRecipient>> {
        use crate::schema::recipients;
        let mut conn = self.conn()?;

        let result = recipients::table
            .filter(recipients::owner_id.eq(owner_id.get()))
            .filter(recipients::is_sent.eq(false))
            .order(recipients::id.asc())
            .select(DbRecipient::as_select())
            .load::<DbRecipient>(&mut conn)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    fn list_all(&self, owner_id: OwnerId) -> RepositoryResult<Vec<DomainRecipient>> {
        use crate::schema::recipients;
        let mut conn = self.conn()?;

        let result = recipients::table
            .filter(recipients::owner_id.eq(owner_id.get()))
            .order(recipients::id.asc())
            .select(DbRecipient::as_select())
            .load::<DbRecipient>(&mut conn)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    fn get_recipient_by_id(&self, id: RecipientId) -> RepositoryResult<Option<DomainRecipient>> {
        use crate::schema::recipients;
        let mut conn = self.conn()?;

        let result = recipients::table
            .filter(recipients::id.eq(id.get()))
            .select(DbRecipient::as_select())
            .first::<DbRecipient>(&mut conn)
            .optional()?;

        Ok(result.map(Into::into))
    }
}

impl RecipientWriter for DieselRepository {
    fn create_recipient(
        &self,
        recipient: &DomainNewRecipient,
    ) -> RepositoryResult<DomainRecipient> {
        use crate::schema::recipients;

        if recipient.email_address.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "recipient email address is empty".to_owned(),
            ));
        }

        let mut conn = self.conn()?;
        let new_recipient = DbNewRecipient::from_domain(recipient, Utc::now().naive_utc());

        let inserted: DbRecipient = diesel::insert_into(recipients::table)
            .values(&new_recipient)
            .returning(DbRecipient::as_returning())
            .get_result(&mut conn)?;

        Ok(inserted.into())
    }

    fn mark_sent(&self, id: RecipientId) -> RepositoryResult<()> {
        use crate::schema::recipients;
        let mut conn = self.conn()?;

        let updated = diesel::update(recipients::table.filter(recipients::id.eq(id.get())))
            .set((
                recipients::is_sent.eq(true),
                recipients::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut conn)?;

        match updated {
            0 => Err(RepositoryError::NotFound),
            _ => Ok(()),
        }
    }
}
