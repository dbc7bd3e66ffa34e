use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::types::OwnerId;
use crate::domain::{Account as DomainAccount, Credentials};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::accounts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Account {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub professional_email: Option<String>,
    pub mail_app_password: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::accounts)]
pub struct NewAccount<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub professional_email: Option<&'a str>,
    pub mail_app_password: Option<&'a str>,
}

impl From<Account> for DomainAccount {
    fn from(account: Account) -> Self {
        let credentials = Credentials::from_parts(
            account.professional_email.as_deref(),
            account.mail_app_password.as_deref(),
        );
        Self {
            id: OwnerId::new(account.id),
            display_name: account.name,
            credentials,
        }
    }
}
