use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::types::{DeliveryState, OwnerId, RecipientId};
use crate::domain::{NewRecipient as DomainNewRecipient, Recipient as DomainRecipient};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::recipients)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Recipient {
    pub id: i32,
    pub name: String,
    pub company_name: String,
    pub email: String,
    pub is_sent: bool,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::recipients)]
pub struct NewRecipient<'a> {
    pub name: &'a str,
    pub company_name: &'a str,
    pub email: &'a str,
    pub is_sent: bool,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl<'a> NewRecipient<'a> {
    pub fn from_domain(recipient: &'a DomainNewRecipient, now: NaiveDateTime) -> Self {
        Self {
            name: recipient.display_name.as_str(),
            company_name: recipient.organization_name.as_str(),
            email: recipient.email_address.as_str(),
            is_sent: false,
            owner_id: recipient.owner_id.get(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<Recipient> for DomainRecipient {
    fn from(recipient: Recipient) -> Self {
        Self {
            id: RecipientId::new(recipient.id),
            display_name: recipient.name,
            organization_name: recipient.company_name,
            email_address: recipient.email,
            delivery_state: DeliveryState::from(recipient.is_sent),
            owner_id: OwnerId::new(recipient.owner_id),
            created_at: recipient.created_at,
        }
    }
}
