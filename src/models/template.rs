use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::types::{OwnerId, TemplateId};
use crate::domain::{NewTemplate as DomainNewTemplate, Template as DomainTemplate};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::templates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Template {
    pub id: i32,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::templates)]
pub struct NewTemplate<'a> {
    pub name: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl<'a> NewTemplate<'a> {
    pub fn from_domain(template: &'a DomainNewTemplate, now: NaiveDateTime) -> Self {
        Self {
            name: template.name.as_str(),
            subject: template.subject_pattern.as_str(),
            body: template.body_pattern.as_str(),
            owner_id: template.owner_id.get(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<Template> for DomainTemplate {
    fn from(template: Template) -> Self {
        Self {
            id: TemplateId::new(template.id),
            name: template.name,
            subject_pattern: template.subject,
            body_pattern: template.body,
            owner_id: OwnerId::new(template.owner_id),
            updated_at: template.updated_at,
        }
    }
}
