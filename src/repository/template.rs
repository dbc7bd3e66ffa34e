//! Template repository implementation backed by Diesel.
//!
//! The `templates.owner_id` column is unique, so every owner has at most
//! one template and [`TemplateWriter::upsert_template`] replaces it in place.

use chrono::Utc;
use diesel::prelude::*;

use crate::domain::types::OwnerId;
use crate::domain::{NewTemplate as DomainNewTemplate, Template as DomainTemplate};
use crate::models::template::{NewTemplate as DbNewTemplate, Template as DbTemplate};
use crate::repository::errors::RepositoryResult;
use crate::repository::{DieselRepository, TemplateReader, TemplateWriter};

impl TemplateReader for DieselRepository {
    fn get_template(&self, owner_id: OwnerId) -> RepositoryResult<Option<DomainTemplate>> {
        use crate::schema::templates;
        let mut conn = self.conn()?;
        let result = templates::table
            .filter(templates::owner_id.eq(owner_id.get()))
            .select(DbTemplate::as_select())
            .first::<DbTemplate>(&mut conn)
            .optional()?;
        Ok(result.map(Into::into))
    }
}

impl TemplateWriter for DieselRepository {
    fn upsert_template(&self, template: &DomainNewTemplate) -> RepositoryResult<DomainTemplate> {
        use crate::schema::templates;
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let new_template = DbNewTemplate::from_domain(template, now);

        let stored: DbTemplate = diesel::insert_into(templates::table)
            .values(&new_template)
            .on_conflict(templates::owner_id)
            .do_update()
            .set((
                templates::name.eq(new_template.name),
                templates::subject.eq(new_template.subject),
                templates::body.eq(new_template.body),
                templates::updated_at.eq(now),
            ))
            .returning(DbTemplate::as_returning())
            .get_result(&mut conn)?;

        Ok(stored.into())
    }
}
