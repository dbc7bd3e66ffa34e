//! Repository interfaces and Diesel-backed implementation.
//!
//! The campaign engine only sees the store through the traits defined here:
//! recipients, the owner's account (credentials) and the owner's template.
//! [`DieselRepository`] implements all of them on top of a Diesel
//! connection pool.

use crate::db::{DbConnection, DbPool};
use crate::domain::types::{OwnerId, RecipientId};
use crate::domain::{Account, Credentials, NewRecipient, NewTemplate, Recipient, Template};

pub mod account;
pub mod errors;
pub mod recipient;
pub mod template;

use errors::RepositoryResult;

/// Concrete repository backed by a Diesel connection pool.
#[derive(Clone)]
pub struct DieselRepository {
    pool: DbPool, // r2d2::Pool is cheap to clone
}

impl DieselRepository {
    /// Creates a new [`DieselRepository`] from the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}

/// Read-only operations for recipients.
pub trait RecipientReader {
    /// Lists the owner's recipients still waiting for the campaign message,
    /// in store order.
    fn list_pending(&self, owner_id: OwnerId) -> RepositoryResult<Vec<Recipient>>;

    /// Lists every recipient of the owner regardless of delivery state.
    fn list_all(&self, owner_id: OwnerId) -> RepositoryResult<Vec<Recipient>>;

    /// Retrieves a recipient by ID.
    fn get_recipient_by_id(&self, id: RecipientId) -> RepositoryResult<Option<Recipient>>;
}

/// Write operations for recipients.
pub trait RecipientWriter {
    /// Persists a new pending recipient.
    fn create_recipient(&self, recipient: &NewRecipient) -> RepositoryResult<Recipient>;

    /// Records a successful delivery. The state never moves back to pending.
    ///
    /// # Example
    /// ```no_run
    /// use pushkind_pigeon::domain::types::RecipientId;
    /// use pushkind_pigeon::repository::{DieselRepository, RecipientWriter};
    /// # fn demo(repo: &DieselRepository) {
    /// let _ = repo.mark_sent(RecipientId::new(1));
    /// # }
    /// ```
    fn mark_sent(&self, id: RecipientId) -> RepositoryResult<()>;
}

/// Read-only operations for accounts.
pub trait AccountReader {
    /// Retrieves an account by its identifier.
    fn get_account_by_id(&self, id: OwnerId) -> RepositoryResult<Option<Account>>;

    /// Returns the sender credentials of the owner, if fully configured.
    fn get_credentials(&self, owner_id: OwnerId) -> RepositoryResult<Option<Credentials>> {
        Ok(self
            .get_account_by_id(owner_id)?
            .and_then(|account| account.credentials))
    }
}

/// Read-only operations for templates.
pub trait TemplateReader {
    /// Retrieves the owner's single template.
    fn get_template(&self, owner_id: OwnerId) -> RepositoryResult<Option<Template>>;
}

/// Write operations for templates.
pub trait TemplateWriter {
    /// Creates the owner's template or replaces the existing one.
    fn upsert_template(&self, template: &NewTemplate) -> RepositoryResult<Template>;
}
