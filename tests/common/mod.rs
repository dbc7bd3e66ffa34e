//! Helpers for integration tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use pushkind_pigeon::campaign::message_builder::ComposedMessage;
use pushkind_pigeon::db::{DbPool, establish_connection_pool};
use pushkind_pigeon::domain::types::OwnerId;
use pushkind_pigeon::domain::{Credentials, NewRecipient, NewTemplate, Recipient};
use pushkind_pigeon::models::account::NewAccount;
use pushkind_pigeon::repository::{DieselRepository, RecipientWriter, TemplateWriter};
use pushkind_pigeon::schema::accounts;
use pushkind_pigeon::transport::{Mailer, Stage, TransportCause, TransportError};
use tempfile::TempDir;
use tokio::time::Instant;

const SCHEMA: &str = include_str!("../../migrations/2026-01-01-000000_init/up.sql");

/// Temporary database used in integration tests.
pub struct TestDb {
    _dir: TempDir,
    pool: DbPool,
}

impl TestDb {
    #[allow(dead_code)]
    pub fn new(db_name: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir.");
        let path = dir.path().join(db_name);
        let pool = establish_connection_pool(path.to_str().expect("utf-8 temp path"))
            .expect("Failed to establish SQLite connection.");
        pool.get()
            .expect("Failed to get SQLite connection from pool.")
            .batch_execute(SCHEMA)
            .expect("Failed to create schema.");
        TestDb { _dir: dir, pool }
    }

    #[allow(dead_code)]
    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    #[allow(dead_code)]
    pub fn repo(&self) -> DieselRepository {
        DieselRepository::new(self.pool.clone())
    }
}

#[allow(dead_code)]
pub fn insert_account(pool: &DbPool, name: &str, credentials: Option<(&str, &str)>) -> OwnerId {
    let mut conn = pool.get().unwrap();
    let login = format!("{}@login.test", name.to_lowercase());
    let id: i32 = diesel::insert_into(accounts::table)
        .values(&NewAccount {
            name,
            email: &login,
            professional_email: credentials.map(|(address, _)| address),
            mail_app_password: credentials.map(|(_, secret)| secret),
        })
        .returning(accounts::id)
        .get_result(&mut conn)
        .unwrap();
    OwnerId::new(id)
}

#[allow(dead_code)]
pub fn insert_template(repo: &DieselRepository, owner_id: OwnerId, body: &str) {
    repo.upsert_template(&NewTemplate {
        owner_id,
        name: "Outreach".into(),
        subject_pattern: "Opportunities at {company}".into(),
        body_pattern: body.into(),
    })
    .unwrap();
}

#[allow(dead_code)]
pub fn insert_recipients(repo: &DieselRepository, owner_id: OwnerId, count: usize) -> Vec<Recipient> {
    (1..=count)
        .map(|n| {
            repo.create_recipient(&NewRecipient {
                owner_id,
                display_name: format!("Contact {n}"),
                organization_name: format!("Company {n}"),
                email_address: format!("contact{n}@company.test"),
            })
            .unwrap()
        })
        .collect()
}

/// Owner with credentials, a template and `count` pending recipients.
#[allow(dead_code)]
pub fn seed_campaign(db: &TestDb, count: usize) -> (OwnerId, Vec<Recipient>) {
    let owner_id = insert_account(
        &db.pool(),
        "Harriet",
        Some(("harriet@agency.test", "app-password")),
    );
    let repo = db.repo();
    insert_template(&repo, owner_id, "Hi {name} at {company}");
    let recipients = insert_recipients(&repo, owner_id, count);
    (owner_id, recipients)
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Delivery {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub at: Instant,
}

type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// [`Mailer`] double that records every attempt.
#[derive(Default)]
pub struct RecordingMailer {
    deliveries: Mutex<Vec<Delivery>>,
    failing: HashSet<String>,
    hook: Option<Hook>,
}

#[allow(dead_code)]
impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every message addressed to `address`.
    pub fn failing_for(mut self, address: &str) -> Self {
        self.failing.insert(address.to_owned());
        self
    }

    /// Runs `hook` with the recipient address before each delivery.
    pub fn on_deliver(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.deliveries().into_iter().map(|d| d.to).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(
        &self,
        message: &ComposedMessage,
        credentials: &Credentials,
    ) -> Result<(), TransportError> {
        if let Some(hook) = &self.hook {
            hook(&message.to_address);
        }
        self.deliveries.lock().unwrap().push(Delivery {
            to: message.to_address.clone(),
            subject: message.subject.clone(),
            body: message.html_body.clone(),
            sender: credentials.sender_address.clone(),
            at: Instant::now(),
        });
        if self.failing.contains(&message.to_address) {
            return Err(TransportError::new(
                Stage::RcptTo,
                TransportCause::Rejected {
                    code: 550,
                    reply: "5.1.1 mailbox unavailable".into(),
                },
            ));
        }
        Ok(())
    }
}
