mod common;

use pushkind_pigeon::domain::NewTemplate;
use pushkind_pigeon::domain::types::{DeliveryState, OwnerId, RecipientId};
use pushkind_pigeon::repository::errors::RepositoryError;
use pushkind_pigeon::repository::{
    AccountReader, RecipientReader, RecipientWriter, TemplateReader, TemplateWriter,
};

#[test]
fn lists_pending_in_store_order() {
    let db = common::TestDb::new("lists_pending_in_store_order.db");
    let (owner_id, recipients) = common::seed_campaign(&db, 3);
    let repo = db.repo();

    repo.mark_sent(recipients[1].id).unwrap();

    let pending = repo.list_pending(owner_id).unwrap();
    let ids: Vec<_> = pending.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![recipients[0].id, recipients[2].id]);

    let all = repo.list_all(owner_id).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].delivery_state, DeliveryState::Sent);
}

#[test]
fn recipients_are_scoped_to_owner() {
    let db = common::TestDb::new("recipients_are_scoped_to_owner.db");
    let (owner_id, _) = common::seed_campaign(&db, 2);
    let other = common::insert_account(&db.pool(), "Other", None);
    let repo = db.repo();
    common::insert_recipients(&repo, other, 1);

    assert_eq!(repo.list_all(owner_id).unwrap().len(), 2);
    assert_eq!(repo.list_pending(other).unwrap().len(), 1);
}

#[test]
fn mark_sent_is_one_way() {
    let db = common::TestDb::new("mark_sent_is_one_way.db");
    let (_, recipients) = common::seed_campaign(&db, 1);
    let repo = db.repo();
    let id = recipients[0].id;

    assert_eq!(recipients[0].delivery_state, DeliveryState::Pending);
    repo.mark_sent(id).unwrap();
    repo.mark_sent(id).unwrap();

    let stored = repo.get_recipient_by_id(id).unwrap().unwrap();
    assert_eq!(stored.delivery_state, DeliveryState::Sent);
}

#[test]
fn mark_sent_reports_missing_recipient() {
    let db = common::TestDb::new("mark_sent_reports_missing_recipient.db");
    let repo = db.repo();

    let result = repo.mark_sent(RecipientId::new(42));

    assert!(matches!(result, Err(RepositoryError::NotFound)));
    assert!(repo.get_recipient_by_id(RecipientId::new(42)).unwrap().is_none());
}

#[test]
fn template_is_unique_per_owner() {
    let db = common::TestDb::new("template_is_unique_per_owner.db");
    let (owner_id, _) = common::seed_campaign(&db, 0);
    let repo = db.repo();
    let first = repo.get_template(owner_id).unwrap().unwrap();

    let replaced = repo
        .upsert_template(&NewTemplate {
            owner_id,
            name: "Follow-up".into(),
            subject_pattern: "Following up".into(),
            body_pattern: "Hello again {name}".into(),
        })
        .unwrap();

    assert_eq!(replaced.id, first.id);
    let stored = repo.get_template(owner_id).unwrap().unwrap();
    assert_eq!(stored.name, "Follow-up");
    assert_eq!(stored.body_pattern, "Hello again {name}");
}

#[test]
fn credentials_require_both_parts() {
    let db = common::TestDb::new("credentials_require_both_parts.db");
    let pool = db.pool();
    let configured = common::insert_account(&pool, "Alice", Some(("alice@work.test", "pw")));
    let blank = common::insert_account(&pool, "Bob", Some(("bob@work.test", "")));
    let none = common::insert_account(&pool, "Carol", None);
    let repo = db.repo();

    let credentials = repo.get_credentials(configured).unwrap().unwrap();
    assert_eq!(credentials.sender_address, "alice@work.test");
    assert!(repo.get_credentials(blank).unwrap().is_none());
    assert!(repo.get_credentials(none).unwrap().is_none());
    assert!(repo.get_credentials(OwnerId::new(999)).unwrap().is_none());

    let account = repo.get_account_by_id(configured).unwrap().unwrap();
    assert_eq!(account.display_name, "Alice");
}
