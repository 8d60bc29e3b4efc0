//! Repository SQL paths against sea-orm's mock connection.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult};
use uuid::Uuid;

use userhub_events::EventType;
use userhub_users::domain::repository::{OutboxRepository, UserRepository};
use userhub_users::error::UsersServiceError;
use userhub_users::infra::db::DbUserRepository;
use userhub_users::infra::outbox::DbOutboxRepository;
use userhub_users_schema::{outbox_events, users};

use crate::helpers::new_user;

fn user_row(id: i32, email: &str) -> users::Model {
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    users::Model {
        id,
        name: "Alice".into(),
        email: email.into(),
        age: 30,
        created_at: at,
        updated_at: at,
    }
}

fn outbox_row(email: &str, minute: u32) -> outbox_events::Model {
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap();
    let id = Uuid::now_v7();
    outbox_events::Model {
        id,
        aggregate_key: email.into(),
        event_type: "CREATED".into(),
        payload: serde_json::json!({ "eventId": id, "email": email, "eventType": "CREATED" }),
        status: "PENDING".into(),
        attempts: 0,
        last_error: None,
        created_at: at,
        next_attempt_at: at,
        claimed_by: Some("relay-a".into()),
        claim_expires_at: Some(at),
        published_at: None,
    }
}

/// Debug rendering of everything the mock connection executed.
fn executed(db: DatabaseConnection) -> String {
    format!("{:?}", db.into_transaction_log())
}

#[tokio::test]
async fn should_write_deleted_event_for_removed_row() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user_row(7, "a@x.com")]])
        .append_query_results([vec![outbox_row("a@x.com", 0)]])
        .into_connection();
    let repo = DbUserRepository { db: db.clone() };

    let (user, event) = repo.delete_by_id_with_outbox(7).await.unwrap().unwrap();

    assert_eq!(user.id, 7);
    assert_eq!(event.aggregate_key, "a@x.com");
    assert_eq!(event.decode().unwrap().event_type, EventType::Deleted);
    let log = executed(db);
    assert!(log.contains("DELETE FROM users WHERE id = $1 RETURNING *"));
    assert_eq!(log.matches("outbox_events").count(), 1);
}

#[tokio::test]
async fn should_write_no_event_when_delete_removed_nothing() {
    // A concurrent delete already removed the row: RETURNING yields nothing.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<users::Model>::new()])
        .into_connection();
    let repo = DbUserRepository { db: db.clone() };

    assert!(repo.delete_by_id_with_outbox(7).await.unwrap().is_none());
    assert!(!executed(db).contains("outbox_events"));
}

#[tokio::test]
async fn should_build_clear_events_from_removed_rows() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user_row(2, "b@x.com"), user_row(1, "a@x.com")]])
        .append_query_results([vec![outbox_row("a@x.com", 0)]])
        .append_query_results([vec![outbox_row("b@x.com", 0)]])
        .into_connection();
    let repo = DbUserRepository { db: db.clone() };

    let events = repo.clear_with_outbox().await.unwrap();

    let keys: Vec<_> = events.iter().map(|e| e.aggregate_key.as_str()).collect();
    assert_eq!(keys, vec!["a@x.com", "b@x.com"]);
    assert!(events.iter().all(|e| e.event_type == "DELETED"));
    let log = executed(db);
    assert!(log.contains("DELETE FROM users RETURNING *"));
    assert!(!log.contains("SELECT"), "removed rows come from the delete itself");
}

#[tokio::test]
async fn should_fail_create_when_outbox_insert_fails() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user_row(1, "a@x.com")]])
        .append_query_errors([DbErr::Custom("outbox insert failed".into())])
        .into_connection();
    let repo = DbUserRepository { db };

    let result = repo
        .create_with_outbox(&new_user("Alice", "a@x.com", 30))
        .await;

    assert!(
        matches!(result, Err(UsersServiceError::Internal(_))),
        "expected Internal, got {result:?}"
    );
}

#[tokio::test]
async fn should_claim_with_skip_locked_and_return_rows_in_order() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![outbox_row("b@x.com", 5), outbox_row("a@x.com", 1)]])
        .into_connection();
    let repo = DbOutboxRepository { db: db.clone() };

    let claimed = repo
        .claim_batch("relay-a", 10, Duration::from_secs(30))
        .await
        .unwrap();

    let keys: Vec<_> = claimed.iter().map(|e| e.aggregate_key.as_str()).collect();
    assert_eq!(keys, vec!["a@x.com", "b@x.com"]);
    let log = executed(db);
    assert!(log.contains("FOR UPDATE SKIP LOCKED"));
    assert!(log.contains("relay-a"));
}

#[tokio::test]
async fn should_report_lost_lease_on_mark_published() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .into_connection();
    let repo = DbOutboxRepository { db: db.clone() };

    assert!(!repo.mark_published(Uuid::now_v7(), "relay-a").await.unwrap());
    let log = executed(db);
    assert!(log.contains("claimed_by"));
    assert!(log.contains("relay-a"));
}

#[tokio::test]
async fn should_record_failure_only_for_lease_holder() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let repo = DbOutboxRepository { db: db.clone() };

    let updated = repo
        .record_failure(Uuid::now_v7(), "relay-a", 2, "broker down", Utc::now())
        .await
        .unwrap();

    assert!(updated);
    let log = executed(db);
    assert!(log.contains("claimed_by"));
    assert!(log.contains("broker down"));
}
