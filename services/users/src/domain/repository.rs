#![allow(async_fn_in_trait)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use userhub_events::UserEvent;

use crate::domain::types::{NewUser, OutboxEvent, OutboxStats, User};
use crate::error::{RelayError, UsersServiceError};

/// Repository for users. Every mutation that emits an event writes its outbox
/// row in the same transaction as the user change.
pub trait UserRepository: Send + Sync {
    /// All users ordered by id.
    async fn list(&self) -> Result<Vec<User>, UsersServiceError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, UsersServiceError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UsersServiceError>;

    /// Insert the user and its CREATED event atomically.
    async fn create_with_outbox(
        &self,
        user: &NewUser,
    ) -> Result<(User, OutboxEvent), UsersServiceError>;

    /// Returns `None` when no user has this id.
    async fn update_by_id(
        &self,
        id: i32,
        changes: &NewUser,
    ) -> Result<Option<User>, UsersServiceError>;

    /// Returns `None` when no user has this email.
    async fn update_by_email(
        &self,
        email: &str,
        changes: &NewUser,
    ) -> Result<Option<User>, UsersServiceError>;

    /// Delete the user and write its DELETED event atomically.
    async fn delete_by_id_with_outbox(
        &self,
        id: i32,
    ) -> Result<Option<(User, OutboxEvent)>, UsersServiceError>;

    /// Delete every user, one DELETED event per removed row.
    async fn clear_with_outbox(&self) -> Result<Vec<OutboxEvent>, UsersServiceError>;
}

/// Relay-side view of the outbox table.
pub trait OutboxRepository: Send + Sync {
    /// Lease up to `limit` publishable rows to `owner` for `lease`.
    ///
    /// Only the oldest pending row of each aggregate key is eligible, so
    /// events for one user are never in flight out of order. Rows come back
    /// in creation order.
    async fn claim_batch(
        &self,
        owner: &str,
        limit: u64,
        lease: Duration,
    ) -> Result<Vec<OutboxEvent>, UsersServiceError>;

    /// Returns `false` if the lease was lost to another relay.
    async fn mark_published(&self, id: Uuid, owner: &str) -> Result<bool, UsersServiceError>;

    /// Keep the row PENDING with the new attempt count and release the lease.
    async fn record_failure(
        &self,
        id: Uuid,
        owner: &str,
        attempts: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, UsersServiceError>;

    /// Move a row that can never be published to FAILED.
    async fn mark_failed(
        &self,
        id: Uuid,
        owner: &str,
        error: &str,
    ) -> Result<bool, UsersServiceError>;

    async fn stats(&self) -> Result<OutboxStats, UsersServiceError>;
}

/// Broker acknowledgement for one published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub sequence: u64,
    /// Broker recognised the event id and dropped the copy.
    pub duplicate: bool,
}

/// Outbound port to the partitioned `users-events-topic`.
pub trait EventPublisher: Send + Sync {
    /// Resolves only once the broker has durably acknowledged the event.
    async fn publish(&self, event: &UserEvent) -> Result<PublishReceipt, RelayError>;
}
