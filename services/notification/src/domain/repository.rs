#![allow(async_fn_in_trait)]

use uuid::Uuid;

use crate::domain::types::{ConsumedEventRecord, DeadLetterEntry};
use crate::error::NotificationError;

/// Ledger of handled event ids.
pub trait ConsumedEventStore: Send + Sync {
    async fn is_processed(&self, event_id: Uuid) -> Result<bool, NotificationError>;

    /// Insert the record. An existing id is left untouched and yields `false`.
    async fn record(&self, record: &ConsumedEventRecord) -> Result<bool, NotificationError>;
}

/// Outbound mail port.
pub trait Mailer: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;
}

/// Destination for messages that exhausted their deliveries.
pub trait DeadLetterSink: Send + Sync {
    /// Publishing the same entry twice must store it once.
    async fn publish(&self, entry: &DeadLetterEntry) -> Result<(), NotificationError>;
}
