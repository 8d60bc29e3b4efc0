//! Topic naming on top of JetStream.
//!
//! A partitioned topic is one stream whose subjects are
//! `<topic>.<partition>`. Consumers bind one durable per partition subject,
//! which gives per-partition ordering.

use crate::partition::partition_for;

pub const USERS_EVENTS_TOPIC: &str = "users-events-topic";
pub const USERS_EVENTS_STREAM: &str = "USERS_EVENTS";
pub const USERS_EVENTS_DLQ_STREAM: &str = "USERS_EVENTS_DLQ";
pub const USERS_EVENTS_DLQ_SUBJECT: &str = "users-events-dlq.failed";
pub const USERS_EVENTS_DLQ_SUBJECTS: &str = "users-events-dlq.>";

/// Broker de-duplication header; carries the event id.
pub const MSG_ID_HEADER: &str = "Nats-Msg-Id";
/// Carries the message key (user e-mail).
pub const KEY_HEADER: &str = "Userhub-Key";

/// A partitioned topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    name: String,
    partitions: u32,
}

impl Topic {
    /// `partitions` is clamped to at least 1.
    pub fn new(name: impl Into<String>, partitions: u32) -> Self {
        Self {
            name: name.into(),
            partitions: partitions.max(1),
        }
    }

    /// The `users-events-topic` with the given partition count.
    pub fn users_events(partitions: u32) -> Self {
        Self::new(USERS_EVENTS_TOPIC, partitions)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn partition_for(&self, key: &str) -> u32 {
        partition_for(key, self.partitions)
    }

    pub fn partition_subject(&self, partition: u32) -> String {
        format!("{}.{}", self.name, partition)
    }

    /// Subject a message with `key` is published to.
    pub fn subject_for_key(&self, key: &str) -> String {
        self.partition_subject(self.partition_for(key))
    }

    /// Wildcard covering every partition subject (stream subject filter).
    pub fn wildcard(&self) -> String {
        format!("{}.*", self.name)
    }
}
