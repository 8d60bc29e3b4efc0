use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use userhub_events::{EventType, UserEvent};

pub const CREATED_SUBJECT: &str = "Аккаунт создан";
pub const CREATED_BODY: &str = "Здравствуйте! Ваш аккаунт на сайте был успешно создан!";
pub const DELETED_SUBJECT: &str = "Аккаунт удалён";
pub const DELETED_BODY: &str = "Здравствуйте! Ваш аккаунт был удалён...";

/// One outgoing e-mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Mail sent to the user an event is about.
    pub fn for_event(event: &UserEvent) -> Self {
        let (subject, body) = match event.event_type {
            EventType::Created => (CREATED_SUBJECT, CREATED_BODY),
            EventType::Deleted => (DELETED_SUBJECT, DELETED_BODY),
        };
        Self {
            to: event.email.clone(),
            subject: subject.to_owned(),
            body: body.to_owned(),
        }
    }
}

/// Proof that an event's side effect completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedEventRecord {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub email: String,
    pub processed_at: DateTime<Utc>,
}

impl ConsumedEventRecord {
    pub fn for_event(event: &UserEvent) -> Self {
        Self {
            event_id: event.event_id,
            event_type: event.event_type,
            email: event.email.clone(),
            processed_at: Utc::now(),
        }
    }
}

/// Broker metadata of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subject: String,
    pub stream_sequence: u64,
    /// 1 on first delivery.
    pub count: u32,
}

/// Message parked on the dead-letter stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    /// `None` when the payload could not be decoded.
    pub event_id: Option<Uuid>,
    pub subject: String,
    pub stream_sequence: u64,
    /// Original message value, lossily decoded as UTF-8.
    pub payload: String,
    pub error: String,
    pub delivery_count: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(
        event_id: Option<Uuid>,
        delivery: &Delivery,
        payload: &[u8],
        error: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            subject: delivery.subject.clone(),
            stream_sequence: delivery.stream_sequence,
            payload: String::from_utf8_lossy(payload).into_owned(),
            error: error.into(),
            delivery_count: delivery.count,
            failed_at: Utc::now(),
        }
    }

    /// Broker de-duplication id: one entry per event, or per stream message
    /// when the event id is unknown.
    pub fn dedup_id(&self) -> String {
        match self.event_id {
            Some(id) => format!("dlq-{id}"),
            None => format!("dlq-seq-{}", self.stream_sequence),
        }
    }
}

/// Why a message was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckReason {
    /// Event id already recorded; no side effect.
    Skipped,
    /// Side effect done and recorded.
    Recorded,
}

/// What the broker adapter should do with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack(AckReason),
    /// Redeliver after the delay.
    Nak(Duration),
    /// Entry written to the dead-letter stream; terminate the message.
    DeadLettered,
}
