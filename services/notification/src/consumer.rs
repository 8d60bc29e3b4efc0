//! Idempotent handling of `users-events-topic` messages.
//!
//! The event id is the dedup key: a recorded id is acknowledged without a
//! second mail. The record is written only after the mail went out, so a
//! crash in between resends the mail on redelivery (at-least-once).
//! A rejected recipient is permanent and goes to the dead-letter stream at once.

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use userhub_core::backoff::Backoff;
use userhub_events::UserEvent;

use crate::domain::repository::{ConsumedEventStore, DeadLetterSink, Mailer};
use crate::domain::types::{
    AckReason, ConsumedEventRecord, DeadLetterEntry, Delivery, Disposition, Notification,
};
use crate::error::NotificationError;

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Deliveries allowed before a failing message is dead-lettered.
    pub max_deliveries: u32,
    /// Redelivery delay after a failed attempt.
    pub backoff: Backoff,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            backoff: Backoff::default(),
        }
    }
}

pub struct IdempotentConsumer<S: ConsumedEventStore, M: Mailer, D: DeadLetterSink> {
    pub store: S,
    pub mailer: M,
    pub dead_letters: D,
    pub settings: ConsumerSettings,
}

impl<S: ConsumedEventStore, M: Mailer, D: DeadLetterSink> IdempotentConsumer<S, M, D> {
    pub fn new(store: S, mailer: M, dead_letters: D, settings: ConsumerSettings) -> Self {
        Self {
            store,
            mailer,
            dead_letters,
            settings,
        }
    }

    /// Decode a raw message value and handle it. Payloads that do not decode
    /// are dead-lettered on their first delivery.
    pub async fn on_payload(&self, payload: &[u8], delivery: &Delivery) -> Disposition {
        match serde_json::from_slice::<UserEvent>(payload) {
            Ok(event) => self.on_event(&event, payload, delivery).await,
            Err(e) => {
                error!(
                    subject = %delivery.subject,
                    stream_sequence = delivery.stream_sequence,
                    error = %e,
                    "undecodable user event"
                );
                let entry = DeadLetterEntry::new(
                    event_id_hint(payload),
                    delivery,
                    payload,
                    format!("undecodable payload: {e}"),
                );
                self.dead_letter(entry, delivery).await
            }
        }
    }

    /// Handle one decoded event. `payload` is kept for the dead-letter entry.
    pub async fn on_event(
        &self,
        event: &UserEvent,
        payload: &[u8],
        delivery: &Delivery,
    ) -> Disposition {
        match self.store.is_processed(event.event_id).await {
            Ok(true) => {
                debug!(event_id = %event.event_id, "event already processed, skipping");
                return Disposition::Ack(AckReason::Skipped);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(event_id = %event.event_id, error = ?e, "dedup lookup failed");
                return self.retry(delivery);
            }
        }

        let notification = Notification::for_event(event);
        if let Err(e) = self
            .mailer
            .send_email(&notification.to, &notification.subject, &notification.body)
            .await
        {
            let permanent = matches!(e, NotificationError::Validation(_));
            if permanent || delivery.count >= self.settings.max_deliveries {
                error!(
                    event_id = %event.event_id,
                    delivery = delivery.count,
                    permanent,
                    error = %e,
                    "notification cannot be delivered, dead-lettering"
                );
                let entry =
                    DeadLetterEntry::new(Some(event.event_id), delivery, payload, e.to_string());
                return self.dead_letter(entry, delivery).await;
            }
            warn!(
                event_id = %event.event_id,
                delivery = delivery.count,
                error = %e,
                "notification failed, requesting redelivery"
            );
            return self.retry(delivery);
        }

        match self.store.record(&ConsumedEventRecord::for_event(event)).await {
            Ok(_) => {
                info!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "notification sent"
                );
                Disposition::Ack(AckReason::Recorded)
            }
            Err(e) => {
                warn!(
                    event_id = %event.event_id,
                    error = ?e,
                    "failed to record consumed event, mail may be resent"
                );
                self.retry(delivery)
            }
        }
    }

    async fn dead_letter(&self, entry: DeadLetterEntry, delivery: &Delivery) -> Disposition {
        match self.dead_letters.publish(&entry).await {
            Ok(()) => Disposition::DeadLettered,
            Err(e) => {
                error!(dedup_id = %entry.dedup_id(), error = ?e, "dead-letter publish failed");
                self.retry(delivery)
            }
        }
    }

    fn retry(&self, delivery: &Delivery) -> Disposition {
        Disposition::Nak(self.settings.backoff.delay(delivery.count))
    }
}

/// Best-effort `eventId` extraction from a payload that failed full decoding.
fn event_id_hint(payload: &[u8]) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("eventId")?.as_str()?.parse().ok()
}
