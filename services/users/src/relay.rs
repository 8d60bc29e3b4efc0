//! Outbox relay: moves PENDING outbox rows onto the broker.
//!
//! A row leaves PENDING only after the broker acknowledged it, so delivery is
//! at-least-once. Retries reuse the stored event id; the broker and the
//! consumer both de-duplicate on it.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use userhub_core::backoff::Backoff;

use crate::domain::repository::{EventPublisher, OutboxRepository};
use crate::domain::types::OutboxEvent;
use crate::error::RelayError;

#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Lease owner written to claimed rows; unique per relay instance.
    pub owner: String,
    pub batch_size: u64,
    pub poll_interval: Duration,
    pub claim_lease: Duration,
    pub backoff: Backoff,
    /// Failures from this attempt count on are logged at error level.
    pub stuck_alert_attempts: i32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            owner: format!("relay-{}", uuid::Uuid::new_v4()),
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
            claim_lease: Duration::from_secs(30),
            backoff: Backoff::default(),
            stuck_alert_attempts: 10,
        }
    }
}

/// Outcome of one claim-and-publish pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct RelayPublisher<O: OutboxRepository, P: EventPublisher> {
    pub outbox: O,
    pub publisher: P,
    pub settings: RelaySettings,
}

impl<O: OutboxRepository, P: EventPublisher> RelayPublisher<O, P> {
    pub fn new(outbox: O, publisher: P, settings: RelaySettings) -> Self {
        Self {
            outbox,
            publisher,
            settings,
        }
    }

    /// Claim one batch and publish it in creation order.
    pub async fn relay_once(&self) -> Result<CycleReport, RelayError> {
        let batch = self
            .outbox
            .claim_batch(
                &self.settings.owner,
                self.settings.batch_size,
                self.settings.claim_lease,
            )
            .await?;

        let mut report = CycleReport {
            claimed: batch.len(),
            ..Default::default()
        };
        for row in batch {
            match self.relay_row(&row).await? {
                RowOutcome::Published => report.published += 1,
                RowOutcome::Retried => report.retried += 1,
                RowOutcome::Failed => report.failed += 1,
            }
        }
        if report.claimed > 0 {
            debug!(
                claimed = report.claimed,
                published = report.published,
                retried = report.retried,
                failed = report.failed,
                "relay cycle finished"
            );
        }
        Ok(report)
    }

    async fn relay_row(&self, row: &OutboxEvent) -> Result<RowOutcome, RelayError> {
        let owner = self.settings.owner.as_str();

        let event = match row.decode() {
            Ok(event) => event,
            Err(e) => {
                error!(
                    outbox_id = %row.id,
                    aggregate_key = %row.aggregate_key,
                    error = %e,
                    "outbox payload cannot be decoded, marking failed"
                );
                self.outbox
                    .mark_failed(row.id, owner, &format!("undecodable payload: {e}"))
                    .await?;
                return Ok(RowOutcome::Failed);
            }
        };

        match self.publisher.publish(&event).await {
            Ok(receipt) => {
                if !self.outbox.mark_published(row.id, owner).await? {
                    warn!(outbox_id = %row.id, "claim lease lost before mark published");
                }
                debug!(
                    outbox_id = %row.id,
                    event_type = %event.event_type,
                    sequence = receipt.sequence,
                    duplicate = receipt.duplicate,
                    "outbox event published"
                );
                Ok(RowOutcome::Published)
            }
            Err(e) => {
                let attempts = row.attempts.saturating_add(1);
                let delay = self.settings.backoff.delay(attempts as u32);
                let next_attempt_at =
                    Utc::now() + TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
                let message = e.to_string();
                if attempts >= self.settings.stuck_alert_attempts {
                    error!(
                        outbox_id = %row.id,
                        aggregate_key = %row.aggregate_key,
                        attempts,
                        error = %message,
                        "outbox event stuck, publish keeps failing"
                    );
                } else {
                    warn!(
                        outbox_id = %row.id,
                        attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %message,
                        "outbox publish failed, will retry"
                    );
                }
                self.outbox
                    .record_failure(row.id, owner, attempts, &message, next_attempt_at)
                    .await?;
                Ok(RowOutcome::Retried)
            }
        }
    }

    /// Poll until `shutdown` flips. A full batch is followed immediately by
    /// another pass; otherwise the relay sleeps for the poll interval.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            owner = %self.settings.owner,
            batch_size = self.settings.batch_size,
            "outbox relay started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            let full_batch = match self.relay_once().await {
                Ok(report) => report.claimed as u64 >= self.settings.batch_size,
                Err(e) => {
                    error!(error = ?e, "outbox relay cycle failed");
                    false
                }
            };
            if full_batch {
                continue;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        info!(owner = %self.settings.owner, "outbox relay stopped");
    }
}

enum RowOutcome {
    Published,
    Retried,
    Failed,
}
