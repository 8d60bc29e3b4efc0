use std::sync::Arc;
use std::time::Duration;

use async_nats::HeaderMap;
use async_nats::jetstream::{
    AckKind, Context, Message,
    consumer::{AckPolicy, pull::Config as ConsumerConfig},
    stream::Config as StreamConfig,
};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use userhub_events::Topic;
use userhub_events::topic::{
    MSG_ID_HEADER, USERS_EVENTS_DLQ_STREAM, USERS_EVENTS_DLQ_SUBJECT, USERS_EVENTS_DLQ_SUBJECTS,
    USERS_EVENTS_STREAM,
};

use crate::consumer::IdempotentConsumer;
use crate::domain::repository::DeadLetterSink;
use crate::domain::types::{DeadLetterEntry, Delivery, Disposition};
use crate::error::NotificationError;
use crate::infra::db::DbConsumedEventStore;
use crate::infra::mailer::SmtpMailer;

pub type NotificationConsumer =
    IdempotentConsumer<DbConsumedEventStore, SmtpMailer, NatsDeadLetterSink>;

/// Window in which JetStream drops a repeated dead-letter id.
pub const DLQ_DUPLICATE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Create the topic and dead-letter streams if they are missing.
pub async fn ensure_streams(jetstream: &Context, topic: &Topic) -> anyhow::Result<()> {
    ensure_stream(
        jetstream,
        StreamConfig {
            name: USERS_EVENTS_STREAM.to_owned(),
            subjects: vec![topic.wildcard()],
            duplicate_window: Duration::from_secs(2 * 60),
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            ..Default::default()
        },
    )
    .await?;
    ensure_stream(
        jetstream,
        StreamConfig {
            name: USERS_EVENTS_DLQ_STREAM.to_owned(),
            subjects: vec![USERS_EVENTS_DLQ_SUBJECTS.to_owned()],
            duplicate_window: DLQ_DUPLICATE_WINDOW,
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
            ..Default::default()
        },
    )
    .await
}

async fn ensure_stream(jetstream: &Context, config: StreamConfig) -> anyhow::Result<()> {
    if jetstream.get_stream(&config.name).await.is_ok() {
        debug!(stream = %config.name, "stream already exists");
        return Ok(());
    }
    info!(stream = %config.name, subjects = ?config.subjects, "creating stream");
    let name = config.name.clone();
    jetstream
        .create_stream(config)
        .await
        .map_err(|e| anyhow::anyhow!("create stream {name}: {e}"))?;
    Ok(())
}

// ── Dead-letter sink ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct NatsDeadLetterSink {
    jetstream: Context,
}

impl NatsDeadLetterSink {
    pub fn new(jetstream: Context) -> Self {
        Self { jetstream }
    }
}

impl DeadLetterSink for NatsDeadLetterSink {
    async fn publish(&self, entry: &DeadLetterEntry) -> Result<(), NotificationError> {
        let payload =
            serde_json::to_vec(entry).map_err(|e| NotificationError::DeadLetter(e.to_string()))?;
        let dedup_id = entry.dedup_id();
        let mut headers = HeaderMap::new();
        headers.insert(MSG_ID_HEADER, dedup_id.as_str());

        let ack = self
            .jetstream
            .publish_with_headers(USERS_EVENTS_DLQ_SUBJECT, headers, payload.into())
            .await
            .map_err(|e| NotificationError::DeadLetter(e.to_string()))?
            .await
            .map_err(|e| NotificationError::DeadLetter(e.to_string()))?;

        warn!(
            %dedup_id,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            "message moved to dead-letter stream"
        );
        Ok(())
    }
}

// ── Partition workers ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub durable_prefix: String,
    pub ack_wait: Duration,
}

/// Durable consumer name for one partition.
pub fn durable_name(prefix: &str, partition: u32) -> String {
    format!("{prefix}-p{partition}")
}

/// Start one worker per partition. Each holds at most one unacknowledged
/// message, so a partition is handled strictly in order while partitions run
/// concurrently.
pub async fn spawn_partition_workers(
    jetstream: &Context,
    topic: &Topic,
    settings: &WorkerSettings,
    consumer: Arc<NotificationConsumer>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let stream = jetstream
        .get_stream(USERS_EVENTS_STREAM)
        .await
        .map_err(|e| anyhow::anyhow!("get stream {USERS_EVENTS_STREAM}: {e}"))?;

    let mut handles = Vec::with_capacity(topic.partitions() as usize);
    for partition in 0..topic.partitions() {
        let name = durable_name(&settings.durable_prefix, partition);
        let pull = stream
            .get_or_create_consumer(
                &name,
                ConsumerConfig {
                    durable_name: Some(name.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: settings.ack_wait,
                    // Delivery bound is enforced by the consumer, which
                    // dead-letters before terminating.
                    max_deliver: -1,
                    max_ack_pending: 1,
                    filter_subject: topic.partition_subject(partition),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| anyhow::anyhow!("create consumer {name}: {e}"))?;

        let messages = pull
            .messages()
            .await
            .map_err(|e| anyhow::anyhow!("open message stream for {name}: {e}"))?;

        info!(partition, consumer = %name, "partition worker started");
        let consumer = Arc::clone(&consumer);
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(run_partition(
            partition, messages, consumer, shutdown,
        )));
    }
    Ok(handles)
}

async fn run_partition(
    partition: u32,
    mut messages: async_nats::jetstream::consumer::pull::Stream,
    consumer: Arc<NotificationConsumer>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let next = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            next = messages.next() => next,
        };
        match next {
            Some(Ok(message)) => handle_message(partition, &consumer, message).await,
            Some(Err(e)) => {
                warn!(partition, error = %e, "message stream error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            None => {
                warn!(partition, "message stream closed");
                break;
            }
        }
    }
    info!(partition, "partition worker stopped");
}

async fn handle_message(partition: u32, consumer: &NotificationConsumer, message: Message) {
    let info = match message.info() {
        Ok(info) => Some((info.stream_sequence, info.delivered)),
        Err(e) => {
            warn!(partition, error = %e, "missing delivery metadata");
            None
        }
    };
    let delivery = delivery_for(&message.subject, info);

    let disposition = consumer.on_payload(&message.payload, &delivery).await;
    let ack = match disposition {
        Disposition::Ack(_) => message.ack().await,
        Disposition::Nak(delay) => message.ack_with(AckKind::Nak(Some(delay))).await,
        Disposition::DeadLettered => message.ack_with(AckKind::Term).await,
    };
    if let Err(e) = ack {
        error!(
            partition,
            stream_sequence = delivery.stream_sequence,
            ?disposition,
            error = %e,
            "failed to acknowledge message"
        );
    }
}

/// Without broker metadata the delivery count is unknown; the message is
/// treated as out of redeliveries so a failure dead-letters it.
fn delivery_for(subject: &str, info: Option<(u64, i64)>) -> Delivery {
    match info {
        Some((stream_sequence, delivered)) => Delivery {
            subject: subject.to_owned(),
            stream_sequence,
            count: u32::try_from(delivered).unwrap_or(u32::MAX),
        },
        None => Delivery {
            subject: subject.to_owned(),
            stream_sequence: 0,
            count: u32::MAX,
        },
    }
}
