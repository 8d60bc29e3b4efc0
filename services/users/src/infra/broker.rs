use std::sync::Arc;
use std::time::Duration;

use async_nats::HeaderMap;
use bytes::Bytes;
use async_nats::jetstream::{self, Context, stream::Config as StreamConfig};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use userhub_events::topic::{KEY_HEADER, MSG_ID_HEADER, USERS_EVENTS_STREAM};
use userhub_events::{Topic, UserEvent};

use crate::domain::repository::{EventPublisher, PublishReceipt};
use crate::error::RelayError;

/// Window in which JetStream drops re-sends of an already stored event id.
pub const DUPLICATE_WINDOW: Duration = Duration::from_secs(2 * 60);

/// Client that keeps reconnecting in the background instead of failing when
/// the broker is down at start-up.
pub async fn connect(url: &str) -> anyhow::Result<async_nats::Client> {
    async_nats::ConnectOptions::new()
        .retry_on_initial_connect()
        .connect(url)
        .await
        .map_err(|e| anyhow::anyhow!("connect to NATS at {url}: {e}"))
}

/// Publishes user events onto the partitioned `users-events-topic` stream.
///
/// The stream is ensured on first publish; until that succeeds every publish
/// fails and the relay retries it with backoff.
#[derive(Clone)]
pub struct NatsEventPublisher {
    jetstream: Context,
    topic: Topic,
    stream_ready: Arc<OnceCell<()>>,
}

impl NatsEventPublisher {
    pub fn new(client: async_nats::Client, topic: Topic) -> Self {
        Self {
            jetstream: jetstream::new(client),
            topic,
            stream_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Create the topic stream if it is missing.
    pub async fn ensure_stream(&self) -> anyhow::Result<()> {
        if self.jetstream.get_stream(USERS_EVENTS_STREAM).await.is_ok() {
            debug!(stream = USERS_EVENTS_STREAM, "stream already exists");
            return Ok(());
        }
        info!(
            stream = USERS_EVENTS_STREAM,
            subjects = %self.topic.wildcard(),
            partitions = self.topic.partitions(),
            "creating stream"
        );
        self.jetstream
            .create_stream(StreamConfig {
                name: USERS_EVENTS_STREAM.to_owned(),
                subjects: vec![self.topic.wildcard()],
                duplicate_window: DUPLICATE_WINDOW,
                max_age: Duration::from_secs(7 * 24 * 60 * 60),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow::anyhow!("create stream {USERS_EVENTS_STREAM}: {e}"))?;
        Ok(())
    }
}

impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: &UserEvent) -> Result<PublishReceipt, RelayError> {
        self.stream_ready
            .get_or_try_init(|| self.ensure_stream())
            .await
            .map_err(|e| RelayError::Publish(format!("{e:#}")))?;

        let subject = self.topic.subject_for_key(event.key());
        let payload = Bytes::from(
            serde_json::to_vec(event).map_err(|e| RelayError::Publish(e.to_string()))?,
        );

        let mut headers = HeaderMap::new();
        headers.insert(MSG_ID_HEADER, event.event_id.to_string().as_str());
        headers.insert(KEY_HEADER, event.key());

        let ack = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, payload)
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?;

        debug!(
            %subject,
            event_id = %event.event_id,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            "published user event"
        );
        Ok(PublishReceipt {
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }
}
