use std::time::Duration;

use serde::Deserialize;

use userhub_core::backoff::Backoff;
use userhub_core::config::Config;
use userhub_events::Topic;

use crate::consumer::ConsumerSettings;
use crate::infra::broker::WorkerSettings;
use crate::infra::mailer::SmtpSettings;

/// Notification service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// NATS server URL. Env var: `NATS_URL`.
    pub nats_url: String,
    /// TCP port for the HTTP server (default 8081). Env var: `NOTIFICATION_PORT`.
    #[serde(default = "default_notification_port")]
    pub notification_port: u16,
    /// Must match the producer's partition count.
    #[serde(default = "default_event_partitions")]
    pub event_partitions: u32,
    #[serde(default = "default_consumer_durable_prefix")]
    pub consumer_durable_prefix: String,
    #[serde(default = "default_consumer_max_deliveries")]
    pub consumer_max_deliveries: u32,
    #[serde(default = "default_consumer_ack_wait_secs")]
    pub consumer_ack_wait_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub consumer_backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub consumer_backoff_cap_ms: u64,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    #[serde(default = "default_smtp_use_tls")]
    pub smtp_use_tls: bool,
}

fn default_notification_port() -> u16 {
    8081
}

fn default_event_partitions() -> u32 {
    2
}

fn default_consumer_durable_prefix() -> String {
    "notification-service".to_owned()
}

fn default_consumer_max_deliveries() -> u32 {
    5
}

fn default_consumer_ack_wait_secs() -> u64 {
    30
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    60_000
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_use_tls() -> bool {
    true
}

impl Config for NotificationConfig {}

impl NotificationConfig {
    pub fn topic(&self) -> Topic {
        Topic::users_events(self.event_partitions)
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            max_deliveries: self.consumer_max_deliveries.max(1),
            backoff: Backoff::from_millis(self.consumer_backoff_base_ms, self.consumer_backoff_cap_ms),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            durable_prefix: self.consumer_durable_prefix.clone(),
            ack_wait: Duration::from_secs(self.consumer_ack_wait_secs),
        }
    }

    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            from: self.smtp_from.clone(),
            use_tls: self.smtp_use_tls,
        }
    }
}
