use std::time::Duration;

use serde::Deserialize;

use userhub_core::backoff::Backoff;
use userhub_core::config::Config;
use userhub_events::Topic;

use crate::relay::RelaySettings;

/// Users service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// NATS server URL. Env var: `NATS_URL`.
    pub nats_url: String,
    /// TCP port for the HTTP server (default 8080). Env var: `USERS_PORT`.
    #[serde(default = "default_users_port")]
    pub users_port: u16,
    /// Partition count of `users-events-topic` (default 2).
    #[serde(default = "default_event_partitions")]
    pub event_partitions: u32,
    #[serde(default = "default_relay_batch_size")]
    pub relay_batch_size: u64,
    #[serde(default = "default_relay_poll_interval_ms")]
    pub relay_poll_interval_ms: u64,
    #[serde(default = "default_relay_claim_lease_secs")]
    pub relay_claim_lease_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub relay_backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub relay_backoff_cap_ms: u64,
    #[serde(default = "default_relay_stuck_alert_attempts")]
    pub relay_stuck_alert_attempts: i32,
    /// Lease owner id; random when unset.
    pub relay_instance_id: Option<String>,
}

fn default_users_port() -> u16 {
    8080
}

fn default_event_partitions() -> u32 {
    2
}

fn default_relay_batch_size() -> u64 {
    100
}

fn default_relay_poll_interval_ms() -> u64 {
    500
}

fn default_relay_claim_lease_secs() -> u64 {
    30
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    60_000
}

fn default_relay_stuck_alert_attempts() -> i32 {
    10
}

impl Config for UsersConfig {}

impl UsersConfig {
    pub fn topic(&self) -> Topic {
        Topic::users_events(self.event_partitions)
    }

    pub fn relay_settings(&self) -> RelaySettings {
        let defaults = RelaySettings::default();
        RelaySettings {
            owner: self.relay_instance_id.clone().unwrap_or(defaults.owner),
            batch_size: self.relay_batch_size.max(1),
            poll_interval: Duration::from_millis(self.relay_poll_interval_ms),
            claim_lease: Duration::from_secs(self.relay_claim_lease_secs),
            backoff: Backoff::from_millis(self.relay_backoff_base_ms, self.relay_backoff_cap_ms),
            stuck_alert_attempts: self.relay_stuck_alert_attempts,
        }
    }
}
