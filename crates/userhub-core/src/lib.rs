//! Ambient building blocks shared by the userhub services.
//!
//! Nothing in here knows about users, outboxes or notifications.

pub mod backoff;
pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod shutdown;
pub mod tracing;
