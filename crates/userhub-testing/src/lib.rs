//! Test utilities for userhub services.
//!
//! Contract fixture loader, response helpers and event builders.
//! Import from `[dev-dependencies]` only, never in production code.

pub mod events;
pub mod fixture;
pub mod http;
