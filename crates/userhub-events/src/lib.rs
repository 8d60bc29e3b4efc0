//! Broker contract shared by the users and notification services.
//!
//! Pure types only: the event payload, its type tag, and how a message key
//! maps onto a topic partition. No broker client lives here.

pub mod event;
pub mod partition;
pub mod topic;

pub use event::{EventType, UnknownEventType, UserEvent};
pub use topic::Topic;
