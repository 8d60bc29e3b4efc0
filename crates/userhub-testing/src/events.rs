//! Builders for broker events used across service tests.

use uuid::Uuid;

use userhub_events::{EventType, UserEvent};

pub fn user_event(email: &str, event_type: EventType) -> UserEvent {
    UserEvent {
        event_id: Uuid::now_v7(),
        email: email.to_owned(),
        event_type,
    }
}

pub fn created(email: &str) -> UserEvent {
    user_event(email, EventType::Created)
}

pub fn deleted(email: &str) -> UserEvent {
    user_event(email, EventType::Deleted)
}
