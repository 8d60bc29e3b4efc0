//! sea-orm entities owned by the users service.

pub mod outbox_events;
pub mod users;
