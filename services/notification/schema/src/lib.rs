pub mod consumed_events;
