use anyhow::Context as _;
use sea_orm::{
    ActiveValue::Set, DatabaseConnection, EntityTrait, sea_query::OnConflict,
};
use uuid::Uuid;

use userhub_notification_schema::consumed_events;

use crate::domain::repository::ConsumedEventStore;
use crate::domain::types::ConsumedEventRecord;
use crate::error::NotificationError;

// ── Consumed event store ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbConsumedEventStore {
    pub db: DatabaseConnection,
}

impl ConsumedEventStore for DbConsumedEventStore {
    async fn is_processed(&self, event_id: Uuid) -> Result<bool, NotificationError> {
        let model = consumed_events::Entity::find_by_id(event_id)
            .one(&self.db)
            .await
            .context("find consumed event")
            .map_err(NotificationError::Storage)?;
        Ok(model.is_some())
    }

    async fn record(&self, record: &ConsumedEventRecord) -> Result<bool, NotificationError> {
        let inserted = consumed_events::Entity::insert(consumed_events::ActiveModel {
            event_id: Set(record.event_id),
            event_type: Set(record.event_type.as_str().to_owned()),
            email: Set(record.email.clone()),
            processed_at: Set(record.processed_at),
        })
        .on_conflict(
            OnConflict::column(consumed_events::Column::EventId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("record consumed event")
        .map_err(NotificationError::Storage)?;
        Ok(inserted > 0)
    }
}
