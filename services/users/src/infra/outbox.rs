use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, FromQueryResult, QueryFilter, Statement,
    sea_query::Expr,
};
use uuid::Uuid;

use userhub_events::EventType;
use userhub_users_schema::outbox_events;

use crate::domain::repository::OutboxRepository;
use crate::domain::types::{OutboxEvent, OutboxStats, OutboxStatus, User};
use crate::error::UsersServiceError;

/// Append the event describing a mutation of `user`.
///
/// Takes a transaction handle so the row can only be written alongside the
/// user change it describes; a rollback discards both.
pub async fn record_mutation(
    txn: &DatabaseTransaction,
    user: &User,
    event_type: EventType,
) -> Result<OutboxEvent, DbErr> {
    let event = OutboxEvent::pending_for(user, event_type);
    outbox_events::ActiveModel {
        id: Set(event.id),
        aggregate_key: Set(event.aggregate_key.clone()),
        event_type: Set(event.event_type.clone()),
        payload: Set(event.payload.clone()),
        status: Set(event.status.as_str().to_owned()),
        attempts: Set(event.attempts),
        last_error: Set(None),
        created_at: Set(event.created_at),
        next_attempt_at: Set(event.next_attempt_at),
        claimed_by: Set(None),
        claim_expires_at: Set(None),
        published_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(event)
}

// ── Outbox repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOutboxRepository {
    pub db: DatabaseConnection,
}

/// Leases the oldest eligible row of every aggregate key. A key whose head
/// row is leased, or waiting on backoff, contributes nothing, which keeps
/// per-key publish order across concurrent relays.
const CLAIM_SQL: &str = r#"
    UPDATE outbox_events AS o
    SET claimed_by = $1, claim_expires_at = $2
    WHERE o.id IN (
        SELECT e.id FROM outbox_events e
        WHERE e.status = 'PENDING'
          AND e.next_attempt_at <= $3
          AND (e.claim_expires_at IS NULL OR e.claim_expires_at < $3)
          AND NOT EXISTS (
              SELECT 1 FROM outbox_events p
              WHERE p.aggregate_key = e.aggregate_key
                AND p.status = 'PENDING'
                AND (p.created_at, p.id) < (e.created_at, e.id)
          )
        ORDER BY e.created_at, e.id
        LIMIT $4
        FOR UPDATE SKIP LOCKED
    )
    RETURNING o.*
"#;

const STATS_SQL: &str = r#"
    SELECT
        COUNT(*) FILTER (WHERE status = 'PENDING') AS pending,
        COUNT(*) FILTER (WHERE status = 'PUBLISHED') AS published,
        COUNT(*) FILTER (WHERE status = 'FAILED') AS failed,
        MIN(created_at) FILTER (WHERE status = 'PENDING') AS oldest_pending_at,
        COALESCE(MAX(attempts) FILTER (WHERE status = 'PENDING'), 0) AS max_pending_attempts
    FROM outbox_events
"#;

#[derive(Debug, FromQueryResult)]
struct StatsRow {
    pending: i64,
    published: i64,
    failed: i64,
    oldest_pending_at: Option<DateTime<Utc>>,
    max_pending_attempts: i32,
}

impl OutboxRepository for DbOutboxRepository {
    async fn claim_batch(
        &self,
        owner: &str,
        limit: u64,
        lease: Duration,
    ) -> Result<Vec<OutboxEvent>, UsersServiceError> {
        let now = Utc::now();
        let lease = TimeDelta::from_std(lease).context("claim lease out of range")?;
        let models = outbox_events::Model::find_by_statement(Statement::from_sql_and_values(
            self.db.get_database_backend(),
            CLAIM_SQL,
            [
                owner.into(),
                (now + lease).into(),
                now.into(),
                (limit as i64).into(),
            ],
        ))
        .all(&self.db)
        .await
        .context("claim outbox batch")?;

        let mut events = models
            .into_iter()
            .map(outbox_from_model)
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(events)
    }

    async fn mark_published(&self, id: Uuid, owner: &str) -> Result<bool, UsersServiceError> {
        let result = outbox_events::Entity::update_many()
            .col_expr(
                outbox_events::Column::Status,
                Expr::value(OutboxStatus::Published.as_str()),
            )
            .col_expr(outbox_events::Column::PublishedAt, Expr::value(Utc::now()))
            .col_expr(outbox_events::Column::LastError, Expr::value(Option::<String>::None))
            .col_expr(outbox_events::Column::ClaimedBy, Expr::value(Option::<String>::None))
            .col_expr(
                outbox_events::Column::ClaimExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(outbox_events::Column::Id.eq(id))
            .filter(outbox_events::Column::ClaimedBy.eq(owner))
            .exec(&self.db)
            .await
            .context("mark outbox event published")?;
        Ok(result.rows_affected > 0)
    }

    async fn record_failure(
        &self,
        id: Uuid,
        owner: &str,
        attempts: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, UsersServiceError> {
        let result = outbox_events::Entity::update_many()
            .col_expr(outbox_events::Column::Attempts, Expr::value(attempts))
            .col_expr(outbox_events::Column::LastError, Expr::value(error))
            .col_expr(outbox_events::Column::NextAttemptAt, Expr::value(next_attempt_at))
            .col_expr(outbox_events::Column::ClaimedBy, Expr::value(Option::<String>::None))
            .col_expr(
                outbox_events::Column::ClaimExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(outbox_events::Column::Id.eq(id))
            .filter(outbox_events::Column::ClaimedBy.eq(owner))
            .exec(&self.db)
            .await
            .context("record outbox publish failure")?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        owner: &str,
        error: &str,
    ) -> Result<bool, UsersServiceError> {
        let result = outbox_events::Entity::update_many()
            .col_expr(
                outbox_events::Column::Status,
                Expr::value(OutboxStatus::Failed.as_str()),
            )
            .col_expr(outbox_events::Column::LastError, Expr::value(error))
            .col_expr(outbox_events::Column::ClaimedBy, Expr::value(Option::<String>::None))
            .col_expr(
                outbox_events::Column::ClaimExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(outbox_events::Column::Id.eq(id))
            .filter(outbox_events::Column::ClaimedBy.eq(owner))
            .exec(&self.db)
            .await
            .context("mark outbox event failed")?;
        Ok(result.rows_affected > 0)
    }

    async fn stats(&self) -> Result<OutboxStats, UsersServiceError> {
        let row = StatsRow::find_by_statement(Statement::from_string(
            self.db.get_database_backend(),
            STATS_SQL,
        ))
        .one(&self.db)
        .await
        .context("outbox stats")?;
        Ok(row
            .map(|r| OutboxStats {
                pending: r.pending,
                published: r.published,
                failed: r.failed,
                oldest_pending_at: r.oldest_pending_at,
                max_pending_attempts: r.max_pending_attempts,
            })
            .unwrap_or_default())
    }
}

fn outbox_from_model(model: outbox_events::Model) -> Result<OutboxEvent, UsersServiceError> {
    let status = model
        .status
        .parse::<OutboxStatus>()
        .map_err(anyhow::Error::msg)
        .context("decode outbox status")?;
    Ok(OutboxEvent {
        id: model.id,
        aggregate_key: model.aggregate_key,
        event_type: model.event_type,
        payload: model.payload,
        status,
        attempts: model.attempts,
        last_error: model.last_error,
        created_at: model.created_at,
        next_attempt_at: model.next_attempt_at,
        published_at: model.published_at,
    })
}
