use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use userhub_core::backoff::Backoff;
use userhub_events::{EventType, UserEvent};
use userhub_users::domain::repository::{
    EventPublisher, OutboxRepository, PublishReceipt, UserRepository,
};
use userhub_users::domain::types::{NewUser, OutboxEvent, OutboxStats, OutboxStatus, User};
use userhub_users::error::{RelayError, UsersServiceError};
use userhub_users::relay::{RelayPublisher, RelaySettings};

// ── Shared in-memory store ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub event: OutboxEvent,
    pub claimed_by: Option<String>,
    pub claim_expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct Store {
    pub users: Vec<User>,
    pub next_id: i32,
    pub outbox: Vec<OutboxRow>,
}

impl Store {
    fn append_event(&mut self, user: &User, event_type: EventType) -> OutboxEvent {
        let event = OutboxEvent::pending_for(user, event_type);
        self.outbox.push(OutboxRow {
            event: event.clone(),
            claimed_by: None,
            claim_expires_at: None,
        });
        event
    }
}

pub type SharedStore = Arc<Mutex<Store>>;

pub fn new_store() -> SharedStore {
    Arc::new(Mutex::new(Store {
        next_id: 1,
        ..Default::default()
    }))
}

/// All outbox events in insertion order.
pub fn outbox_events(store: &SharedStore) -> Vec<OutboxEvent> {
    store
        .lock()
        .unwrap()
        .outbox
        .iter()
        .map(|r| r.event.clone())
        .collect()
}

/// Insert a row whose payload can never be decoded.
pub fn insert_poison_row(store: &SharedStore, key: &str) -> Uuid {
    let now = Utc::now();
    let id = Uuid::now_v7();
    store.lock().unwrap().outbox.push(OutboxRow {
        event: OutboxEvent {
            id,
            aggregate_key: key.to_owned(),
            event_type: "RENAMED".into(),
            payload: serde_json::json!({ "email": key, "eventType": "RENAMED" }),
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            next_attempt_at: now,
            published_at: None,
        },
        claimed_by: None,
        claim_expires_at: None,
    });
    id
}

// ── InMemoryUserRepo ─────────────────────────────────────────────────────────

/// User repository writing outbox rows into the same store under one lock,
/// the in-memory analogue of a shared transaction.
#[derive(Clone)]
pub struct InMemoryUserRepo {
    pub store: SharedStore,
}

impl UserRepository for InMemoryUserRepo {
    async fn list(&self) -> Result<Vec<User>, UsersServiceError> {
        let mut users = self.store.lock().unwrap().users.clone();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, UsersServiceError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UsersServiceError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_with_outbox(
        &self,
        user: &NewUser,
    ) -> Result<(User, OutboxEvent), UsersServiceError> {
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(UsersServiceError::UserAlreadyExists);
        }
        let now = Utc::now();
        let created = User {
            id: store.next_id,
            name: user.name.clone(),
            email: user.email.clone(),
            age: user.age,
            created_at: now,
            updated_at: now,
        };
        store.next_id += 1;
        store.users.push(created.clone());
        let event = store.append_event(&created, EventType::Created);
        Ok((created, event))
    }

    async fn update_by_id(
        &self,
        id: i32,
        changes: &NewUser,
    ) -> Result<Option<User>, UsersServiceError> {
        let mut store = self.store.lock().unwrap();
        if store
            .users
            .iter()
            .any(|u| u.email == changes.email && u.id != id)
        {
            return Err(UsersServiceError::UserAlreadyExists);
        }
        Ok(store.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.name = changes.name.clone();
            u.email = changes.email.clone();
            u.age = changes.age;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn update_by_email(
        &self,
        email: &str,
        changes: &NewUser,
    ) -> Result<Option<User>, UsersServiceError> {
        let id = self.find_by_email(email).await?.map(|u| u.id);
        match id {
            Some(id) => self.update_by_id(id, changes).await,
            None => Ok(None),
        }
    }

    async fn delete_by_id_with_outbox(
        &self,
        id: i32,
    ) -> Result<Option<(User, OutboxEvent)>, UsersServiceError> {
        let mut store = self.store.lock().unwrap();
        let Some(pos) = store.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };
        let deleted = store.users.remove(pos);
        let event = store.append_event(&deleted, EventType::Deleted);
        Ok(Some((deleted, event)))
    }

    async fn clear_with_outbox(&self) -> Result<Vec<OutboxEvent>, UsersServiceError> {
        let mut store = self.store.lock().unwrap();
        let mut users = std::mem::take(&mut store.users);
        users.sort_by_key(|u| u.id);
        Ok(users
            .iter()
            .map(|u| store.append_event(u, EventType::Deleted))
            .collect())
    }
}

// ── InMemoryOutbox ───────────────────────────────────────────────────────────

/// Outbox repository with the same claim rules as the SQL implementation.
#[derive(Clone)]
pub struct InMemoryOutbox {
    pub store: SharedStore,
}

impl InMemoryOutbox {
    fn with_lease<F>(&self, id: Uuid, owner: &str, apply: F) -> bool
    where
        F: FnOnce(&mut OutboxRow),
    {
        let mut store = self.store.lock().unwrap();
        match store
            .outbox
            .iter_mut()
            .find(|r| r.event.id == id && r.claimed_by.as_deref() == Some(owner))
        {
            Some(row) => {
                apply(row);
                row.claimed_by = None;
                row.claim_expires_at = None;
                true
            }
            None => false,
        }
    }
}

impl OutboxRepository for InMemoryOutbox {
    async fn claim_batch(
        &self,
        owner: &str,
        limit: u64,
        lease: Duration,
    ) -> Result<Vec<OutboxEvent>, UsersServiceError> {
        let now = Utc::now();
        let mut store = self.store.lock().unwrap();

        let mut order: Vec<usize> = (0..store.outbox.len()).collect();
        order.sort_by_key(|&i| (store.outbox[i].event.created_at, store.outbox[i].event.id));

        let is_head = |rows: &[OutboxRow], i: usize| {
            let e = &rows[i].event;
            !rows.iter().any(|p| {
                p.event.aggregate_key == e.aggregate_key
                    && p.event.status == OutboxStatus::Pending
                    && (p.event.created_at, p.event.id) < (e.created_at, e.id)
            })
        };

        let eligible: Vec<usize> = order
            .into_iter()
            .filter(|&i| {
                let row = &store.outbox[i];
                row.event.status == OutboxStatus::Pending
                    && row.event.next_attempt_at <= now
                    && row.claim_expires_at.is_none_or(|exp| exp < now)
                    && is_head(&store.outbox, i)
            })
            .take(limit as usize)
            .collect();

        let expires = now + TimeDelta::from_std(lease).unwrap();
        let mut claimed = Vec::with_capacity(eligible.len());
        for i in eligible {
            let row = &mut store.outbox[i];
            row.claimed_by = Some(owner.to_owned());
            row.claim_expires_at = Some(expires);
            claimed.push(row.event.clone());
        }
        Ok(claimed)
    }

    async fn mark_published(&self, id: Uuid, owner: &str) -> Result<bool, UsersServiceError> {
        Ok(self.with_lease(id, owner, |row| {
            row.event.status = OutboxStatus::Published;
            row.event.published_at = Some(Utc::now());
            row.event.last_error = None;
        }))
    }

    async fn record_failure(
        &self,
        id: Uuid,
        owner: &str,
        attempts: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, UsersServiceError> {
        Ok(self.with_lease(id, owner, |row| {
            row.event.attempts = attempts;
            row.event.last_error = Some(error.to_owned());
            row.event.next_attempt_at = next_attempt_at;
        }))
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        owner: &str,
        error: &str,
    ) -> Result<bool, UsersServiceError> {
        Ok(self.with_lease(id, owner, |row| {
            row.event.status = OutboxStatus::Failed;
            row.event.last_error = Some(error.to_owned());
        }))
    }

    async fn stats(&self) -> Result<OutboxStats, UsersServiceError> {
        let store = self.store.lock().unwrap();
        let mut stats = OutboxStats::default();
        for row in &store.outbox {
            match row.event.status {
                OutboxStatus::Pending => {
                    stats.pending += 1;
                    stats.max_pending_attempts =
                        stats.max_pending_attempts.max(row.event.attempts);
                    stats.oldest_pending_at = Some(
                        stats
                            .oldest_pending_at
                            .map_or(row.event.created_at, |t| t.min(row.event.created_at)),
                    );
                }
                OutboxStatus::Published => stats.published += 1,
                OutboxStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

// ── FlakyPublisher ───────────────────────────────────────────────────────────

/// Publisher that fails a configured number of times per key, then succeeds.
/// Records every attempt, failed or not.
#[derive(Clone, Default)]
pub struct FlakyPublisher {
    failures_left: Arc<Mutex<HashMap<String, usize>>>,
    pub attempts: Arc<Mutex<Vec<UserEvent>>>,
    pub published: Arc<Mutex<Vec<UserEvent>>>,
}

impl FlakyPublisher {
    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn failing(key: &str, times: usize) -> Self {
        let publisher = Self::default();
        publisher
            .failures_left
            .lock()
            .unwrap()
            .insert(key.to_owned(), times);
        publisher
    }

    pub fn published(&self) -> Vec<UserEvent> {
        self.published.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> Vec<UserEvent> {
        self.attempts.lock().unwrap().clone()
    }
}

impl EventPublisher for FlakyPublisher {
    async fn publish(&self, event: &UserEvent) -> Result<PublishReceipt, RelayError> {
        self.attempts.lock().unwrap().push(event.clone());
        {
            let mut failures = self.failures_left.lock().unwrap();
            if let Some(left) = failures.get_mut(event.key()) {
                if *left > 0 {
                    *left -= 1;
                    return Err(RelayError::Publish("broker unavailable".into()));
                }
            }
        }
        let mut published = self.published.lock().unwrap();
        let duplicate = published.iter().any(|e| e.event_id == event.event_id);
        published.push(event.clone());
        Ok(PublishReceipt {
            sequence: published.len() as u64,
            duplicate,
        })
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn new_user(name: &str, email: &str, age: i32) -> NewUser {
    NewUser {
        name: name.into(),
        email: email.into(),
        age,
    }
}

/// Settings with no backoff so retried rows are eligible on the next pass.
pub fn immediate_settings() -> RelaySettings {
    RelaySettings {
        owner: "relay-test".into(),
        batch_size: 100,
        poll_interval: Duration::from_millis(10),
        claim_lease: Duration::from_secs(30),
        backoff: Backoff::from_millis(0, 0),
        stuck_alert_attempts: 3,
    }
}

pub fn relay(
    store: &SharedStore,
    publisher: FlakyPublisher,
    settings: RelaySettings,
) -> RelayPublisher<InMemoryOutbox, FlakyPublisher> {
    RelayPublisher::new(
        InMemoryOutbox {
            store: Arc::clone(store),
        },
        publisher,
        settings,
    )
}

pub fn user_repo(store: &SharedStore) -> InMemoryUserRepo {
    InMemoryUserRepo {
        store: Arc::clone(store),
    }
}
