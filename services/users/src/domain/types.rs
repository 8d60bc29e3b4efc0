use chrono::{DateTime, Utc};
use uuid::Uuid;

use userhub_events::{EventType, UserEvent};

/// Longest accepted user name, in characters.
pub const NAME_MAX_LEN: usize = 100;
/// Longest accepted email address, in bytes.
pub const EMAIL_MAX_LEN: usize = 254;

/// User record owned by the users service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a create or full update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: i32,
}

/// Raw request fields before validation. Missing `age` defaults to 0.
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl UserInput {
    /// Validate every field, collecting all problems rather than stopping at
    /// the first one.
    pub fn validate(self) -> Result<NewUser, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.unwrap_or_default();
        if name.trim().is_empty() {
            errors.push(FieldError {
                field: "name",
                message: "must not be empty",
            });
        } else if name.chars().count() > NAME_MAX_LEN {
            errors.push(FieldError {
                field: "name",
                message: "must be at most 100 characters",
            });
        }

        let email = self.email.unwrap_or_default();
        if email.trim().is_empty() {
            errors.push(FieldError {
                field: "email",
                message: "must not be empty",
            });
        } else if !validate_email(&email) {
            errors.push(FieldError {
                field: "email",
                message: "must be a well-formed email address",
            });
        }

        let age = self.age.unwrap_or(0);
        if age < 0 {
            errors.push(FieldError {
                field: "age",
                message: "must be greater than or equal to 0",
            });
        } else if age > i64::from(i32::MAX) {
            errors.push(FieldError {
                field: "age",
                message: "is out of range",
            });
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(NewUser {
            name,
            email,
            age: age as i32,
        })
    }
}

/// Render field errors as `field - message;` pairs.
pub fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} - {};", e.field, e.message))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accepts `local@domain` where the domain is one or more dot-separated
/// labels of ASCII alphanumerics and hyphens.
pub fn validate_email(email: &str) -> bool {
    if email.len() > EMAIL_MAX_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Relay lifecycle of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Published,
    /// Payload can never be published; kept for inspection.
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PUBLISHED" => Ok(Self::Published),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// Outbox row describing one user mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    /// Also the `eventId` of the published payload.
    pub id: Uuid,
    /// Partition key; the user's email.
    pub aggregate_key: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Fresh PENDING row for a mutation of `user`, eligible immediately.
    pub fn pending_for(user: &User, event_type: EventType) -> Self {
        let event = UserEvent {
            event_id: Uuid::now_v7(),
            email: user.email.clone(),
            event_type,
        };
        let now = Utc::now();
        Self {
            id: event.event_id,
            aggregate_key: event.email.clone(),
            event_type: event_type.as_str().to_owned(),
            payload: serde_json::to_value(&event).unwrap_or(serde_json::Value::Null),
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            next_attempt_at: now,
            published_at: None,
        }
    }

    /// Decode the stored payload. Fails for rows that can never be published.
    pub fn decode(&self) -> Result<UserEvent, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Snapshot of relay backlog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub pending: i64,
    pub published: i64,
    pub failed: i64,
    pub oldest_pending_at: Option<DateTime<Utc>>,
    pub max_pending_attempts: i32,
}
