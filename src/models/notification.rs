//! Notification domain model and the wire-format boundary.
//!
//! The notification service is loose about shapes: ids arrive as JSON
//! numbers from some deployments and strings from others, `data` comes as a
//! JSON-encoded string or an inline object, and `createdAt` is sometimes
//! absent. All of that slop is absorbed once, in the [`wire`] layer; the
//! rest of the crate only ever sees the canonical types below.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ── Kinds ─────────────────────────────────────────────────────

/// Event categories surfaced to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskUpdated,
    TaskCompleted,
    OkrUpdated,
    ProjectUpdated,
    SprintStarted,
    SprintCompleted,
    MemberAdded,
    MemberRemoved,
    SystemError,
    SystemRecovery,
    /// Catch-all for kinds this build does not know about. Decoding an
    /// unrecognized wire value must not fail the surrounding list.
    #[serde(other)]
    Unknown,
}

impl NotificationKind {
    /// Parse a wire value ("task_assigned", "system_error", ...).
    pub fn from_wire(s: &str) -> Self {
        serde_json::from_value(Value::String(s.to_owned())).unwrap_or(Self::Unknown)
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::TaskUpdated => "task_updated",
            Self::TaskCompleted => "task_completed",
            Self::OkrUpdated => "okr_updated",
            Self::ProjectUpdated => "project_updated",
            Self::SprintStarted => "sprint_started",
            Self::SprintCompleted => "sprint_completed",
            Self::MemberAdded => "member_added",
            Self::MemberRemoved => "member_removed",
            Self::SystemError => "system_error",
            Self::SystemRecovery => "system_recovery",
            Self::Unknown => "unknown",
        }
    }
}

/// Client-side delivery bookkeeping state. Hint only; the backend does not
/// persist it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

// ── Core types ────────────────────────────────────────────────

/// One user-facing event. Every notification belongs to exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Always a JSON object; `{}` when the backend sent nothing usable.
    pub data: Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,

    // Delivery hints, filled in client-side only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Notification {
    /// Flip to read. `read == false` with `read_at == Some(..)` must never
    /// coexist, so both fields change together here and nowhere else.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        self.read = true;
        self.read_at = Some(at);
    }
}

/// A notification creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub user_id: String,
    pub project_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Value,
    /// Client-minted key sent with every attempt, so the backend can
    /// deduplicate a redelivery whose earlier success we failed to observe.
    pub idempotency_key: Uuid,
}

impl CreateNotification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: None,
            kind,
            title: title.into(),
            message: message.into(),
            data: Value::Object(serde_json::Map::new()),
            idempotency_key: Uuid::new_v4(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Attach a structured payload. Only objects are representable on the
    /// wire; anything else collapses to `{}`.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = if data.is_object() {
            data
        } else {
            Value::Object(serde_json::Map::new())
        };
        self
    }
}

/// List-query filter. The backend requires `userId` on every list call, so
/// the field is not optional here.
#[derive(Debug, Clone)]
pub struct NotificationFilter {
    pub user_id: String,
    pub project_id: Option<String>,
    pub kind: Option<NotificationKind>,
    pub read: Option<bool>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl NotificationFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: None,
            kind: None,
            read: None,
            date_from: None,
            date_to: None,
        }
    }

    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn of_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn unread_only(mut self) -> Self {
        self.read = Some(false);
        self
    }
}

/// Derived statistics over the current in-memory list. Never fetched from
/// the server; recomputed from scratch after every fetch or mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub total: usize,
    pub unread: usize,
    pub by_kind: HashMap<NotificationKind, usize>,
    pub by_project: HashMap<String, usize>,
}

impl NotificationStats {
    pub fn compute(notifications: &[Notification]) -> Self {
        let mut stats = Self {
            total: notifications.len(),
            ..Self::default()
        };
        for n in notifications {
            if !n.read {
                stats.unread += 1;
            }
            *stats.by_kind.entry(n.kind).or_default() += 1;
            if let Some(project) = &n.project_id {
                *stats.by_project.entry(project.clone()).or_default() += 1;
            }
        }
        stats
    }
}

/// A creation request that could not be delivered, parked in the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub request: CreateNotification,
    pub queued_at: DateTime<Utc>,
    /// Failed redelivery attempts so far. Entries at the ceiling are
    /// escalated and dropped by the retry pass.
    pub attempts: u32,
}

impl FailedDelivery {
    pub fn new(request: CreateNotification) -> Self {
        Self {
            request,
            queued_at: Utc::now(),
            attempts: 0,
        }
    }
}

// ── Wire layer ────────────────────────────────────────────────

/// Raw backend shapes and their normalization into the canonical types.
/// Nothing outside the gateway client should touch these.
pub(crate) mod wire {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use super::{CreateNotification, Notification, NotificationKind};

    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum RawId {
        Str(String),
        Num(i64),
    }

    impl RawId {
        fn into_string(self) -> String {
            match self {
                Self::Str(s) => s,
                Self::Num(n) => n.to_string(),
            }
        }
    }

    /// `data` arrives as an inline object, a JSON-encoded string, or junk.
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum RawData {
        Object(serde_json::Map<String, Value>),
        Encoded(String),
        Other(Value),
    }

    impl RawData {
        fn into_object(self) -> Value {
            match self {
                Self::Object(map) => Value::Object(map),
                Self::Encoded(s) => match serde_json::from_str::<Value>(&s) {
                    Ok(Value::Object(map)) => Value::Object(map),
                    _ => empty_object(),
                },
                Self::Other(_) => empty_object(),
            }
        }
    }

    fn empty_object() -> Value {
        Value::Object(serde_json::Map::new())
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawNotification {
        pub id: RawId,
        pub user_id: String,
        #[serde(default)]
        pub project_id: Option<String>,
        #[serde(rename = "type")]
        pub kind: NotificationKind,
        #[serde(default)]
        pub title: String,
        #[serde(default)]
        pub message: String,
        #[serde(default)]
        pub data: Option<RawData>,
        #[serde(default)]
        pub read: bool,
        #[serde(default)]
        pub created_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub read_at: Option<DateTime<Utc>>,
    }

    impl RawNotification {
        pub fn into_notification(self) -> Notification {
            Notification {
                id: self.id.into_string(),
                user_id: self.user_id,
                project_id: self.project_id,
                kind: self.kind,
                title: self.title,
                message: self.message,
                data: self.data.map_or_else(empty_object, RawData::into_object),
                read: self.read,
                created_at: self.created_at.unwrap_or_else(Utc::now),
                read_at: self.read_at,
                delivery_status: None,
                retry_count: None,
                last_retry_at: None,
                failure_reason: None,
            }
        }
    }

    /// Outbound body for `POST /notifications`. `data` crosses the wire
    /// JSON-encoded as a string, per the backend contract.
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateBody<'a> {
        pub user_id: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub project_id: Option<&'a str>,
        #[serde(rename = "type")]
        pub kind: NotificationKind,
        pub title: &'a str,
        pub message: &'a str,
        pub data: String,
    }

    impl<'a> From<&'a CreateNotification> for CreateBody<'a> {
        fn from(cmd: &'a CreateNotification) -> Self {
            Self {
                user_id: &cmd.user_id,
                project_id: cmd.project_id.as_deref(),
                kind: cmd.kind,
                title: &cmd.title,
                message: &cmd.message,
                data: cmd.data.to_string(),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
