//! Synthesized system notifications.
//!
//! When the retry subsystem observes a permanent delivery failure or a
//! recovery, it surfaces that to the user as an ordinary notification
//! (`system_error` / `system_recovery`) created through the same gateway
//! path as everything else.
//!
//! Escalation loop-breaker: a failure to create a system notification is
//! logged and dropped, never parked in the outbox. Re-queueing it would
//! have a dead backend growing the outbox with escalations of its own
//! escalations.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error};

use crate::client::NotificationClient;
use crate::models::notification::{CreateNotification, NotificationKind};

#[derive(Clone)]
pub struct SystemEmitter {
    client: Arc<NotificationClient>,
    user_id: String,
}

impl SystemEmitter {
    pub fn new(client: Arc<NotificationClient>, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    /// Emit a `system_error` notification. `error_type` is a stable
    /// machine-readable tag ("notification_delivery",
    /// "critical_system_error", ...); `affected` lists the resource keys
    /// involved, if any.
    pub async fn system_error(&self, error_type: &str, error_message: &str, affected: &[String]) {
        let mut data = json!({
            "errorType": error_type,
            "errorMessage": error_message,
        });
        if !affected.is_empty() {
            data["affectedResources"] = json!(affected);
        }
        let cmd = CreateNotification::new(
            self.user_id.clone(),
            NotificationKind::SystemError,
            "System error",
            error_message,
        )
        .with_data(data);
        self.send(cmd).await;
    }

    /// Emit a `system_recovery` notification summarizing redelivered
    /// notifications.
    pub async fn system_recovery(&self, recovered: &[String]) {
        let message = format!(
            "{} queued notification{} delivered after retry",
            recovered.len(),
            if recovered.len() == 1 { "" } else { "s" }
        );
        let cmd = CreateNotification::new(
            self.user_id.clone(),
            NotificationKind::SystemRecovery,
            "Delivery recovered",
            message,
        )
        .with_data(json!({
            "errorType": "notification_delivery",
            "recoveredAt": Utc::now().to_rfc3339(),
            "affectedResources": recovered,
        }));
        self.send(cmd).await;
    }

    async fn send(&self, cmd: CreateNotification) {
        match self.client.create(&cmd).await {
            Ok(n) => debug!(id = %n.id, kind = cmd.kind.as_wire(), "system notification created"),
            // log only, never re-enter the retry queue from here
            Err(e) => error!(
                kind = cmd.kind.as_wire(),
                error = %e,
                "failed to create system notification, dropping"
            ),
        }
    }
}
