//! In-memory notification store for the active user.
//!
//! Owns the canonical list plus derived statistics and mediates every
//! mutation so the two never drift apart: stats are recomputed from the
//! list after each operation, which also makes re-marking an already-read
//! entry a no-op instead of an underflow.
//!
//! Mutations are network-first: the local state only changes once the
//! service call succeeded, so a failed call leaves the store untouched.
//! Concurrent refreshes are deliberately not coalesced: the last response
//! to be applied wins, whichever was requested first.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::NotificationClient;
use crate::errors::AppError;
use crate::models::notification::{
    CreateNotification, Notification, NotificationFilter, NotificationStats,
};

#[derive(Default)]
struct StoreState {
    notifications: Vec<Notification>,
    stats: NotificationStats,
    last_error: Option<String>,
}

/// Shared, cheaply-cloneable store bound to one user.
#[derive(Clone)]
pub struct NotificationStore {
    client: Arc<NotificationClient>,
    user_id: String,
    state: Arc<RwLock<StoreState>>,
}

impl NotificationStore {
    pub fn new(client: Arc<NotificationClient>, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Fetch and replace the whole list. Returns the new list length.
    pub async fn refresh(&self, filter: &NotificationFilter) -> Result<usize, AppError> {
        match self.client.list(filter).await {
            Ok(list) => {
                let mut state = self.state.write().await;
                state.notifications = list;
                state.stats = NotificationStats::compute(&state.notifications);
                state.last_error = None;
                Ok(state.notifications.len())
            }
            Err(e) => {
                self.state.write().await.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Create through the service and prepend on success. Failures
    /// propagate untouched; queueing for retry belongs to the delivery
    /// service, not here.
    pub async fn create(&self, cmd: &CreateNotification) -> Result<Notification, AppError> {
        let created = self.client.create(cmd).await?;
        let mut state = self.state.write().await;
        state.notifications.insert(0, created.clone());
        state.stats = NotificationStats::compute(&state.notifications);
        Ok(created)
    }

    /// Mark one entry read, network-first. Idempotent: re-marking a read
    /// entry changes nothing locally.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), AppError> {
        let updated = self.client.mark_as_read(id).await?;
        let mut state = self.state.write().await;
        if let Some(slot) = state.notifications.iter_mut().find(|n| n.id == id) {
            *slot = updated;
        }
        state.stats = NotificationStats::compute(&state.notifications);
        Ok(())
    }

    /// Mark every currently-unread entry read, optionally scoped to one
    /// project. With a project scope this fans out one call per entry in
    /// parallel and fails wholesale if any single call fails; without one
    /// it uses the bulk endpoint (idempotent against "nothing to mark").
    /// Returns how many entries were marked.
    pub async fn mark_all_as_read(&self, project_id: Option<&str>) -> Result<usize, AppError> {
        match project_id {
            Some(project) => {
                let ids: Vec<String> = {
                    let state = self.state.read().await;
                    state
                        .notifications
                        .iter()
                        .filter(|n| !n.read && n.project_id.as_deref() == Some(project))
                        .map(|n| n.id.clone())
                        .collect()
                };
                if ids.is_empty() {
                    return Ok(0);
                }
                let updated =
                    try_join_all(ids.iter().map(|id| self.client.mark_as_read(id))).await?;

                let mut state = self.state.write().await;
                for n in updated {
                    if let Some(slot) = state.notifications.iter_mut().find(|s| s.id == n.id) {
                        *slot = n;
                    }
                }
                state.stats = NotificationStats::compute(&state.notifications);
                Ok(ids.len())
            }
            None => {
                self.client.mark_all_as_read(&self.user_id).await?;
                let now = Utc::now();
                let mut state = self.state.write().await;
                let mut marked = 0;
                for n in state.notifications.iter_mut().filter(|n| !n.read) {
                    n.mark_read(now);
                    marked += 1;
                }
                state.stats = NotificationStats::compute(&state.notifications);
                debug!(marked, "marked all notifications read");
                Ok(marked)
            }
        }
    }

    /// Delete, network-first; remove locally on success.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.client.delete(id).await?;
        let mut state = self.state.write().await;
        state.notifications.retain(|n| n.id != id);
        state.stats = NotificationStats::compute(&state.notifications);
        Ok(())
    }

    pub async fn snapshot(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn stats(&self) -> NotificationStats {
        self.state.read().await.stats.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }
}
