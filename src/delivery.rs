//! Create-or-queue delivery front door.
//!
//! The store's `create` is network-first and propagates failures; this
//! service is the caller that catches them and parks the request in the
//! outbox so a later retry pass can redeliver it. Callers get a
//! [`DeliveryOutcome`] instead of an error for the queued case, since a parked
//! request is pending, not failed.

use tracing::warn;

use crate::errors::AppError;
use crate::models::notification::{CreateNotification, FailedDelivery, Notification};
use crate::outbox::Outbox;
use crate::store::NotificationStore;

#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The service accepted the notification.
    Delivered(Notification),
    /// The service could not be reached or rejected the call; the request
    /// is parked in the outbox with a zeroed attempt counter.
    Queued,
}

#[derive(Clone)]
pub struct DeliveryService {
    store: NotificationStore,
    outbox: Outbox,
}

impl DeliveryService {
    pub fn new(store: NotificationStore, outbox: Outbox) -> Self {
        Self { store, outbox }
    }

    pub async fn send(&self, cmd: CreateNotification) -> Result<DeliveryOutcome, AppError> {
        match self.store.create(&cmd).await {
            Ok(n) => Ok(DeliveryOutcome::Delivered(n)),
            Err(e) => {
                warn!(
                    key = %cmd.idempotency_key,
                    error = %e,
                    "notification create failed, queueing for retry"
                );
                self.outbox.append(FailedDelivery::new(cmd)).await?;
                Ok(DeliveryOutcome::Queued)
            }
        }
    }
}
