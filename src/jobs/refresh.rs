//! Periodic notification list refresh.
//!
//! Fetches immediately on start, then on a fixed period with no backoff and no
//! jitter. A failed fetch is logged and the loop keeps ticking; the store
//! retains its previous list until a fetch succeeds again.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, warn};

use crate::jobs::JobHandle;
use crate::models::notification::NotificationFilter;
use crate::store::NotificationStore;

pub fn spawn(store: NotificationStore, filter: NotificationFilter, period: Duration) -> JobHandle {
    let (tx, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        // first tick completes immediately: fetch-on-start
        let mut ticker = time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.refresh(&filter).await {
                        Ok(count) => debug!(count, "notification list refreshed"),
                        Err(e) => warn!(error = %e, "notification refresh failed"),
                    }
                }
                _ = rx.changed() => {
                    debug!("refresh worker stopping");
                    break;
                }
            }
        }
    });
    JobHandle::new("refresh", tx, task)
}
