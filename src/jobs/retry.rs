//! Outbox drain: redeliver queued notification-creation requests.
//!
//! Runs on a timer in the daemon and on demand from the CLI. Each pass
//! walks the queue once: entries already at the attempt ceiling are dropped
//! and escalated as a `system_error`, the rest are re-sent: success
//! removes them, failure bumps the counter and keeps them for the next
//! pass. Any redelivery at all is summarized in one `system_recovery`
//! notification.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::client::NotificationClient;
use crate::errors::AppError;
use crate::jobs::JobHandle;
use crate::notification::system::SystemEmitter;
use crate::outbox::Outbox;

/// What one drain pass did.
#[derive(Debug, Default)]
pub struct RetryOutcome {
    /// Idempotency keys of requests redelivered this pass.
    pub delivered: Vec<String>,
    /// Entries written back for the next pass.
    pub still_failed: usize,
    /// Entries dropped after exhausting the attempt ceiling.
    pub escalated: usize,
}

/// One drain pass over the outbox. An empty queue returns immediately with
/// zero network calls.
pub async fn run_retry_pass(
    client: &NotificationClient,
    outbox: &Outbox,
    emitter: &SystemEmitter,
    max_attempts: u32,
) -> Result<RetryOutcome, AppError> {
    let queued = outbox.load().await?;
    if queued.is_empty() {
        return Ok(RetryOutcome::default());
    }

    info!(count = queued.len(), "draining failed-delivery outbox");
    let mut outcome = RetryOutcome::default();
    let mut still_failed = Vec::new();

    for mut entry in queued {
        let key = entry.request.idempotency_key.to_string();

        // ceiling reached before this pass: escalate instead of retrying
        if entry.attempts >= max_attempts {
            warn!(
                key = %key,
                attempts = entry.attempts,
                title = %entry.request.title,
                "dropping notification after exhausting delivery attempts"
            );
            emitter
                .system_error(
                    "notification_delivery",
                    &format!(
                        "Failed to deliver notification '{}' after {} attempts",
                        entry.request.title, entry.attempts
                    ),
                    std::slice::from_ref(&key),
                )
                .await;
            outcome.escalated += 1;
            continue;
        }

        match client.create(&entry.request).await {
            Ok(n) => {
                debug!(key = %key, id = %n.id, "redelivered queued notification");
                outcome.delivered.push(key);
            }
            Err(e) => {
                entry.attempts += 1;
                debug!(key = %key, attempts = entry.attempts, error = %e, "redelivery failed");
                still_failed.push(entry);
            }
        }
    }

    outcome.still_failed = still_failed.len();
    outbox.replace(&still_failed).await?;

    if !outcome.delivered.is_empty() {
        info!(
            count = outcome.delivered.len(),
            "queued notifications recovered"
        );
        emitter.system_recovery(&outcome.delivered).await;
    }

    Ok(outcome)
}

/// Guarded drain: a failing pass (outbox I/O, queue rewrite) is reported as
/// a `critical_system_error` notification and swallowed; the retry
/// machinery must never take the daemon down.
pub async fn drain_outbox(
    client: &NotificationClient,
    outbox: &Outbox,
    emitter: &SystemEmitter,
    max_attempts: u32,
) -> RetryOutcome {
    match run_retry_pass(client, outbox, emitter, max_attempts).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "retry pass failed");
            emitter
                .system_error(
                    "critical_system_error",
                    &format!("Notification retry pass failed: {e}"),
                    &[],
                )
                .await;
            RetryOutcome::default()
        }
    }
}

/// Spawn the periodic drain worker.
pub fn spawn(
    client: Arc<NotificationClient>,
    outbox: Outbox,
    emitter: SystemEmitter,
    period: Duration,
    max_attempts: u32,
) -> JobHandle {
    let (tx, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = drain_outbox(&client, &outbox, &emitter, max_attempts).await;
                    if outcome.escalated > 0 || !outcome.delivered.is_empty() {
                        info!(
                            delivered = outcome.delivered.len(),
                            still_failed = outcome.still_failed,
                            escalated = outcome.escalated,
                            "retry pass complete"
                        );
                    }
                }
                _ = rx.changed() => {
                    debug!("retry worker stopping");
                    break;
                }
            }
        }
    });
    JobHandle::new("retry", tx, task)
}
