//! Background workers with an explicit start/stop lifecycle.
//!
//! Each worker is a spawned task owning a fixed-period ticker and a
//! shutdown receiver; [`JobHandle::stop`] flips the shutdown flag and joins
//! the task, so callers can tear a worker down deterministically instead of
//! leaving a loop running against dropped state.

pub mod refresh;
pub mod retry;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub struct JobHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub(crate) fn new(
        name: &'static str,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            shutdown,
            task,
        }
    }

    /// Signal the worker to stop and wait for it to finish its current
    /// iteration.
    pub async fn stop(self) {
        debug!(job = self.name, "stopping background job");
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                error!(job = self.name, error = %e, "background job panicked");
            }
        }
    }
}
