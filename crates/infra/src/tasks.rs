//! Tracked background tasks for fire-and-forget side effects.
//!
//! Dispatched work is not awaited by the caller, but it is not unobserved
//! either: finished tasks are reaped on the next spawn and panics are logged,
//! and [`BackgroundTasks::drain`] waits for everything still in flight
//! (graceful shutdown, tests).

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, error, info_span, warn};

#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        // A panic while holding the lock leaves the set itself intact.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Detach `fut` onto the current runtime. Outside a runtime the task is
    /// dropped with a warning rather than panicking the caller.
    pub fn spawn<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            warn!(task = label, "no async runtime available, background task dropped");
            return;
        };

        let mut set = self.lock();
        while let Some(outcome) = set.try_join_next() {
            log_outcome(outcome);
        }
        set.spawn_on(fut.instrument(info_span!("background", task = label)), &handle);
    }

    /// Number of tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every task spawned so far, including ones spawned while draining.
    pub async fn drain(&self) {
        loop {
            let mut set = std::mem::take(&mut *self.lock());
            if set.is_empty() {
                return;
            }
            while let Some(outcome) = set.join_next().await {
                log_outcome(outcome);
            }
        }
    }
}

fn log_outcome(outcome: Result<(), JoinError>) {
    if let Err(e) = outcome {
        if e.is_panic() {
            error!(error = %e, "background task panicked");
        }
    }
}
