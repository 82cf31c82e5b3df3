//! Periodic expiry task
//!
//! Runs [`ExpiryReaper::sweep`] on a fixed interval until its stop signal
//! flips. The first sweep happens one full interval after spawning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use vanish_core::ExpiryReaper;

// ----------------------------------------------------------------------------
// Reaper Task
// ----------------------------------------------------------------------------

/// Background task sweeping inactive identities
pub struct ReaperTask {
    reaper: ExpiryReaper,
    sweep_interval: Duration,
    shutdown: watch::Receiver<bool>,
    sweeps_completed: Arc<AtomicU64>,
}

impl ReaperTask {
    /// Spawn the task on the current tokio runtime
    pub fn spawn(reaper: ExpiryReaper, sweep_interval: Duration) -> ReaperHandle {
        let (shutdown_sender, shutdown) = watch::channel(false);
        let sweeps_completed = Arc::new(AtomicU64::new(0));

        let task = Self {
            reaper,
            sweep_interval,
            shutdown,
            sweeps_completed: sweeps_completed.clone(),
        };
        let join_handle = tokio::spawn(task.run());

        ReaperHandle {
            shutdown: shutdown_sender,
            join_handle,
            sweeps_completed,
        }
    }

    async fn run(mut self) {
        info!(
            "Expiry reaper starting (interval {:?}, threshold {:?})",
            self.sweep_interval,
            self.reaper.threshold()
        );

        let mut ticker = interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.reaper.sweep() {
                        Ok(0) => {}
                        Ok(erased) => info!("Expired {} inactive identities", erased),
                        Err(e) => error!("Expiry sweep failed: {}", e),
                    }
                    self.sweeps_completed.fetch_add(1, Ordering::SeqCst);
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!("Expiry reaper received stop signal");
                        break;
                    }
                }
            }
        }

        info!("Expiry reaper stopped");
    }
}

// ----------------------------------------------------------------------------
// Reaper Handle
// ----------------------------------------------------------------------------

/// Handle to a running [`ReaperTask`]
///
/// Dropping the handle also stops the task.
#[derive(Debug)]
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
    sweeps_completed: Arc<AtomicU64>,
}

impl ReaperHandle {
    /// Number of sweeps finished so far
    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps_completed.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Signal the task to stop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join_handle.await {
            warn!("Expiry reaper exited abnormally: {}", e);
        }
    }
}
