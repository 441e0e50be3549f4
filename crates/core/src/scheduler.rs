//! Interval-driven refresh with coalescing.
//!
//! One scheduler instance drives one kind of refresh (alert regeneration,
//! price ticks) as an explicit start/stop task rather than a fire-and-forget
//! timer. A trigger arriving while a run is in flight is dropped, not
//! queued; timer fires and manual refreshes share the same guard.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::errors::Result;

/// Default cadence for alert regeneration.
pub const ALERT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// The unit of work a scheduler drives.
#[async_trait]
pub trait RefreshTask: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

pub struct RefreshScheduler {
    task: Arc<dyn RefreshTask>,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(task: Arc<dyn RefreshTask>, interval: Duration) -> Self {
        Self {
            task,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Start the periodic loop. The first run happens after one full
    /// interval; call [`trigger`](Self::trigger) for an immediate refresh.
    /// Starting an already-running scheduler is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            debug!("scheduler '{}' already running", self.task.name());
            return;
        }

        let task = self.task.clone();
        let in_flight = self.in_flight.clone();
        let interval = self.interval;
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                Self::run_guarded(&task, &in_flight).await;
            }
        }));
        debug!(
            "scheduler '{}' started, interval {:?}",
            self.task.name(),
            self.interval
        );
    }

    /// Stop the periodic loop. In-flight work on the current tick is
    /// aborted; the guard resets on the next trigger.
    pub fn stop(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
            self.in_flight.store(false, Ordering::SeqCst);
            debug!("scheduler '{}' stopped", self.task.name());
        }
    }

    /// Run the task now unless a run is already in flight. Returns whether
    /// the task actually ran; `false` means the trigger coalesced away.
    pub async fn trigger(&self) -> bool {
        Self::run_guarded(&self.task, &self.in_flight).await
    }

    async fn run_guarded(task: &Arc<dyn RefreshTask>, in_flight: &AtomicBool) -> bool {
        if in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("refresh '{}' already in flight, coalescing", task.name());
            return false;
        }
        if let Err(e) = task.run().await {
            warn!("refresh '{}' failed: {}", task.name(), e);
        }
        in_flight.store(false, Ordering::SeqCst);
        true
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
