//! Periodic refresh of the service cache

use crate::cache::{RefreshOutcome, ServiceCache};
use crate::errors::{Result, SyncError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

/// Polling period used when nothing else is configured.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(30);

/// Refreshes the cache once on start and then every `period` until stopped
pub struct SyncScheduler {
    cache: Arc<ServiceCache>,
    period: Duration,
    running: Mutex<Option<RunningTask>>,
}

struct RunningTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    pub fn new(cache: Arc<ServiceCache>, period: Duration) -> Self {
        Self {
            cache,
            period,
            running: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the refresh loop. Fails if the period is zero or a loop started
    /// here is still running.
    pub async fn start(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(SyncError::Config(
                "refresh period must be greater than 0".to_string(),
            ));
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SyncError::SchedulerRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(&self.cache);
        let period = self.period;
        let handle = tokio::spawn(async move {
            refresh_loop(cache, period, shutdown_rx).await;
        });

        info!(period_secs = self.period.as_secs(), "sync scheduler started");
        *running = Some(RunningTask {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Cancel the timer and wait for the loop to exit.
    ///
    /// A refresh the loop is awaiting at this point is dropped before it can
    /// touch the cache; once this returns no further refresh fires. Calling
    /// `stop` on an idle scheduler is a no-op.
    pub async fn stop(&self) {
        let Some(task) = self.running.lock().await.take() else {
            return;
        };

        let _ = task.shutdown_tx.send(true);
        if let Err(e) = task.handle.await {
            warn!("sync scheduler task ended abnormally: {}", e);
        }
        info!("sync scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

#[instrument(skip_all)]
async fn refresh_loop(
    cache: Arc<ServiceCache>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                debug!("dropping in-flight refresh on shutdown");
                break;
            }
            result = cache.refresh() => match result {
                Ok(RefreshOutcome::Applied(count)) => debug!(count, "scheduled refresh applied"),
                Ok(RefreshOutcome::Superseded) => debug!("scheduled refresh superseded"),
                // Already recorded in the cache's error slot.
                Err(e) => debug!("scheduled refresh failed: {}", e),
            },
        }
    }
}
