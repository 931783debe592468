// Collector scheduling with a single-flight guard.
//
// The periodic task and the manual trigger share one `CollectorHandle`, so at
// most one pass is ever in flight; a second caller gets `AlreadyRunning`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use folio_common::protocol::http::CollectionReport;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::{AssetCollector, CollectorError};

#[derive(Debug, Clone)]
pub struct CollectorHandle {
    collector: Arc<AssetCollector>,
    running: Arc<AtomicBool>,
}

struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CollectorHandle {
    pub fn new(collector: AssetCollector) -> Self {
        Self { collector: Arc::new(collector), running: Arc::new(AtomicBool::new(false)) }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one pass unless another is in flight.
    pub async fn try_run(&self) -> Result<CollectionReport, CollectorError> {
        let guard = self.acquire()?;
        let collector = Arc::clone(&self.collector);
        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            collector.run_pass_at(Utc::now())
        })
        .await;

        result.map_err(|e| CollectorError::Aborted(e.to_string()))
    }

    fn acquire(&self) -> Result<RunningGuard, CollectorError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunningGuard(Arc::clone(&self.running)))
            .map_err(|_| CollectorError::AlreadyRunning)
    }
}

/// Runs a pass every `every`, first one after a full interval.
pub fn spawn_collector(handle: CollectorHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = every.as_secs(), "asset collector scheduled");

        loop {
            ticker.tick().await;
            match handle.try_run().await {
                Ok(_) => {}
                Err(CollectorError::AlreadyRunning) => {
                    info!("scheduled collector pass skipped, manual pass in flight")
                }
                Err(e) => warn!(error = %e, "scheduled collector pass failed"),
            }
        }
    })
}
