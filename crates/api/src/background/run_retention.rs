//! Periodic eviction of finished runs from the run registry.
//!
//! Finished records keep their queue and metadata resolvable so late
//! clients can still read the snapshot. This job drops them once they have
//! been finished for longer than the retention period. Running records are
//! never touched.

use std::sync::Arc;
use std::time::Duration;

use scriptrun_core::runs::RunManager;
use tokio_util::sync::CancellationToken;

/// Upper bound on how often the sweep runs.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep at a tenth of the retention period, capped at one minute.
pub fn sweep_interval(retention: Duration) -> Duration {
    (retention / 10).clamp(Duration::from_millis(100), MAX_SWEEP_INTERVAL)
}

/// Run the retention loop until `cancel` is triggered.
pub async fn run(runs: Arc<RunManager>, retention: Duration, cancel: CancellationToken) {
    let period = sweep_interval(retention);
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_ms = period.as_millis() as u64,
        "Run retention job started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Run retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = runs.evict_finished(retention).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Run retention: evicted finished runs");
                } else {
                    tracing::debug!("Run retention: nothing to evict");
                }
            }
        }
    }
}
