//! Liveness monitor task.
//!
//! Runs one process-wide sweep on a fixed interval. Each sweep evicts
//! connections whose liveness flag is still cleared from the previous
//! sweep and probes the rest. An unresponsive connection survives at
//! most one full interval before eviction on the next, so the worst
//! case is about twice the interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::usecase::ProbeLivenessUseCase;

/// Default sweep interval
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the periodic liveness monitor.
///
/// The returned handle should be aborted when the server shuts down.
pub fn spawn_liveness_monitor(
    usecase: Arc<ProbeLivenessUseCase>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so connections get a
        // full interval before their first probe
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let sweep = usecase.execute().await;
            if !sweep.evicted.is_empty() {
                tracing::info!(
                    "Liveness sweep: probed {} connection(s), evicted {}",
                    sweep.pinged.len(),
                    sweep.evicted.len()
                );
            } else {
                tracing::debug!(
                    "Liveness sweep: probed {} connection(s)",
                    sweep.pinged.len()
                );
            }
        }
    })
}
