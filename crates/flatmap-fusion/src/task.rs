//! The async task that drives a [`FusionEngine`](crate::FusionEngine) from its input topics.

use std::sync::Arc;
use std::time::Duration;

use flatmap_grid::{GridSnapshot, PointCloudFrame};
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bus::Topic;
use crate::engine::{FusionEngine, FusionStats, StampedPose, TickOutcome};
use crate::error::FusionError;

/// Fixed-rate fusion task.
///
/// Publishes the startup snapshot, then multiplexes pose arrival, cloud
/// arrival and the tick on a single task, so the engine is only ever touched
/// by one trigger at a time and needs no lock. The first tick fires one
/// period after start.
///
/// # Arguments
/// * `engine` - The engine, moved into the task for its lifetime.
/// * `pose_rx` - Latest-pose subscription.
/// * `cloud_rx` - Point-cloud subscription.
/// * `map_tx` - Topic receiving one snapshot at startup and one per fused cycle.
/// * `tick_period` - Time between fusion ticks.
///
/// # Returns
/// The engine counters once either input channel closes.
pub async fn run_fusion_task(
    mut engine: FusionEngine,
    mut pose_rx: broadcast::Receiver<Arc<StampedPose>>,
    mut cloud_rx: broadcast::Receiver<Arc<PointCloudFrame>>,
    map_tx: Topic<GridSnapshot>,
    tick_period: Duration,
) -> anyhow::Result<FusionStats> {
    if tick_period.is_zero() {
        return Err(FusionError::InvalidParameter("Tick period must be non-zero").into());
    }
    info!(
        width = engine.grid().width(),
        height = engine.grid().height(),
        resolution = engine.grid().resolution(),
        update_radius = engine.update_radius(),
        ?tick_period,
        "Fusion task started"
    );
    map_tx.publish_shared(engine.initial_snapshot());

    let mut ticker = time::interval_at(Instant::now() + tick_period, tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = engine.tick(Instant::now().into_std());
                if let TickOutcome::Fused(report) = outcome {
                    let delivered = map_tx.publish_shared(report.snapshot);
                    debug!(delivered, "Published map snapshot");
                }
            }
            result = pose_rx.recv() => {
                match result {
                    Ok(pose) => engine.on_pose(*pose),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Older poses are irrelevant, the next recv yields a newer one
                        warn!("Pose receiver lagged by {} messages in fusion task.", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Pose channel closed. Stopping fusion task.");
                        break;
                    }
                }
            }
            result = cloud_rx.recv() => {
                match result {
                    Ok(cloud) => engine.on_cloud(cloud, Instant::now().into_std()),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Point cloud receiver lagged by {} messages in fusion task.", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Point cloud channel closed. Stopping fusion task.");
                        break;
                    }
                }
            }
        }
    }

    let stats = engine.stats();
    info!(
        cycles_fused = stats.cycles_fused,
        skipped_waiting = stats.skipped_waiting,
        skipped_stale = stats.skipped_stale,
        "Fusion task finished"
    );
    Ok(stats)
}
