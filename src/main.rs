mod blackboard; // shared map status for the sink and the watchdog
mod config;
mod sim; // synthetic pose/cloud source

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use blackboard::{Blackboard, clear_fault, raise_fault, record_map, snapshot};
use flatmap_fusion::{FusionEngine, FusionParams, StampedPose, Topic, run_fusion_task};
use flatmap_grid::{GridSnapshot, OccupancyGrid, PointCloudFrame};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Capacity of the map output topic; subscribers only care about the newest grid.
const MAP_TOPIC_CAPACITY: usize = 2;
/// Ticks without a snapshot before the watchdog complains.
const STALE_MAP_TICKS: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config_path = std::env::args().nth(1);
    let cfg = config::load_config(config_path.as_deref()).context("loading configuration")?;

    let grid = OccupancyGrid::from_extents(cfg.max_width_m, cfg.max_height_m, cfg.resolution)
        .context("initializing grid")?;
    let params = FusionParams {
        update_radius: cfg.update_radius_m,
        ground_height_threshold: cfg.ground_height_threshold,
        ..FusionParams::default()
    };
    let engine = FusionEngine::new(grid, params).context("initializing fusion engine")?;

    let pose_topic: Topic<StampedPose> = Topic::new(cfg.queue_size);
    let cloud_topic: Topic<PointCloudFrame> = Topic::new(cfg.queue_size);
    let map_topic: Topic<GridSnapshot> = Topic::new(MAP_TOPIC_CAPACITY);

    info!("Subscribing to cloud: {}", cfg.cloud_topic);
    info!("Subscribing to odom: {}", cfg.odom_topic);
    info!("Publishing map2d to: {}", cfg.map2d_topic);

    let bb: Blackboard = Arc::default();
    let map_rx = map_topic.subscribe();
    let fusion = run_fusion_task(
        engine,
        pose_topic.subscribe(),
        cloud_topic.subscribe(),
        map_topic.clone(),
        cfg.tick_period(),
    );

    if cfg.sim.enabled {
        info!("Spawning simulation thread...");
        sim::spawn(cfg.sim.clone(), pose_topic.clone(), cloud_topic.clone())
            .context("spawning simulation thread")?;
    } else {
        info!("Simulation disabled, waiting for external pose and cloud publishers");
    }

    tokio::select! {
        result = fusion => {
            let stats = result?;
            info!(?stats, "Fusion task exited");
        }
        result = map_sink(bb.clone(), map_rx, cfg.map2d_topic.clone()) => result?,
        result = watchdog(bb, cfg.tick_period()) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}

/// Stands in for the map publisher: records each snapshot on the blackboard.
async fn map_sink(
    bb: Blackboard,
    mut map_rx: broadcast::Receiver<Arc<GridSnapshot>>,
    topic: String,
) -> anyhow::Result<()> {
    loop {
        match map_rx.recv().await {
            Ok(map) => {
                record_map(&bb, &map);
                let state = snapshot(&bb);
                info!(
                    topic = %topic,
                    stamp = map.stamp.as_secs_f64(),
                    width = map.width,
                    height = map.height,
                    occupied = state.occupied,
                    free = state.free,
                    "Map snapshot published"
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Map sink lagged by {} snapshots.", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                error!("Map channel closed.");
                return Err(anyhow::anyhow!("Map channel closed for map sink"));
            }
        }
    }
}

async fn watchdog(bb: Blackboard, tick_period: Duration) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let limit = tick_period * STALE_MAP_TICKS;
    let mut tick = tokio::time::interval(tick_period);
    loop {
        tick.tick().await;
        let state = snapshot(&bb);
        let age = state.last_snapshot_ts.elapsed();
        if age > limit {
            warn!(
                ?age,
                snapshots = state.snapshots,
                "No map update! Inputs may be stale or missing."
            );
            raise_fault(&bb, "map stale");
        } else if state.faults.iter().any(|f| f == "map stale") {
            info!("Map updates resumed.");
            clear_fault(&bb, "map stale");
        }
    }
}
