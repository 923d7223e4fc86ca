//! The fusion state machine.
//!
//! The engine owns the grid and the latest pose and cloud. Inputs overwrite
//! the latest value (no history, no interpolation). A tick either runs a full
//! clear-mark-snapshot cycle or is skipped outright:
//!
//! * no pose or no cloud ever received: skipped, with a rate-limited warning
//!   per missing input;
//! * the current cloud was already fused: skipped silently;
//! * otherwise: clear the window around the pose, mark obstacles from the
//!   cloud with the same center and radius, snapshot, and mark the cloud
//!   consumed.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flatmap_grid::{
    ClassifyStats, GridSnapshot, OccupancyGrid, PointClassifier, PointCloudFrame, Stamp,
    WorldPoint, clear_circle,
};
use tracing::{debug, info, trace, warn};

use crate::error::FusionError;
use crate::throttle::Throttle;

/// Latest robot pose. Only the planar position and the stamp are used.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StampedPose {
    /// Time of the pose estimate.
    pub stamp: Stamp,
    /// Position (x, y, z) in the map frame.
    pub position: [f64; 3],
    /// Orientation quaternion (x, y, z, w). Carried but unused.
    pub orientation: [f64; 4],
}

impl StampedPose {
    /// A pose at `(x, y, z)` with identity orientation.
    pub const fn new(stamp: Stamp, x: f64, y: f64, z: f64) -> Self {
        StampedPose {
            stamp,
            position: [x, y, z],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Planar projection of the position.
    pub fn planar(&self) -> WorldPoint {
        WorldPoint::new(self.position[0], self.position[1])
    }
}

/// Tunables for a fusion cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    /// Radius (m) of the window cleared and re-marked each cycle.
    pub update_radius: f64,
    /// Points at or below this height (m) are ground.
    pub ground_height_threshold: f64,
    /// Minimum spacing of repeated diagnostics.
    pub diagnostic_period: Duration,
}

impl Default for FusionParams {
    fn default() -> Self {
        FusionParams {
            update_radius: 15.0,
            ground_height_threshold: 0.55,
            diagnostic_period: Duration::from_secs(5),
        }
    }
}

/// Coarse phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionPhase {
    /// At least one of pose or cloud has never arrived.
    AwaitingInputs,
    /// Both inputs have arrived at least once.
    Ready,
}

#[derive(Debug, Clone)]
enum FusionState {
    AwaitingInputs {
        pose: Option<StampedPose>,
        cloud: Option<Arc<PointCloudFrame>>,
    },
    Ready {
        pose: StampedPose,
        cloud: Arc<PointCloudFrame>,
        cloud_consumed: bool,
    },
}

impl Default for FusionState {
    fn default() -> Self {
        FusionState::AwaitingInputs {
            pose: None,
            cloud: None,
        }
    }
}

/// Result of one completed fusion cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Window center used for the cycle.
    pub center: WorldPoint,
    /// Cells set to free by the window pass.
    pub cells_cleared: usize,
    /// Point counters from the classifier pass.
    pub points: ClassifyStats,
    /// Grid after the cycle, stamped with the pose time.
    pub snapshot: Arc<GridSnapshot>,
}

/// What a tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Skipped because an input has never arrived.
    Waiting {
        /// No pose received yet.
        pose_missing: bool,
        /// No cloud received yet.
        cloud_missing: bool,
    },
    /// Skipped because the latest cloud was already fused.
    Stale,
    /// A full cycle ran.
    Fused(CycleReport),
}

impl TickOutcome {
    /// The snapshot to publish, if the tick produced one.
    pub fn snapshot(&self) -> Option<&Arc<GridSnapshot>> {
        match self {
            TickOutcome::Fused(report) => Some(&report.snapshot),
            _ => None,
        }
    }
}

/// Cumulative counters since the engine was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionStats {
    /// Pose observations received.
    pub poses_received: u64,
    /// Cloud frames received.
    pub clouds_received: u64,
    /// Ticks processed, whatever their outcome.
    pub ticks: u64,
    /// Ticks that ran a full cycle.
    pub cycles_fused: u64,
    /// Ticks skipped for a missing input.
    pub skipped_waiting: u64,
    /// Ticks skipped for an already consumed cloud.
    pub skipped_stale: u64,
    /// Cells set to free over all cycles.
    pub cells_cleared: u64,
    /// Point counters over all cycles.
    pub points: ClassifyStats,
}

/// Owns the grid and drives fusion cycles.
#[derive(Debug)]
pub struct FusionEngine {
    grid: OccupancyGrid,
    classifier: PointClassifier,
    update_radius: f64,
    state: FusionState,
    stats: FusionStats,
    pose_warning: Throttle,
    cloud_warning: Throttle,
    cloud_info: Throttle,
    cycle_info: Throttle,
}

impl FusionEngine {
    /// Creates an engine around a freshly initialized grid.
    ///
    /// # Errors
    ///
    /// Returns `Err(FusionError::InvalidParameter)` if the update radius is
    /// negative or not finite, and `Err(FusionError::Grid)` if the ground
    /// threshold is not finite.
    pub fn new(grid: OccupancyGrid, params: FusionParams) -> Result<Self, FusionError> {
        if !(params.update_radius >= 0.0) || !params.update_radius.is_finite() {
            return Err(FusionError::InvalidParameter(
                "Update radius must be non-negative and finite",
            ));
        }
        let classifier = PointClassifier::new(params.ground_height_threshold)?;
        Ok(FusionEngine {
            grid,
            classifier,
            update_radius: params.update_radius,
            state: FusionState::default(),
            stats: FusionStats::default(),
            pose_warning: Throttle::new(params.diagnostic_period),
            cloud_warning: Throttle::new(params.diagnostic_period),
            cloud_info: Throttle::new(params.diagnostic_period),
            cycle_info: Throttle::new(params.diagnostic_period),
        })
    }

    /// The grid as it stands.
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Radius of the update window.
    pub fn update_radius(&self) -> f64 {
        self.update_radius
    }

    /// Counters since creation.
    pub fn stats(&self) -> FusionStats {
        self.stats
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> FusionPhase {
        match self.state {
            FusionState::AwaitingInputs { .. } => FusionPhase::AwaitingInputs,
            FusionState::Ready { .. } => FusionPhase::Ready,
        }
    }

    /// `true` once the latest cloud has been fused and no newer one arrived.
    pub fn cloud_consumed(&self) -> bool {
        matches!(
            self.state,
            FusionState::Ready {
                cloud_consumed: true,
                ..
            }
        )
    }

    /// The latest pose, if any.
    pub fn latest_pose(&self) -> Option<&StampedPose> {
        match &self.state {
            FusionState::AwaitingInputs { pose, .. } => pose.as_ref(),
            FusionState::Ready { pose, .. } => Some(pose),
        }
    }

    /// Snapshot published once at startup, before any cycle, so subscribers
    /// learn the grid shape immediately.
    pub fn initial_snapshot(&self) -> Arc<GridSnapshot> {
        let stamp = self.latest_pose().map(|p| p.stamp).unwrap_or_default();
        Arc::new(self.grid.snapshot(stamp))
    }

    /// Replaces the latest pose. Does not touch the cloud-consumed flag.
    pub fn on_pose(&mut self, pose: StampedPose) {
        self.stats.poses_received += 1;
        trace!(x = pose.position[0], y = pose.position[1], "Pose received");
        self.state = match mem::take(&mut self.state) {
            FusionState::AwaitingInputs { cloud: Some(cloud), .. } => FusionState::Ready {
                pose,
                cloud,
                cloud_consumed: false,
            },
            FusionState::AwaitingInputs { cloud: None, .. } => FusionState::AwaitingInputs {
                pose: Some(pose),
                cloud: None,
            },
            FusionState::Ready {
                cloud,
                cloud_consumed,
                ..
            } => FusionState::Ready {
                pose,
                cloud,
                cloud_consumed,
            },
        };
    }

    /// Replaces the latest cloud and marks it unconsumed.
    pub fn on_cloud(&mut self, cloud: Arc<PointCloudFrame>, now: Instant) {
        self.stats.clouds_received += 1;
        if self.cloud_info.ready(now) {
            info!(points = cloud.len(), "Received point cloud");
        }
        self.state = match mem::take(&mut self.state) {
            FusionState::AwaitingInputs {
                pose: Some(pose), ..
            }
            | FusionState::Ready { pose, .. } => FusionState::Ready {
                pose,
                cloud,
                cloud_consumed: false,
            },
            FusionState::AwaitingInputs { pose: None, .. } => FusionState::AwaitingInputs {
                pose: None,
                cloud: Some(cloud),
            },
        };
    }

    /// Runs one tick of the state machine.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        self.stats.ticks += 1;
        let (pose, cloud) = match &mut self.state {
            FusionState::AwaitingInputs { pose, cloud } => {
                let pose_missing = pose.is_none();
                let cloud_missing = cloud.is_none();
                if pose_missing && self.pose_warning.ready(now) {
                    warn!("Waiting for pose data...");
                }
                if cloud_missing && self.cloud_warning.ready(now) {
                    warn!("Waiting for point cloud data...");
                }
                self.stats.skipped_waiting += 1;
                return TickOutcome::Waiting {
                    pose_missing,
                    cloud_missing,
                };
            }
            FusionState::Ready {
                cloud_consumed: true,
                ..
            } => {
                trace!("No fresh point cloud since the last cycle");
                self.stats.skipped_stale += 1;
                return TickOutcome::Stale;
            }
            FusionState::Ready {
                pose,
                cloud,
                cloud_consumed,
            } => {
                *cloud_consumed = true;
                (*pose, Arc::clone(cloud))
            }
        };

        let report = self.fuse(&pose, &cloud);
        if self.cycle_info.ready(now) {
            info!(
                obstacles = report.points.marked,
                cx = report.center.x,
                cy = report.center.y,
                "Updated map"
            );
        }
        TickOutcome::Fused(report)
    }

    fn fuse(&mut self, pose: &StampedPose, cloud: &PointCloudFrame) -> CycleReport {
        let center = pose.planar();
        let cells_cleared = clear_circle(&mut self.grid, center, self.update_radius);
        let points = self
            .classifier
            .mark_obstacles(&mut self.grid, cloud, center, self.update_radius);
        debug!(
            cells_cleared,
            marked = points.marked,
            ground = points.ground,
            outside_window = points.outside_window,
            out_of_bounds = points.out_of_bounds,
            non_finite = points.non_finite,
            "Fusion cycle complete"
        );

        self.stats.cycles_fused += 1;
        self.stats.cells_cleared += cells_cleared as u64;
        self.stats.points += points;

        CycleReport {
            center,
            cells_cleared,
            points,
            snapshot: Arc::new(self.grid.snapshot(pose.stamp)),
        }
    }
}
