#![warn(missing_docs)]
#![doc = "Incremental fusion of poses and point clouds into a flattened occupancy map."]
#![doc = ""]
#![doc = "[`FusionEngine`] is the synchronous state machine; [`run_fusion_task`]"]
#![doc = "drives it from broadcast [`Topic`]s at a fixed tick rate."]

pub mod bus;
pub mod engine;
pub mod error;
pub mod task;
pub mod throttle;

pub use bus::Topic;
pub use engine::{
    CycleReport, FusionEngine, FusionParams, FusionPhase, FusionStats, StampedPose, TickOutcome,
};
pub use error::FusionError;
pub use task::run_fusion_task;
pub use throttle::Throttle;
