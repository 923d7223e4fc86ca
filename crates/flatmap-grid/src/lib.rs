#![warn(missing_docs)]
#![doc = "Fixed-extent 2D occupancy grid (\"flattened map\") built from 3D points."]
#![doc = ""]
#![doc = "The grid is centered on the world origin and never resized. Each update"]
#![doc = "clears a circular window around the robot and re-marks obstacle cells from"]
#![doc = "points above a ground height threshold inside that same window."]

pub mod cell;
pub mod classifier;
pub mod cloud;
pub mod error;
pub mod grid;
pub mod point_types;
pub mod snapshot;
pub mod window;

pub use cell::CellState;
pub use classifier::{ClassifyStats, PointClass, PointClassifier};
pub use cloud::PointCloudFrame;
pub use error::GridError;
pub use grid::OccupancyGrid;
pub use point_types::{GridPoint, Point3, WorldPoint};
pub use snapshot::{GridSnapshot, MAP_FRAME_ID, Stamp};
pub use window::{CellWindow, clear_circle};
