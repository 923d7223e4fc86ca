//! Immutable copies of the grid handed to publishers.

use crate::cell::CellState;
use crate::point_types::{GridPoint, WorldPoint};

/// Frame every snapshot is expressed in.
pub const MAP_FRAME_ID: &str = "map";

/// Message timestamp as seconds plus nanoseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stamp {
    /// Whole seconds.
    pub sec: i32,
    /// Nanoseconds past `sec`, always `< 1_000_000_000`.
    pub nanosec: u32,
}

impl Stamp {
    /// Construct a new stamp, carrying excess nanoseconds into seconds.
    /// Seconds saturate at `i32::MAX`.
    pub const fn new(sec: i32, nanosec: u32) -> Self {
        Stamp {
            sec: sec.saturating_add((nanosec / 1_000_000_000) as i32),
            nanosec: nanosec % 1_000_000_000,
        }
    }

    /// Build a stamp from fractional seconds. Non-finite input yields zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() {
            return Stamp::default();
        }
        let sec = secs.floor();
        let nanosec = ((secs - sec) * 1e9).round().min(999_999_999.0) as u32;
        Stamp {
            sec: sec as i32,
            nanosec,
        }
    }

    /// The stamp as fractional seconds.
    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.sec) + f64::from(self.nanosec) * 1e-9
    }
}

/// A full copy of the occupancy grid plus the metadata a subscriber needs to
/// place it in the world. Orientation of the origin is always identity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridSnapshot {
    /// Timestamp of the pose the grid was last updated around.
    pub stamp: Stamp,
    /// Always [`MAP_FRAME_ID`].
    pub frame_id: String,
    /// Meters per cell.
    pub resolution: f64,
    /// Width in cells.
    pub width: usize,
    /// Height in cells.
    pub height: usize,
    /// World position of the corner of cell (0, 0).
    pub origin: WorldPoint,
    /// Row-major cell values in {-1, 0, 100}, `width * height` long.
    pub data: Vec<i8>,
}

impl GridSnapshot {
    /// Value of cell `p`, or `None` outside the grid.
    pub fn get(&self, p: GridPoint) -> Option<CellState> {
        if p.x < 0 || p.y < 0 || p.x as usize >= self.width || p.y as usize >= self.height {
            return None;
        }
        let index = p.y as usize * self.width + p.x as usize;
        CellState::from_i8(self.data[index])
    }

    /// Number of cells holding `state`.
    pub fn count(&self, state: CellState) -> usize {
        let value = state.as_i8();
        self.data.iter().filter(|v| **v == value).count()
    }
}
