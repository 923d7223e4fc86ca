//! Tri-state cell values and their wire encoding.

use std::fmt;

/// Tri-state occupancy of a single grid cell.
///
/// The discriminants are the values carried in a published occupancy grid.
#[repr(i8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellState {
    /// No observation has touched this cell yet.
    #[default]
    Unknown = -1,
    /// Cell was inside an update window and no obstacle point landed in it.
    Free = 0,
    /// An obstacle point above the ground threshold landed in this cell.
    Occupied = 100,
}

impl CellState {
    /// Converts the state to its wire representation.
    pub const fn as_i8(self) -> i8 {
        self as i8
    }

    /// Creates a state from its wire representation.
    ///
    /// Returns `None` for any value other than -1, 0 or 100.
    pub const fn from_i8(value: i8) -> Option<Self> {
        match value {
            -1 => Some(CellState::Unknown),
            0 => Some(CellState::Free),
            100 => Some(CellState::Occupied),
            _ => None,
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellState::Unknown => write!(f, "Unknown"),
            CellState::Free => write!(f, "Free"),
            CellState::Occupied => write!(f, "Occupied"),
        }
    }
}
