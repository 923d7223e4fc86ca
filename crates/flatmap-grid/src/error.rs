//! This module defines the error types used by the `flatmap-grid` crate.

use thiserror::Error;

/// Error type for grid construction and access.
///
/// Construction errors are configuration errors and are expected to be fatal
/// at startup. `OutOfBounds` is returned by the checked accessors; the update
/// paths check `in_bounds` first and never surface it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    /// The map resolution is not a positive, finite number.
    #[error("Invalid map resolution: {0}")]
    InvalidResolution(&'static str),
    /// The configured maximum extents are not positive, finite numbers.
    #[error("Invalid map extents: {0}")]
    InvalidExtents(&'static str),
    /// The cell counts are zero or would overflow the backing allocation.
    #[error("Invalid map dimensions: {0}")]
    InvalidDimensions(&'static str),
    /// A cell index outside `[0, width) x [0, height)` was accessed.
    #[error("Map access out of bounds at cell ({x}, {y})")]
    OutOfBounds {
        /// Column index that was requested.
        x: i64,
        /// Row index that was requested.
        y: i64,
    },
    /// A classifier or window parameter is not usable.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// A packed point-cloud buffer could not be decoded.
    #[error("Malformed point cloud: {0}")]
    MalformedCloud(&'static str),
}
