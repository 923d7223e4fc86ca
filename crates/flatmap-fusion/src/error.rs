//! This module defines the error types used by the `flatmap-fusion` crate.

use flatmap_grid::GridError;
use thiserror::Error;

/// Error type for building and running the fusion engine.
///
/// Only construction can fail. A fusion cycle itself never returns an error;
/// every rejection inside a cycle is a counted skip.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FusionError {
    /// A fusion parameter is out of range.
    #[error("Invalid fusion parameter: {0}")]
    InvalidParameter(&'static str),
    /// The grid or classifier rejected its configuration.
    #[error(transparent)]
    Grid(#[from] GridError),
}
