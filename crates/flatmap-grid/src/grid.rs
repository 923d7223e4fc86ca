//! Persistent occupancy grid with fixed extents.
//!
//! The grid is allocated once from the configured maximum extents, centered on
//! the world origin, and never resized. Cells start out [`CellState::Unknown`]
//! and are mutated in place by the window and classifier passes.

#![warn(missing_docs)]

use std::fmt;

use crate::cell::CellState;
use crate::error::GridError;
use crate::point_types::{GridPoint, WorldPoint};
use crate::snapshot::{GridSnapshot, MAP_FRAME_ID, Stamp};

/// A fixed-size 2D occupancy grid stored row-major.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccupancyGrid {
    /// Width of the grid in cells
    width: usize,
    /// Height of the grid in cells
    height: usize,
    /// Resolution of the grid in meters per cell
    resolution: f64,
    /// World coordinates (meters) of the corner of cell (0, 0)
    origin: WorldPoint,
    /// Cell states, `width * height` long
    data: Vec<CellState>,
}

impl OccupancyGrid {
    /// Creates a new grid with every cell unknown.
    ///
    /// # Arguments
    /// * `width` - Width of the grid in cells
    /// * `height` - Height of the grid in cells
    /// * `resolution` - Resolution of the grid in meters per cell
    /// * `origin` - The world coordinates of the corner of cell (0, 0)
    ///
    /// # Returns
    /// * `Result<Self, GridError>` - The created grid or an error if parameters are invalid
    pub fn new(
        width: usize,
        height: usize,
        resolution: f64,
        origin: WorldPoint,
    ) -> Result<Self, GridError> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(GridError::InvalidResolution(
                "Resolution must be positive and finite",
            ));
        }
        if width == 0 || height == 0 {
            return Err(GridError::InvalidDimensions(
                "Width and height must be non-zero",
            ));
        }
        if !origin.is_finite() {
            return Err(GridError::InvalidDimensions("Origin must be finite"));
        }
        // Indices are handled as i64, so the counts must fit in one too.
        if i64::try_from(width).is_err() || i64::try_from(height).is_err() {
            return Err(GridError::InvalidDimensions(
                "Map dimensions too large for signed cell indices",
            ));
        }
        let total_cells = width
            .checked_mul(height)
            .ok_or(GridError::InvalidDimensions(
                "Map dimensions too large, would cause overflow",
            ))?;

        Ok(OccupancyGrid {
            width,
            height,
            resolution,
            origin,
            data: vec![CellState::Unknown; total_cells],
        })
    }

    /// Creates a grid covering at least `max_width_m` by `max_height_m`,
    /// centered on the world origin.
    ///
    /// The cell counts are `floor(extent / resolution) + 1` and the origin is
    /// `(-0.5 * width * resolution, -0.5 * height * resolution)`.
    ///
    /// # Arguments
    /// * `max_width_m` - Extent along x in meters
    /// * `max_height_m` - Extent along y in meters
    /// * `resolution` - Resolution of the grid in meters per cell
    pub fn from_extents(
        max_width_m: f64,
        max_height_m: f64,
        resolution: f64,
    ) -> Result<Self, GridError> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(GridError::InvalidResolution(
                "Resolution must be positive and finite",
            ));
        }
        if !(max_width_m > 0.0) || !max_width_m.is_finite() {
            return Err(GridError::InvalidExtents(
                "Maximum width must be positive and finite",
            ));
        }
        if !(max_height_m > 0.0) || !max_height_m.is_finite() {
            return Err(GridError::InvalidExtents(
                "Maximum height must be positive and finite",
            ));
        }

        let width = cells_for_extent(max_width_m, resolution)?;
        let height = cells_for_extent(max_height_m, resolution)?;
        let origin = WorldPoint::new(
            -0.5 * width as f64 * resolution,
            -0.5 * height as f64 * resolution,
        );
        Self::new(width, height, resolution, origin)
    }

    /// Width of the grid in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the grid in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Resolution in meters per cell.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// World coordinates of the corner of cell (0, 0).
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// The world-space rectangle covered by the grid as (min, max) corners.
    pub fn world_bounds(&self) -> (WorldPoint, WorldPoint) {
        let max = WorldPoint::new(
            self.origin.x + self.width as f64 * self.resolution,
            self.origin.y + self.height as f64 * self.resolution,
        );
        (self.origin, max)
    }

    /// Converts world coordinates to the cell containing them.
    ///
    /// Uses `floor`, so a point exactly on a cell border belongs to the cell
    /// above/right of it. The result may lie outside the grid. Non-finite
    /// input produces a meaningless index and must be filtered by the caller.
    pub fn world_to_cell(&self, p: WorldPoint) -> GridPoint {
        let x = ((p.x - self.origin.x) / self.resolution).floor();
        let y = ((p.y - self.origin.y) / self.resolution).floor();
        GridPoint::new(x as i64, y as i64)
    }

    /// World coordinates of the center of cell `p`.
    ///
    /// Defined for any index, including ones outside the grid.
    pub fn cell_to_world_center(&self, p: GridPoint) -> WorldPoint {
        WorldPoint::new(
            self.origin.x + (p.x as f64 + 0.5) * self.resolution,
            self.origin.y + (p.y as f64 + 0.5) * self.resolution,
        )
    }

    /// Returns `true` if `p` addresses a cell of this grid.
    pub fn in_bounds(&self, p: GridPoint) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width && (p.y as usize) < self.height
    }

    fn index(&self, p: GridPoint) -> Option<usize> {
        if self.in_bounds(p) {
            Some(p.y as usize * self.width + p.x as usize)
        } else {
            None
        }
    }

    /// Gets the state of cell `p`.
    ///
    /// # Returns
    /// * `Result<CellState, GridError>` - The state or an error if `p` is out of bounds
    pub fn get(&self, p: GridPoint) -> Result<CellState, GridError> {
        self.index(p)
            .map(|i| self.data[i])
            .ok_or(GridError::OutOfBounds { x: p.x, y: p.y })
    }

    /// Sets the state of cell `p`.
    ///
    /// # Returns
    /// * `Result<(), GridError>` - Success or an error if `p` is out of bounds
    pub fn set(&mut self, p: GridPoint, state: CellState) -> Result<(), GridError> {
        let cell = self
            .cell_mut(p)
            .ok_or(GridError::OutOfBounds { x: p.x, y: p.y })?;
        *cell = state;
        Ok(())
    }

    pub(crate) fn cell_mut(&mut self, p: GridPoint) -> Option<&mut CellState> {
        let index = self.index(p)?;
        Some(&mut self.data[index])
    }

    /// Gets a reference to the underlying row-major cell data.
    pub fn cells(&self) -> &[CellState] {
        &self.data
    }

    /// Number of cells currently holding `state`.
    pub fn count(&self, state: CellState) -> usize {
        self.data.iter().filter(|c| **c == state).count()
    }

    /// Takes a full copy of the grid for publication.
    pub fn snapshot(&self, stamp: Stamp) -> GridSnapshot {
        GridSnapshot {
            stamp,
            frame_id: MAP_FRAME_ID.to_string(),
            resolution: self.resolution,
            width: self.width,
            height: self.height,
            origin: self.origin,
            data: self.data.iter().map(|c| c.as_i8()).collect(),
        }
    }
}

fn cells_for_extent(extent: f64, resolution: f64) -> Result<usize, GridError> {
    let cells = (extent / resolution).floor();
    if cells >= i64::MAX as f64 {
        return Err(GridError::InvalidDimensions(
            "Map extents too large for the configured resolution",
        ));
    }
    (cells as usize)
        .checked_add(1)
        .ok_or(GridError::InvalidDimensions(
            "Map extents too large for the configured resolution",
        ))
}

impl fmt::Display for OccupancyGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "OccupancyGrid ({}x{}, resolution: {:.3}m)",
            self.width, self.height, self.resolution
        )?;
        writeln!(f, "Origin: ({:.3}, {:.3})", self.origin.x, self.origin.y)?;

        // Top row first so the printout reads like a map
        for row in self.data.chunks(self.width).rev() {
            for cell in row {
                write!(f, "{:4}", cell.as_i8())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
