//! Bounded circular clearing around the robot.
//!
//! Only the cells inside the bounding box of the circle are visited, so the
//! cost of one update is O((r / resolution)^2) no matter how large the grid
//! is. Everything outside the circle keeps the value it already had, which
//! is how the map accumulates as the robot moves.

use crate::cell::CellState;
use crate::grid::OccupancyGrid;
use crate::point_types::{GridPoint, WorldPoint};

/// Inclusive, clamped range of cells that may intersect a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWindow {
    /// Lowest column and row in the window.
    pub min: GridPoint,
    /// Highest column and row in the window.
    pub max: GridPoint,
}

impl CellWindow {
    /// Computes the cells of `grid` that could intersect the circle of
    /// `radius` around `center`.
    ///
    /// Columns span `floor((cx - r - ox) / res) ..= ceil((cx + r - ox) / res)`
    /// clamped to `[0, width - 1]`; rows likewise. Returns `None` when the
    /// center is not finite, the radius is negative or NaN, or the box lies
    /// entirely off the grid.
    pub fn around(grid: &OccupancyGrid, center: WorldPoint, radius: f64) -> Option<Self> {
        if !center.is_finite() || !(radius >= 0.0) || !radius.is_finite() {
            return None;
        }
        let origin = grid.origin();
        let res = grid.resolution();
        let max_col = grid.width() as i64 - 1;
        let max_row = grid.height() as i64 - 1;

        let lo_x = ((center.x - radius - origin.x) / res).floor() as i64;
        let hi_x = ((center.x + radius - origin.x) / res).ceil() as i64;
        let lo_y = ((center.y - radius - origin.y) / res).floor() as i64;
        let hi_y = ((center.y + radius - origin.y) / res).ceil() as i64;

        let min = GridPoint::new(lo_x.max(0), lo_y.max(0));
        let max = GridPoint::new(hi_x.min(max_col), hi_y.min(max_row));
        if min.x > max.x || min.y > max.y {
            return None;
        }
        Some(CellWindow { min, max })
    }

    /// Number of cells in the window.
    pub fn cell_count(&self) -> usize {
        ((self.max.x - self.min.x + 1) * (self.max.y - self.min.y + 1)) as usize
    }

    /// Iterates the window row by row.
    pub fn cells(&self) -> impl Iterator<Item = GridPoint> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| GridPoint::new(x, y)))
    }
}

/// Sets every cell whose center lies within `radius` of `center` to
/// [`CellState::Free`].
///
/// Windows that run past the grid edges are clamped; a window entirely off
/// the grid is a no-op.
///
/// # Returns
/// * `usize` - Number of cells that were cleared
pub fn clear_circle(grid: &mut OccupancyGrid, center: WorldPoint, radius: f64) -> usize {
    let Some(window) = CellWindow::around(grid, center, radius) else {
        return 0;
    };
    let r2 = radius * radius;
    let mut cleared = 0;
    for p in window.cells() {
        if grid.cell_to_world_center(p).distance_squared(&center) > r2 {
            continue;
        }
        if let Some(cell) = grid.cell_mut(p) {
            *cell = CellState::Free;
            cleared += 1;
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_grid() -> OccupancyGrid {
        OccupancyGrid::from_extents(3.0, 3.0, 1.0).unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let grid = scenario_grid();
        let window = CellWindow::around(&grid, WorldPoint::new(0.0, 0.0), 1.0).unwrap();
        assert_eq!(window.min, GridPoint::new(1, 1));
        assert_eq!(window.max, GridPoint::new(3, 3));
        assert_eq!(window.cell_count(), 9);
        assert_eq!(window.cells().count(), 9);
    }

    #[test]
    fn test_window_clamps_to_grid() {
        let grid = scenario_grid();
        let window = CellWindow::around(&grid, WorldPoint::new(-1.9, 1.9), 5.0).unwrap();
        assert_eq!(window.min, GridPoint::new(0, 0));
        assert_eq!(window.max, GridPoint::new(3, 3));
    }

    #[test]
    fn test_window_off_grid() {
        let grid = scenario_grid();
        assert_eq!(CellWindow::around(&grid, WorldPoint::new(50.0, 0.0), 1.0), None);
        assert_eq!(CellWindow::around(&grid, WorldPoint::new(0.0, 0.0), -1.0), None);
        assert_eq!(CellWindow::around(&grid, WorldPoint::new(f64::NAN, 0.0), 1.0), None);
    }

    #[test]
    fn test_clear_scenario() {
        let mut grid = scenario_grid();
        let cleared = clear_circle(&mut grid, WorldPoint::new(0.0, 0.0), 1.0);
        assert_eq!(cleared, 4);

        for p in [
            GridPoint::new(1, 1),
            GridPoint::new(2, 1),
            GridPoint::new(1, 2),
            GridPoint::new(2, 2),
        ] {
            assert_eq!(grid.get(p).unwrap(), CellState::Free);
        }
        // Center (-1.5, -1.5) is ~2.12m away
        assert_eq!(grid.get(GridPoint::new(0, 0)).unwrap(), CellState::Unknown);
        // Center (1.5, 0.5) is ~1.58m away even though it is inside the box
        assert_eq!(grid.get(GridPoint::new(3, 2)).unwrap(), CellState::Unknown);
        assert_eq!(grid.count(CellState::Unknown), 12);
    }

    #[test]
    fn test_clear_overwrites_occupied() {
        let mut grid = scenario_grid();
        grid.set(GridPoint::new(2, 2), CellState::Occupied).unwrap();
        grid.set(GridPoint::new(0, 3), CellState::Occupied).unwrap();
        clear_circle(&mut grid, WorldPoint::new(0.0, 0.0), 1.0);
        assert_eq!(grid.get(GridPoint::new(2, 2)).unwrap(), CellState::Free);
        // Outside the circle, so untouched
        assert_eq!(grid.get(GridPoint::new(0, 3)).unwrap(), CellState::Occupied);
    }

    #[test]
    fn test_clear_at_grid_corner() {
        let mut grid = OccupancyGrid::from_extents(10.0, 10.0, 0.5).unwrap();
        let (_, max) = grid.world_bounds();
        let cleared = clear_circle(&mut grid, max, 2.0);
        assert!(cleared > 0);
        let corner = GridPoint::new(grid.width() as i64 - 1, grid.height() as i64 - 1);
        assert_eq!(grid.get(corner).unwrap(), CellState::Free);
        assert_eq!(grid.get(GridPoint::new(0, 0)).unwrap(), CellState::Unknown);
    }

    #[test]
    fn test_clear_center_outside_grid() {
        let mut grid = scenario_grid();
        // Circle reaches into the grid from the left
        let cleared = clear_circle(&mut grid, WorldPoint::new(-2.5, 0.0), 1.5);
        assert!(cleared > 0);
        assert_eq!(grid.get(GridPoint::new(0, 1)).unwrap(), CellState::Free);
        assert_eq!(clear_circle(&mut grid, WorldPoint::new(-100.0, 0.0), 1.0), 0);
    }

    #[test]
    fn test_zero_radius() {
        let mut grid = scenario_grid();
        // A zero radius only catches a cell whose center is exactly the point
        assert_eq!(clear_circle(&mut grid, WorldPoint::new(0.5, 0.5), 0.0), 1);
        assert_eq!(grid.get(GridPoint::new(2, 2)).unwrap(), CellState::Free);
        assert_eq!(clear_circle(&mut grid, WorldPoint::new(0.0, 0.0), 0.0), 0);
    }
}
