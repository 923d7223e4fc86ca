//! Projection of raw 3D points into obstacle marks.

use std::ops::AddAssign;

use crate::cell::CellState;
use crate::cloud::PointCloudFrame;
use crate::error::GridError;
use crate::grid::OccupancyGrid;
use crate::point_types::{Point3, WorldPoint};

/// Outcome of classifying a single point, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClass {
    /// At least one coordinate is NaN or infinite.
    NonFinite,
    /// Planar distance to the window center exceeds the radius.
    OutsideWindow,
    /// Height at or below the ground threshold.
    Ground,
    /// Candidate obstacle; still subject to the grid bounds check.
    Obstacle,
}

/// Per-pass counters. Diagnostics only; nothing in the update depends on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassifyStats {
    /// Points examined.
    pub points: usize,
    /// Points skipped for a NaN or infinite coordinate.
    pub non_finite: usize,
    /// Points outside the update window.
    pub outside_window: usize,
    /// Points at or below the ground threshold.
    pub ground: usize,
    /// Obstacle points that fell outside the grid extents.
    pub out_of_bounds: usize,
    /// Obstacle points written to the grid.
    pub marked: usize,
}

impl ClassifyStats {
    /// Points that did not produce a mark, for any reason.
    pub fn rejected(&self) -> usize {
        self.points - self.marked
    }
}

impl AddAssign for ClassifyStats {
    fn add_assign(&mut self, rhs: Self) {
        self.points += rhs.points;
        self.non_finite += rhs.non_finite;
        self.outside_window += rhs.outside_window;
        self.ground += rhs.ground;
        self.out_of_bounds += rhs.out_of_bounds;
        self.marked += rhs.marked;
    }
}

/// Marks obstacle cells from points above a ground height threshold.
///
/// The radius passed to [`PointClassifier::mark_obstacles`] must be the one
/// the window was just cleared with, so that only points inside the cleared
/// region can re-mark it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointClassifier {
    ground_height_threshold: f64,
}

impl PointClassifier {
    /// Construct a classifier.
    ///
    /// # Errors
    ///
    /// Returns `Err(GridError::InvalidParameter)` if the threshold is not finite.
    pub fn new(ground_height_threshold: f64) -> Result<Self, GridError> {
        if !ground_height_threshold.is_finite() {
            return Err(GridError::InvalidParameter(
                "Ground height threshold must be finite",
            ));
        }
        Ok(PointClassifier {
            ground_height_threshold,
        })
    }

    /// The height at or below which points count as ground.
    pub fn ground_height_threshold(&self) -> f64 {
        self.ground_height_threshold
    }

    /// Classify one point against a window of `radius` around `center`.
    pub fn classify(&self, point: &Point3, center: WorldPoint, radius: f64) -> PointClass {
        if !point.is_finite() {
            return PointClass::NonFinite;
        }
        // A NaN center or radius must reject, never accept
        if !(point.planar().distance_squared(&center) <= radius * radius) {
            return PointClass::OutsideWindow;
        }
        if f64::from(point.z) <= self.ground_height_threshold {
            return PointClass::Ground;
        }
        PointClass::Obstacle
    }

    /// Marks every obstacle point of `cloud` inside the window as
    /// [`CellState::Occupied`].
    ///
    /// Rejected points are skipped silently and only show up in the returned
    /// counters. Marking the same cell twice is harmless.
    pub fn mark_obstacles(
        &self,
        grid: &mut OccupancyGrid,
        cloud: &PointCloudFrame,
        center: WorldPoint,
        radius: f64,
    ) -> ClassifyStats {
        self.mark_points(grid, &cloud.points, center, radius)
    }

    /// Same as [`PointClassifier::mark_obstacles`] for a bare slice of points.
    pub fn mark_points(
        &self,
        grid: &mut OccupancyGrid,
        points: &[Point3],
        center: WorldPoint,
        radius: f64,
    ) -> ClassifyStats {
        let mut stats = ClassifyStats {
            points: points.len(),
            ..ClassifyStats::default()
        };
        for point in points {
            match self.classify(point, center, radius) {
                PointClass::NonFinite => stats.non_finite += 1,
                PointClass::OutsideWindow => stats.outside_window += 1,
                PointClass::Ground => stats.ground += 1,
                PointClass::Obstacle => {
                    let cell = grid.world_to_cell(point.planar());
                    match grid.cell_mut(cell) {
                        Some(state) => {
                            *state = CellState::Occupied;
                            stats.marked += 1;
                        }
                        None => stats.out_of_bounds += 1,
                    }
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_types::GridPoint;
    use crate::window::clear_circle;

    const THRESHOLD: f64 = 0.55;

    fn scenario_grid() -> OccupancyGrid {
        OccupancyGrid::from_extents(3.0, 3.0, 1.0).unwrap()
    }

    #[test]
    fn test_classify_order() {
        let classifier = PointClassifier::new(THRESHOLD).unwrap();
        let c = WorldPoint::new(0.0, 0.0);
        assert_eq!(
            classifier.classify(&Point3::new(f32::NAN, 0.0, 1.0), c, 1.0),
            PointClass::NonFinite
        );
        assert_eq!(
            classifier.classify(&Point3::new(0.0, 0.0, f32::INFINITY), c, 1.0),
            PointClass::NonFinite
        );
        // Outside the window wins over the ground test
        assert_eq!(
            classifier.classify(&Point3::new(2.0, 0.0, 0.0), c, 1.0),
            PointClass::OutsideWindow
        );
        assert_eq!(
            classifier.classify(&Point3::new(0.0, 0.0, 0.5), c, 1.0),
            PointClass::Ground
        );
        assert_eq!(
            classifier.classify(&Point3::new(0.0, 1.0, 0.6), c, 1.0),
            PointClass::Obstacle
        );
    }

    #[test]
    fn test_non_finite_window_rejects_everything() {
        let mut grid = OccupancyGrid::from_extents(20.0, 20.0, 1.0).unwrap();
        let classifier = PointClassifier::new(THRESHOLD).unwrap();
        let point = Point3::new(8.0, 8.0, 2.0);
        assert_eq!(
            classifier.classify(&point, WorldPoint::new(f64::NAN, 0.0), 1.0),
            PointClass::OutsideWindow
        );
        assert_eq!(
            classifier.classify(&point, WorldPoint::new(8.0, 8.0), f64::NAN),
            PointClass::OutsideWindow
        );

        let stats =
            classifier.mark_points(&mut grid, &[point], WorldPoint::new(f64::NAN, 0.0), 1.0);
        assert_eq!(stats.outside_window, 1);
        assert_eq!(stats.marked, 0);
        assert_eq!(grid.count(CellState::Occupied), 0);
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(matches!(
            PointClassifier::new(f64::NAN),
            Err(GridError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_obstacle_overwrites_cleared_cell() {
        let mut grid = scenario_grid();
        let classifier = PointClassifier::new(THRESHOLD).unwrap();
        let center = WorldPoint::new(0.0, 0.0);
        clear_circle(&mut grid, center, 1.0);
        assert_eq!(grid.get(GridPoint::new(2, 2)).unwrap(), CellState::Free);

        let stats = classifier.mark_points(&mut grid, &[Point3::new(0.2, 0.2, 1.0)], center, 1.0);
        assert_eq!(stats.marked, 1);
        assert_eq!(grid.get(GridPoint::new(2, 2)).unwrap(), CellState::Occupied);
    }

    #[test]
    fn test_ground_point_leaves_cell_free() {
        let mut grid = scenario_grid();
        let classifier = PointClassifier::new(THRESHOLD).unwrap();
        let center = WorldPoint::new(0.0, 0.0);
        clear_circle(&mut grid, center, 1.0);

        let stats = classifier.mark_points(&mut grid, &[Point3::new(0.0, 0.0, 0.1)], center, 1.0);
        assert_eq!(stats.ground, 1);
        assert_eq!(stats.marked, 0);
        assert_eq!(grid.get(GridPoint::new(2, 2)).unwrap(), CellState::Free);
    }

    #[test]
    fn test_points_outside_window_never_mark() {
        let mut grid = scenario_grid();
        let before = grid.clone();
        let classifier = PointClassifier::new(THRESHOLD).unwrap();
        let points = [
            Point3::new(1.5, 1.5, 2.0),
            Point3::new(-1.9, 0.0, 2.0),
            Point3::new(0.0, -1.01, 2.0),
        ];
        let stats = classifier.mark_points(&mut grid, &points, WorldPoint::new(0.0, 0.0), 1.0);
        assert_eq!(stats.outside_window, 3);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_out_of_bounds_dropped() {
        let mut grid = scenario_grid();
        let classifier = PointClassifier::new(THRESHOLD).unwrap();
        // Window around the top-right corner reaches past the map
        let center = WorldPoint::new(1.9, 1.9);
        let points = [Point3::new(2.5, 1.9, 1.0), Point3::new(1.9, 1.9, 1.0)];
        let stats = classifier.mark_points(&mut grid, &points, center, 1.0);
        assert_eq!(stats.out_of_bounds, 1);
        assert_eq!(stats.marked, 1);
        assert_eq!(grid.count(CellState::Occupied), 1);
        assert_eq!(grid.get(GridPoint::new(3, 3)).unwrap(), CellState::Occupied);
    }

    #[test]
    fn test_duplicate_marks_idempotent() {
        let mut grid = scenario_grid();
        let classifier = PointClassifier::new(THRESHOLD).unwrap();
        let center = WorldPoint::new(0.0, 0.0);
        let points = [
            Point3::new(0.2, 0.2, 1.0),
            Point3::new(0.3, 0.1, 1.5),
            Point3::new(0.2, 0.2, 1.0),
        ];
        let stats = classifier.mark_points(&mut grid, &points, center, 1.0);
        assert_eq!(stats.marked, 3);
        assert_eq!(grid.count(CellState::Occupied), 1);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut total = ClassifyStats::default();
        let pass = ClassifyStats {
            points: 10,
            non_finite: 1,
            outside_window: 2,
            ground: 3,
            out_of_bounds: 1,
            marked: 3,
        };
        total += pass;
        total += pass;
        assert_eq!(total.points, 20);
        assert_eq!(total.marked, 6);
        assert_eq!(total.rejected(), 14);
    }
}
