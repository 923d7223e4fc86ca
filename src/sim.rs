use std::f64::consts::TAU;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flatmap_fusion::{StampedPose, Topic};
use flatmap_grid::{GridError, Point3, PointCloudFrame, Stamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spin_sleep::SpinSleeper;
use tracing::{info, warn};

use crate::config::SimConfig;

/// Forward speed of the simulated robot (m/s).
const DRIVE_SPEED: f64 = 0.5;
/// Distance from the orbit to the room walls (m).
const WALL_MARGIN: f64 = 4.0;
const PILLAR_RADIUS: f64 = 0.5;
const FLOOR_SPREAD: f64 = 10.0;

/// Spawns a thread that drives a robot around a circle inside a square room
/// with a pillar at the origin, publishing poses and clouds at the configured
/// rates. The thread exits once nobody listens for poses, so subscribe before
/// spawning it.
pub fn spawn(
    cfg: SimConfig,
    pose_topic: Topic<StampedPose>,
    cloud_topic: Topic<PointCloudFrame>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("sim".into())
        .spawn(move || {
            info!("Simulation thread started.");
            let mut rng = match cfg.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let sleeper = SpinSleeper::new(100_000);
            let dt = 1.0 / cfg.pose_rate_hz;
            let cloud_every = (cfg.pose_rate_hz / cfg.cloud_rate_hz).round().max(1.0) as u64;
            let omega = if cfg.orbit_radius_m > 0.0 {
                DRIVE_SPEED / cfg.orbit_radius_m
            } else {
                0.0
            };
            let start = Instant::now();

            for step in 0u64.. {
                let t = step as f64 * dt;
                let stamp = Stamp::from_secs_f64(start.elapsed().as_secs_f64());
                let (x, y) = (
                    cfg.orbit_radius_m * (omega * t).cos(),
                    cfg.orbit_radius_m * (omega * t).sin(),
                );
                if pose_topic.publish(StampedPose::new(stamp, x, y, 0.0)) == 0 {
                    info!("No pose subscribers left. Simulation thread exiting.");
                    break;
                }
                if step % cloud_every == 0 {
                    match generate_frame(&mut rng, &cfg, stamp, x, y) {
                        Ok(frame) => {
                            cloud_topic.publish(frame);
                        }
                        Err(e) => warn!("Dropping simulated cloud: {}", e),
                    }
                }
                sleeper.sleep(Duration::from_secs_f64(dt));
            }
        })
}

/// Bytes per packed record: x, y, z and intensity as little-endian `f32`.
pub const POINT_STEP: usize = 16;

/// One frame of floor, wall, pillar and dropout points seen from `(x, y)`,
/// packed the way a lidar driver delivers it and decoded back.
pub fn generate_frame<R: Rng>(
    rng: &mut R,
    cfg: &SimConfig,
    stamp: Stamp,
    x: f64,
    y: f64,
) -> Result<PointCloudFrame, GridError> {
    let bytes = generate_packed(rng, cfg, x, y);
    PointCloudFrame::from_le_bytes(stamp, &bytes, POINT_STEP)
}

fn generate_packed<R: Rng>(rng: &mut R, cfg: &SimConfig, x: f64, y: f64) -> Vec<u8> {
    let half = cfg.orbit_radius_m + WALL_MARGIN;
    let mut bytes = Vec::with_capacity(cfg.points_per_frame * POINT_STEP);
    for _ in 0..cfg.points_per_frame {
        let kind: f64 = rng.random();
        let point = if kind < 0.4 {
            // Floor around the robot, below any sane ground threshold
            Point3::new(
                (x + rng.random_range(-FLOOR_SPREAD..FLOOR_SPREAD)) as f32,
                (y + rng.random_range(-FLOOR_SPREAD..FLOOR_SPREAD)) as f32,
                rng.random_range(-0.05..0.3),
            )
        } else if kind < 0.9 {
            let along = rng.random_range(-half..half);
            let (wx, wy) = match rng.random_range(0..4) {
                0 => (-half, along),
                1 => (half, along),
                2 => (along, -half),
                _ => (along, half),
            };
            Point3::new(wx as f32, wy as f32, rng.random_range(0.6..2.5))
        } else if kind < 0.98 {
            let a = rng.random_range(0.0..TAU);
            Point3::new(
                (PILLAR_RADIUS * a.cos()) as f32,
                (PILLAR_RADIUS * a.sin()) as f32,
                rng.random_range(0.6..1.5),
            )
        } else {
            Point3::new(f32::NAN, f32::NAN, f32::NAN)
        };
        let intensity: f32 = rng.random_range(0.0..255.0);
        for value in [point.x, point.y, point.z, intensity] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatmap_grid::{CellState, OccupancyGrid, PointClassifier, WorldPoint, clear_circle};

    fn sim_config() -> SimConfig {
        SimConfig {
            enabled: true,
            pose_rate_hz: 20.0,
            cloud_rate_hz: 1.0,
            orbit_radius_m: 5.0,
            points_per_frame: 500,
            seed: Some(1),
        }
    }

    #[test]
    fn test_frame_size_and_seeded() {
        let cfg = sim_config();
        let a = generate_frame(&mut StdRng::seed_from_u64(3), &cfg, Stamp::default(), 5.0, 0.0)
            .unwrap();
        let b = generate_frame(&mut StdRng::seed_from_u64(3), &cfg, Stamp::default(), 5.0, 0.0)
            .unwrap();
        assert_eq!(a.len(), 500);
        // NaN != NaN, so compare the finite part only
        let finite = |f: &PointCloudFrame| {
            f.points.iter().filter(|p| p.is_finite()).copied().collect::<Vec<_>>()
        };
        assert_eq!(finite(&a), finite(&b));
    }

    #[test]
    fn test_packed_records_decode() {
        let cfg = sim_config();
        let bytes = generate_packed(&mut StdRng::seed_from_u64(5), &cfg, 5.0, 0.0);
        assert_eq!(bytes.len(), 500 * POINT_STEP);

        let frame = PointCloudFrame::from_le_bytes(Stamp::new(2, 0), &bytes, POINT_STEP).unwrap();
        assert_eq!(frame.len(), 500);
        assert_eq!(frame.stamp, Stamp::new(2, 0));
        let first = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        // Compare bit patterns so a dropout (NaN) record still matches
        assert_eq!(frame.points[0].x.to_bits(), first.to_bits());
    }

    #[test]
    fn test_frame_marks_walls_not_floor() {
        let cfg = sim_config();
        let frame = generate_frame(&mut StdRng::seed_from_u64(9), &cfg, Stamp::default(), 5.0, 0.0)
            .unwrap();
        let mut grid = OccupancyGrid::from_extents(30.0, 30.0, 0.25).unwrap();
        let center = WorldPoint::new(5.0, 0.0);
        clear_circle(&mut grid, center, 15.0);
        let stats = PointClassifier::new(0.55)
            .unwrap()
            .mark_obstacles(&mut grid, &frame, center, 15.0);

        assert!(stats.marked > 0);
        assert!(stats.ground > 0);
        assert_eq!(stats.marked + stats.rejected(), 500);
        // The robot's own cell is on open floor
        let here = grid.world_to_cell(center);
        assert_eq!(grid.get(here).unwrap(), CellState::Free);
    }
}
