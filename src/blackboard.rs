use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use flatmap_grid::{CellState, GridSnapshot, Stamp};

/// Map status shared between the snapshot sink and the watchdog.
#[derive(Clone)]
pub struct State {
    pub snapshots: u64,
    pub last_stamp: Stamp,
    pub last_snapshot_ts: Instant,
    pub occupied: usize,
    pub free: usize,
    pub unknown: usize,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            snapshots: 0,
            last_stamp: Stamp::default(),
            last_snapshot_ts: Instant::now(),
            occupied: 0,
            free: 0,
            unknown: 0,
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn record_map(bb: &Blackboard, map: &GridSnapshot) {
    // Count outside the lock, a full grid is millions of cells
    let occupied = map.count(CellState::Occupied);
    let free = map.count(CellState::Free);
    let unknown = map.data.len() - occupied - free;

    let mut g = bb.write();
    g.snapshots += 1;
    g.last_stamp = map.stamp;
    g.last_snapshot_ts = Instant::now();
    g.occupied = occupied;
    g.free = free;
    g.unknown = unknown;
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn clear_fault(bb: &Blackboard, msg: &str) {
    bb.write().faults.retain(|s| s != msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatmap_grid::{GridPoint, OccupancyGrid};

    #[test]
    fn test_record_map_counts_cells() {
        let bb: Blackboard = Arc::default();
        let mut grid = OccupancyGrid::from_extents(3.0, 3.0, 1.0).unwrap();
        grid.set(GridPoint::new(0, 0), CellState::Free).unwrap();
        grid.set(GridPoint::new(1, 0), CellState::Free).unwrap();
        grid.set(GridPoint::new(2, 0), CellState::Occupied).unwrap();

        record_map(&bb, &grid.snapshot(Stamp::new(4, 0)));
        let state = snapshot(&bb);
        assert_eq!(state.snapshots, 1);
        assert_eq!(state.last_stamp, Stamp::new(4, 0));
        assert_eq!(state.free, 2);
        assert_eq!(state.occupied, 1);
        assert_eq!(state.unknown, 13);
    }

    #[test]
    fn test_faults_deduplicated() {
        let bb: Blackboard = Arc::default();
        raise_fault(&bb, "map stale");
        raise_fault(&bb, "map stale");
        assert_eq!(snapshot(&bb).faults.len(), 1);
        clear_fault(&bb, "map stale");
        assert!(snapshot(&bb).faults.is_empty());
    }
}
