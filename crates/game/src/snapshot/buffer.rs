use std::collections::VecDeque;

use super::ServerSnapshot;

pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 3;

/// Fixed-capacity ring of recent snapshots in arrival order.
#[derive(Debug)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<ServerSnapshot>,
    capacity: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a snapshot, returning the evicted oldest entry when full.
    pub fn push(&mut self, snapshot: ServerSnapshot) -> Option<ServerSnapshot> {
        let evicted = if self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front()
        } else {
            None
        };
        self.snapshots.push_back(snapshot);
        evicted
    }

    pub fn latest(&self) -> Option<&ServerSnapshot> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&ServerSnapshot> {
        self.snapshots.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerSnapshot> {
        self.snapshots.iter()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::state::GameState;

    fn snapshot_with_match(current_match: u32, at: Instant) -> ServerSnapshot {
        let mut state = GameState::default();
        state.current_match = current_match;
        ServerSnapshot::new(state, at)
    }

    #[test]
    fn test_evicts_oldest_first() {
        let start = Instant::now();
        let mut buffer = SnapshotBuffer::new(3);

        for i in 0..3 {
            let evicted = buffer.push(snapshot_with_match(i, start + Duration::from_millis(i as u64)));
            assert!(evicted.is_none());
        }

        let evicted = buffer.push(snapshot_with_match(3, start + Duration::from_millis(3)));
        assert_eq!(evicted.map(|s| s.state.current_match), Some(0));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.oldest().unwrap().state.current_match, 1);
        assert_eq!(buffer.latest().unwrap().state.current_match, 3);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let start = Instant::now();
        let mut buffer = SnapshotBuffer::default();

        for i in 0..50 {
            buffer.push(snapshot_with_match(i, start));
            assert!(buffer.len() <= DEFAULT_SNAPSHOT_CAPACITY);
        }

        let order: Vec<u32> = buffer.iter().map(|s| s.state.current_match).collect();
        assert_eq!(order, vec![47, 48, 49]);
    }

    #[test]
    fn test_zero_capacity_is_promoted_to_one() {
        let mut buffer = SnapshotBuffer::new(0);
        buffer.push(snapshot_with_match(1, Instant::now()));

        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.len(), 1);
    }
}
