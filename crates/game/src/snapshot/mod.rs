mod buffer;

use std::time::Instant;

use crate::state::GameState;

pub use buffer::{DEFAULT_SNAPSHOT_CAPACITY, SnapshotBuffer};

/// An authoritative game state together with its local arrival time.
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    pub state: GameState,
    pub received_at: Instant,
}

impl ServerSnapshot {
    pub fn new(state: GameState, received_at: Instant) -> Self {
        Self { state, received_at }
    }
}
