/// Directional keys held during a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
}

impl InputState {
    /// -1 moves toward the top of the field, 1 toward the bottom.
    pub fn direction(&self) -> f32 {
        match (self.up, self.down) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.direction() == 0.0
    }
}
