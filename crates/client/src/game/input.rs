use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::net::InputState;

/// How long a press counts as held when the terminal never reports releases.
const HOLD_WINDOW: Duration = Duration::from_millis(150);

/// One-shot actions bound to keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    StartOrPause,
    NextMatch,
    RestartOrRetry,
    Quit,
}

/// Keyboard input source built on crossterm key events.
///
/// Terminals that support the kitty keyboard protocol report releases, so
/// held keys are tracked exactly. Elsewhere only presses (and auto-repeat)
/// arrive, and a key counts as held for a short window after each one.
#[derive(Debug, Default)]
pub struct KeyboardInput {
    pressed_at: HashMap<KeyCode, Instant>,
    reports_release: bool,
}

impl KeyboardInput {
    pub fn new(reports_release: bool) -> Self {
        Self {
            pressed_at: HashMap::new(),
            reports_release,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Option<KeyCommand> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(KeyCommand::Quit);
        }

        let code = normalize(key.code);
        match key.kind {
            KeyEventKind::Release => {
                self.reports_release = true;
                self.pressed_at.remove(&code);
                None
            }
            KeyEventKind::Repeat => {
                self.pressed_at.insert(code, now);
                None
            }
            KeyEventKind::Press => {
                self.pressed_at.insert(code, now);
                command_for(code)
            }
        }
    }

    pub fn is_held(&self, code: KeyCode, now: Instant) -> bool {
        let Some(at) = self.pressed_at.get(&code) else {
            return false;
        };
        self.reports_release || now.saturating_duration_since(*at) < HOLD_WINDOW
    }

    pub fn input_state(&self, now: Instant) -> InputState {
        InputState {
            up: self.is_held(KeyCode::Up, now) || self.is_held(KeyCode::Char('w'), now),
            down: self.is_held(KeyCode::Down, now) || self.is_held(KeyCode::Char('s'), now),
        }
    }
}

fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

fn command_for(code: KeyCode) -> Option<KeyCommand> {
    match code {
        KeyCode::Char(' ') => Some(KeyCommand::StartOrPause),
        KeyCode::Char('n') => Some(KeyCommand::NextMatch),
        KeyCode::Char('r') => Some(KeyCommand::RestartOrRetry),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyCommand::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn test_release_reporting_tracks_exact_hold() {
        let mut keyboard = KeyboardInput::new(true);
        let start = Instant::now();

        keyboard.handle_key(event(KeyCode::Up, KeyEventKind::Press), start);
        assert!(keyboard.input_state(start + Duration::from_secs(2)).up);

        keyboard.handle_key(event(KeyCode::Up, KeyEventKind::Release), start);
        assert!(!keyboard.input_state(start).up);
    }

    #[test]
    fn test_hold_window_without_release() {
        let mut keyboard = KeyboardInput::new(false);
        let start = Instant::now();

        keyboard.handle_key(event(KeyCode::Char('S'), KeyEventKind::Press), start);

        assert!(keyboard.input_state(start + Duration::from_millis(100)).down);
        assert!(!keyboard.input_state(start + HOLD_WINDOW).down);
    }

    #[test]
    fn test_command_keys() {
        let mut keyboard = KeyboardInput::default();
        let now = Instant::now();

        let press = |code| event(code, KeyEventKind::Press);
        assert_eq!(
            keyboard.handle_key(press(KeyCode::Char(' ')), now),
            Some(KeyCommand::StartOrPause)
        );
        assert_eq!(
            keyboard.handle_key(press(KeyCode::Char('N')), now),
            Some(KeyCommand::NextMatch)
        );
        assert_eq!(
            keyboard.handle_key(press(KeyCode::Esc), now),
            Some(KeyCommand::Quit)
        );
        assert_eq!(keyboard.handle_key(press(KeyCode::Up), now), None);
        assert_eq!(
            keyboard.handle_key(
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                now
            ),
            Some(KeyCommand::Quit)
        );
    }
}
