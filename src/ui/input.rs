//! Keyboard input, sampled as per-tick movement intent.

use std::sync::{Arc, Mutex};

use crossterm::event::KeyCode;

use crate::presence::MovementIntent;

/// Poll-model source of movement intent; the engine samples once per
/// tick.
pub trait InputSource: Send {
    fn sample(&mut self) -> MovementIntent;
}

#[derive(Debug, Default)]
struct KeyFlags {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
}

/// Key state shared between the terminal event loop and the engine tick.
///
/// Terminals deliver presses only, never releases, so each WASD press
/// counts as one tick's worth of motion and is cleared when sampled.
#[derive(Clone, Default)]
pub struct KeyboardInput {
    state: Arc<Mutex<KeyFlags>>,
}

impl KeyboardInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key press. Returns whether the key was a movement key.
    pub fn press(&self, code: KeyCode) -> bool {
        let mut state = self.state.lock().unwrap();
        match code {
            KeyCode::Char('w') | KeyCode::Up => state.forward = true,
            KeyCode::Char('s') | KeyCode::Down => state.back = true,
            KeyCode::Char('a') | KeyCode::Left => state.left = true,
            KeyCode::Char('d') | KeyCode::Right => state.right = true,
            _ => return false,
        }
        true
    }
}

impl InputSource for KeyboardInput {
    fn sample(&mut self) -> MovementIntent {
        let mut state = self.state.lock().unwrap();
        let intent =
            MovementIntent::from_keys(state.forward, state.back, state.left, state.right);
        *state = KeyFlags::default();
        intent
    }
}
