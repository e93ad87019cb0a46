use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Keys the viewer reacts to. Everything else is dropped at translation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    C,
    R,
    X,
    Space,
    Control,
    Shift,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Input gathered over one frame.
///
/// Feed events in as they arrive, read during update, then call
/// [`InputState::end_frame`] once the frame is done.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: HashSet<Key>,
    pressed: HashSet<Key>,
    released: HashSet<Key>,
    buttons_held: HashSet<MouseButton>,
    buttons_pressed: HashSet<MouseButton>,
    mouse_delta: Vec2,
    cursor_captured: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, key: Key) {
        // OS key repeat sends repeated downs; only the first one is an edge.
        if self.held.insert(key) {
            self.pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if self.held.remove(&key) {
            self.released.insert(key);
        }
    }

    pub fn button_down(&mut self, button: MouseButton) {
        if self.buttons_held.insert(button) {
            self.buttons_pressed.insert(button);
        }
    }

    pub fn button_up(&mut self, button: MouseButton) {
        self.buttons_held.remove(&button);
    }

    pub fn mouse_moved(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn was_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    pub fn was_released(&self, key: Key) -> bool {
        self.released.contains(&key)
    }

    pub fn is_button_held(&self, button: MouseButton) -> bool {
        self.buttons_held.contains(&button)
    }

    pub fn was_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn cursor_captured(&self) -> bool {
        self.cursor_captured
    }

    pub fn set_cursor_captured(&mut self, captured: bool) {
        if self.cursor_captured != captured {
            tracing::debug!(captured, "cursor capture changed");
        }
        self.cursor_captured = captured;
    }

    /// Focus loss: nothing can be held once the window stops receiving events.
    pub fn release_all(&mut self) {
        self.released.extend(self.held.drain());
        self.buttons_held.clear();
        self.cursor_captured = false;
    }

    /// Clears per-frame edges and the mouse delta; held state survives.
    pub fn end_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
        self.buttons_pressed.clear();
        self.mouse_delta = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_an_edge() {
        let mut input = InputState::new();
        input.key_down(Key::X);
        assert!(input.was_pressed(Key::X));
        assert!(input.is_held(Key::X));

        input.end_frame();
        assert!(!input.was_pressed(Key::X));
        assert!(input.is_held(Key::X));
    }

    #[test]
    fn key_repeat_does_not_retrigger() {
        let mut input = InputState::new();
        input.key_down(Key::R);
        input.end_frame();
        input.key_down(Key::R);
        assert!(!input.was_pressed(Key::R));
    }

    #[test]
    fn release_is_an_edge() {
        let mut input = InputState::new();
        input.key_down(Key::W);
        input.end_frame();
        input.key_up(Key::W);
        assert!(input.was_released(Key::W));
        assert!(!input.is_held(Key::W));
        input.end_frame();
        assert!(!input.was_released(Key::W));
    }

    #[test]
    fn mouse_delta_accumulates_per_frame() {
        let mut input = InputState::new();
        input.mouse_moved(Vec2::new(2.0, 1.0));
        input.mouse_moved(Vec2::new(-1.0, 3.0));
        assert_eq!(input.mouse_delta(), Vec2::new(1.0, 4.0));
        input.end_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn release_all_drops_everything_held() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        input.button_down(MouseButton::Right);
        input.set_cursor_captured(true);
        input.release_all();
        assert!(!input.is_held(Key::A));
        assert!(input.was_released(Key::A));
        assert!(!input.is_button_held(MouseButton::Right));
        assert!(!input.cursor_captured());
    }
}
