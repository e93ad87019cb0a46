use crate::state::{InputState, Key, MouseButton};
use serde::{Deserialize, Serialize};

/// A discrete request produced from input edges.
///
/// Consumers react to actions, never to raw keys, so rebinding only touches
/// [`Bindings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    ToggleWireframe,
    ReloadShaders,
    CaptureCursor,
    ReleaseCursor,
    Exit,
}

/// Key and button triggers for each [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    pub toggle_wireframe: Key,
    pub reload_shaders: Key,
    pub release_cursor: Key,
    pub capture_cursor: MouseButton,
    pub exit: Key,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            toggle_wireframe: Key::X,
            reload_shaders: Key::R,
            release_cursor: Key::Escape,
            capture_cursor: MouseButton::Right,
            exit: Key::C,
        }
    }
}

impl Bindings {
    /// Actions triggered this frame, in a fixed order.
    pub fn actions(&self, input: &InputState) -> Vec<Action> {
        let mut actions = Vec::new();
        if input.was_pressed(self.toggle_wireframe) {
            actions.push(Action::ToggleWireframe);
        }
        if input.was_pressed(self.reload_shaders) {
            actions.push(Action::ReloadShaders);
        }
        if input.was_button_pressed(self.capture_cursor) {
            actions.push(Action::CaptureCursor);
        }
        if input.was_pressed(self.release_cursor) {
            actions.push(Action::ReleaseCursor);
        }
        if input.was_pressed(self.exit) {
            actions.push(Action::Exit);
        }
        actions
    }

    pub fn triggered(&self, input: &InputState, action: Action) -> bool {
        match action {
            Action::ToggleWireframe => input.was_pressed(self.toggle_wireframe),
            Action::ReloadShaders => input.was_pressed(self.reload_shaders),
            Action::CaptureCursor => input.was_button_pressed(self.capture_cursor),
            Action::ReleaseCursor => input.was_pressed(self.release_cursor),
            Action::Exit => input.was_pressed(self.exit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_map_edges_to_actions() {
        let bindings = Bindings::default();
        let mut input = InputState::new();
        input.key_down(Key::X);
        input.key_down(Key::R);
        assert_eq!(
            bindings.actions(&input),
            vec![Action::ToggleWireframe, Action::ReloadShaders]
        );
    }

    #[test]
    fn holding_a_key_fires_once() {
        let bindings = Bindings::default();
        let mut input = InputState::new();
        input.key_down(Key::X);
        assert!(bindings.triggered(&input, Action::ToggleWireframe));
        input.end_frame();
        assert!(!bindings.triggered(&input, Action::ToggleWireframe));
        assert!(bindings.actions(&input).is_empty());
    }

    #[test]
    fn right_click_captures() {
        let bindings = Bindings::default();
        let mut input = InputState::new();
        input.button_down(MouseButton::Right);
        assert_eq!(bindings.actions(&input), vec![Action::CaptureCursor]);
    }

    #[test]
    fn rebinding_changes_trigger() {
        let bindings = Bindings {
            exit: Key::Escape,
            ..Bindings::default()
        };
        let mut input = InputState::new();
        input.key_down(Key::Escape);
        assert_eq!(
            bindings.actions(&input),
            vec![Action::ReleaseCursor, Action::Exit]
        );
    }
}
