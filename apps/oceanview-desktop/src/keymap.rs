use oceanview_input::{Key, MouseButton};
use winit::keyboard::KeyCode;

/// Physical keys the app reacts to; everything else is left to egui.
pub fn key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyX => Key::X,
        KeyCode::Space => Key::Space,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::Escape => Key::Escape,
        _ => return None,
    };
    Some(key)
}

pub fn button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_control_keys_map_to_control() {
        assert_eq!(key(KeyCode::ControlLeft), Some(Key::Control));
        assert_eq!(key(KeyCode::ControlRight), Some(Key::Control));
    }

    #[test]
    fn unbound_keys_are_ignored() {
        assert_eq!(key(KeyCode::KeyQ), None);
        assert_eq!(button(winit::event::MouseButton::Back), None);
    }
}
