use std::collections::{HashMap, HashSet};

use crate::{
    events::EventKind,
    keyboard::{Key, Modifiers},
    mouse::{MouseButton, MouseButtons},
    prelude::*,
};

/// What the keyboard and mouse look like right now, folded from every event
/// the scheduler has seen. Queried by user code without consuming events from
/// the queue.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    keys_down: HashSet<Key>,
    modifiers: Modifiers,
    key_presses: HashMap<Key, u32>,
    mouse_position: Point,
    buttons_down: MouseButtons,
    button_presses: HashMap<MouseButton, u32>,
}

impl InputState {
    pub fn apply(&mut self, event: &EventKind) {
        match *event {
            EventKind::KeyDown { key, modifiers } => {
                self.modifiers = modifiers;
                // Auto-repeat arrives as repeated KeyDown; count only the first.
                if self.keys_down.insert(key) {
                    *self.key_presses.entry(key).or_default() += 1;
                }
            }
            EventKind::KeyUp { key, modifiers } => {
                self.modifiers = modifiers;
                self.keys_down.remove(&key);
            }
            EventKind::MouseMove { position } => self.mouse_position = position,
            EventKind::MouseButton {
                button,
                pressed,
                position,
            } => {
                self.mouse_position = position;
                if pressed {
                    if !self.buttons_down.contains(button.into()) {
                        *self.button_presses.entry(button).or_default() += 1;
                    }
                    self.buttons_down.insert(button.into());
                } else {
                    self.buttons_down.remove(button.into());
                }
            }
            EventKind::Resize { .. }
            | EventKind::CloseRequested
            | EventKind::BackendFailed { .. } => {}
        }
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Presses of `key` since the previous call for the same key.
    pub fn take_key_presses(&mut self, key: Key) -> u32 {
        self.key_presses.remove(&key).unwrap_or(0)
    }

    pub fn mouse_position(&self) -> Point {
        self.mouse_position
    }

    pub fn buttons_down(&self) -> MouseButtons {
        self.buttons_down
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(button.into())
    }

    /// Presses of `button` since the previous call for the same button.
    pub fn take_mouse_presses(&mut self, button: MouseButton) -> u32 {
        self.button_presses.remove(&button).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::InputState;
    use crate::{
        events::EventKind,
        graphics::Point,
        keyboard::{Key, Modifiers},
        mouse::MouseButton,
    };

    fn key_down(key: Key) -> EventKind {
        EventKind::KeyDown {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    fn key_up(key: Key) -> EventKind {
        EventKind::KeyUp {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    #[test]
    fn key_presses_reset_when_read() {
        let mut state = InputState::default();
        state.apply(&key_down(Key::SPACE));
        assert!(state.is_key_down(Key::SPACE));
        state.apply(&key_up(Key::SPACE));
        state.apply(&key_down(Key::SPACE));
        assert_eq!(state.take_key_presses(Key::SPACE), 2);
        assert_eq!(state.take_key_presses(Key::SPACE), 0);
        assert!(state.is_key_down(Key::SPACE));
    }

    #[test]
    fn auto_repeat_is_one_press() {
        let mut state = InputState::default();
        for _ in 0..5 {
            state.apply(&key_down(Key::A));
        }
        assert_eq!(state.take_key_presses(Key::A), 1);
        state.apply(&key_up(Key::A));
        assert!(!state.is_key_down(Key::A));
    }

    #[test]
    fn mouse_tracks_position_and_buttons() {
        let mut state = InputState::default();
        state.apply(&EventKind::MouseMove {
            position: Point::new(3, 4),
        });
        assert_eq!(state.mouse_position(), Point::new(3, 4));

        state.apply(&EventKind::MouseButton {
            button: MouseButton::Left,
            pressed: true,
            position: Point::new(5, 6),
        });
        assert_eq!(state.mouse_position(), Point::new(5, 6));
        assert!(state.is_mouse_button_down(MouseButton::Left));
        assert!(!state.is_mouse_button_down(MouseButton::Right));

        state.apply(&EventKind::MouseButton {
            button: MouseButton::Left,
            pressed: false,
            position: Point::new(5, 6),
        });
        assert!(!state.is_mouse_button_down(MouseButton::Left));
        assert_eq!(state.take_mouse_presses(MouseButton::Left), 1);
        assert_eq!(state.take_mouse_presses(MouseButton::Left), 0);
    }
}
