use bitflags::bitflags;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

bitflags! {
    /// The set of buttons currently held.
    #[derive(Default)]
    pub struct MouseButtons: u8 {
        const LEFT   = 0b001;
        const MIDDLE = 0b010;
        const RIGHT  = 0b100;
    }
}

impl From<MouseButton> for MouseButtons {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => MouseButtons::LEFT,
            MouseButton::Middle => MouseButtons::MIDDLE,
            MouseButton::Right => MouseButtons::RIGHT,
        }
    }
}
