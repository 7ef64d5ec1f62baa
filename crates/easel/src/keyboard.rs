use bitflags::bitflags;

bitflags! {
    /// Modifier keys held during a key event, laid out like the USB HID
    /// modifier byte.
    #[derive(Default)]
    pub struct Modifiers: u8 {
        const L_CONTROL = 0b00000001;
        const L_SHIFT   = 0b00000010;
        const L_ALT     = 0b00000100;
        const L_GUI     = 0b00001000;
        const R_CONTROL = 0b00010000;
        const R_SHIFT   = 0b00100000;
        const R_ALT     = 0b01000000;
        const R_GUI     = 0b10000000;
    }
}

impl Modifiers {
    pub fn shift(&self) -> bool {
        self.intersects(Modifiers::L_SHIFT | Modifiers::R_SHIFT)
    }
    pub fn control(&self) -> bool {
        self.intersects(Modifiers::L_CONTROL | Modifiers::R_CONTROL)
    }
    pub fn alt(&self) -> bool {
        self.intersects(Modifiers::L_ALT | Modifiers::R_ALT)
    }
}

/// A physical key, identified by its USB HID usage id. Backends translate
/// their native key codes into these.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Key(pub u8);

impl Key {
    pub const A: Key = Key(0x04);
    pub const Z: Key = Key(0x1D);
    pub const DIGIT_1: Key = Key(0x1E);
    pub const DIGIT_0: Key = Key(0x27);
    pub const ENTER: Key = Key(0x28);
    pub const ESCAPE: Key = Key(0x29);
    pub const BACKSPACE: Key = Key(0x2A);
    pub const TAB: Key = Key(0x2B);
    pub const SPACE: Key = Key(0x2C);
    pub const RIGHT: Key = Key(0x4F);
    pub const LEFT: Key = Key(0x50);
    pub const DOWN: Key = Key(0x51);
    pub const UP: Key = Key(0x52);
    pub const LEFT_CONTROL: Key = Key(0xE0);
    pub const LEFT_SHIFT: Key = Key(0xE1);
    pub const LEFT_ALT: Key = Key(0xE2);
}
