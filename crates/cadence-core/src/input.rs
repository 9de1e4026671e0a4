//! P1/JOYP.

pub const BUTTON_RIGHT: u8 = 0x01;
pub const BUTTON_LEFT: u8 = 0x02;
pub const BUTTON_UP: u8 = 0x04;
pub const BUTTON_DOWN: u8 = 0x08;
pub const BUTTON_A: u8 = 0x10;
pub const BUTTON_B: u8 = 0x20;
pub const BUTTON_SELECT: u8 = 0x40;
pub const BUTTON_START: u8 = 0x80;

const SELECT_DIRECTIONS: u8 = 0x10;
const SELECT_BUTTONS: u8 = 0x20;

#[derive(Debug, Clone)]
pub struct Input {
    /// P1 bits 4-5 as written; a 0 bit selects the group.
    select: u8,
    /// Currently held buttons, one bit per `BUTTON_*`.
    pressed: u8,
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

impl Input {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            pressed: 0,
        }
    }

    /// Active-high input lines for the selected groups.
    fn lines(&self) -> u8 {
        let mut lines = 0;
        if self.select & SELECT_DIRECTIONS == 0 {
            lines |= self.pressed & 0x0F;
        }
        if self.select & SELECT_BUTTONS == 0 {
            lines |= self.pressed >> 4;
        }
        lines
    }

    pub fn read(&self) -> u8 {
        0xC0 | self.select | (!self.lines() & 0x0F)
    }

    /// Returns true when a line went low, which requests the joypad
    /// interrupt.
    pub fn write(&mut self, val: u8) -> bool {
        let before = self.lines();
        self.select = val & 0x30;
        self.lines() & !before != 0
    }

    pub fn pressed(&self) -> u8 {
        self.pressed
    }

    pub fn set_pressed(&mut self, buttons: u8) -> bool {
        let before = self.lines();
        self.pressed = buttons;
        self.lines() & !before != 0
    }
}
