use crate::GameBoy;

pub const INT_VBLANK: u8 = 0x01;
pub const INT_STAT: u8 = 0x02;
pub const INT_TIMER: u8 = 0x04;
pub const INT_SERIAL: u8 = 0x08;
pub const INT_JOYPAD: u8 = 0x10;

const INTERRUPT_MASK: u8 = 0x1F;

/// Vector addresses in service priority order.
const VECTORS: [(u8, u16); 5] = [
    (INT_VBLANK, 0x0040),
    (INT_STAT, 0x0048),
    (INT_TIMER, 0x0050),
    (INT_SERIAL, 0x0058),
    (INT_JOYPAD, 0x0060),
];

/// Clocks spent before the upper PC byte is pushed.
const ACK_PUSH_HIGH_CLOCKS: i32 = 8;
/// Clocks between the two pushes.
const ACK_PUSH_LOW_CLOCKS: i32 = 4;
/// Clocks spent jumping to the vector.
const ACK_JUMP_CLOCKS: i32 = 8;
/// Clocks taken to leave HALT with IME clear.
const HALT_EXIT_CLOCKS: i32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HaltMode {
    #[default]
    Running,
    Halted,
    /// STOP: only a joypad line going low (or a speed switch) resumes.
    Stopped,
}

/// IE/IF, IME and the CPU sleep state.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    pub enable: u8,
    pub flags: u8,
    pub ime: bool,
    pub halt: HaltMode,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn request(&mut self, mask: u8) {
        self.flags |= mask & INTERRUPT_MASK;
    }

    #[inline]
    pub fn clear(&mut self, mask: u8) {
        self.flags &= !mask;
    }

    /// Requested and enabled sources.
    #[inline]
    pub fn pending(&self) -> u8 {
        self.flags & self.enable & INTERRUPT_MASK
    }

    pub fn read_if(&self) -> u8 {
        self.flags | 0xE0
    }

    pub fn write_if(&mut self, val: u8) {
        self.flags = val & INTERRUPT_MASK;
    }

    /// Highest-priority pending source and its vector.
    pub fn highest_pending(&self) -> Option<(u8, u16)> {
        let pending = self.pending();
        VECTORS.iter().copied().find(|(mask, _)| pending & mask != 0)
    }
}

impl GameBoy {
    /// Service interrupts at an instruction boundary.
    ///
    /// Returns the clocks consumed: 20 for a dispatched interrupt, 4 for a
    /// HALT exit with IME clear, 0 otherwise.
    pub fn handle_interrupts(&mut self) -> i32 {
        if self.interrupts.pending() == 0 {
            return 0;
        }
        if self.interrupts.halt == HaltMode::Stopped {
            return 0;
        }

        if !self.interrupts.ime {
            if self.interrupts.halt == HaltMode::Halted {
                self.interrupts.halt = HaltMode::Running;
                self.cpu.add_clocks(HALT_EXIT_CLOCKS);
                return HALT_EXIT_CLOCKS;
            }
            return 0;
        }

        self.interrupts.halt = HaltMode::Running;
        self.interrupts.ime = false;

        let pc = self.cpu.pc;
        self.cpu.add_clocks(ACK_PUSH_HIGH_CLOCKS);
        self.cpu.sp = self.cpu.sp.wrapping_sub(1);
        self.write8(self.cpu.sp, (pc >> 8) as u8);
        self.cpu.add_clocks(ACK_PUSH_LOW_CLOCKS);
        self.cpu.sp = self.cpu.sp.wrapping_sub(1);
        self.write8(self.cpu.sp, pc as u8);

        // The upper push can land on IE and cancel the dispatch, so the
        // vector is resolved only after both pushes.
        self.cpu.pc = match self.interrupts.highest_pending() {
            Some((mask, vector)) => {
                self.interrupts.clear(mask);
                vector
            }
            None => 0x0000,
        };
        self.cpu.add_clocks(ACK_JUMP_CLOCKS);

        ACK_PUSH_HIGH_CLOCKS + ACK_PUSH_LOW_CLOCKS + ACK_JUMP_CLOCKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_fixed() {
        let mut irq = Interrupts::new();
        irq.enable = 0x1F;
        irq.request(INT_JOYPAD | INT_TIMER | INT_STAT);
        assert_eq!(irq.highest_pending(), Some((INT_STAT, 0x0048)));
        irq.clear(INT_STAT);
        assert_eq!(irq.highest_pending(), Some((INT_TIMER, 0x0050)));
    }

    #[test]
    fn if_reads_upper_bits_set() {
        let mut irq = Interrupts::new();
        irq.write_if(0xFF);
        assert_eq!(irq.flags, 0x1F);
        assert_eq!(irq.read_if(), 0xFF);
        irq.write_if(0x00);
        assert_eq!(irq.read_if(), 0xE0);
    }

    #[test]
    fn disabled_sources_are_not_pending() {
        let mut irq = Interrupts::new();
        irq.request(INT_VBLANK);
        assert_eq!(irq.pending(), 0);
        irq.enable = INT_VBLANK;
        assert_eq!(irq.pending(), INT_VBLANK);
    }
}
