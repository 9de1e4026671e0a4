use crate::clock::{CLOCKS_NEVER, ClockCounter, Reconcile, clocks_to_falling_edge};
use crate::interrupts::{INT_TIMER, Interrupts};

/// Clocks between a TIMA overflow and both the TMA reload and the IF bit.
pub const OVERFLOW_DELAY: i32 = 4;

/// DIV/TIMA/TMA/TAC.
///
/// TIMA counts falling edges of one bit of the 16-bit system counter, chosen
/// by TAC. Overflow leaves TIMA at 0x00 for `OVERFLOW_DELAY` clocks before TMA
/// is copied in and the interrupt is requested; the two latencies are
/// separate countdowns so either can be observed (or cancelled) on its own.
#[derive(Debug, Clone)]
pub struct Timer {
    clock: ClockCounter,
    /// Internal system counter. DIV is the upper byte.
    sys_clocks: u16,
    tima: u8,
    tma: u8,
    tac: u8,
    reload_delay: i32,
    irq_delay: i32,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            clock: ClockCounter::new(),
            sys_clocks: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            reload_delay: 0,
            irq_delay: 0,
        }
    }

    #[inline]
    pub fn sys_clocks(&self) -> u16 {
        self.sys_clocks
    }

    pub fn set_sys_clocks(&mut self, value: u16) {
        self.sys_clocks = value;
    }

    #[inline]
    fn enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    /// System counter bit whose falling edge clocks TIMA.
    #[inline]
    const fn tac_bit(tac: u8) -> u32 {
        match tac & 0x03 {
            0 => 9,
            1 => 3,
            2 => 5,
            _ => 7,
        }
    }

    /// CPU clocks between TIMA increments for the current TAC.
    pub fn period(&self) -> i32 {
        1 << (Self::tac_bit(self.tac) + 1)
    }

    #[inline]
    fn signal_with(sys_clocks: u16, tac: u8) -> bool {
        tac & 0x04 != 0 && (sys_clocks >> Self::tac_bit(tac)) & 1 != 0
    }

    fn increment(&mut self) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.reload_delay = OVERFLOW_DELAY;
            self.irq_delay = OVERFLOW_DELAY;
        } else {
            self.tima += 1;
        }
    }

    /// Clocks until the next internal state change: a TIMA increment or the
    /// expiry of an overflow countdown.
    fn clocks_to_next_step(&self) -> i32 {
        let mut next = CLOCKS_NEVER;
        if self.enabled() {
            next = clocks_to_falling_edge(self.sys_clocks, Self::tac_bit(self.tac));
        }
        if self.reload_delay > 0 {
            next = next.min(self.reload_delay);
        }
        if self.irq_delay > 0 {
            next = next.min(self.irq_delay);
        }
        next
    }

    /// Advance by at most `clocks_to_next_step()`.
    fn advance(&mut self, clocks: i32, irq: &mut Interrupts) {
        let edge = self.enabled()
            && clocks == clocks_to_falling_edge(self.sys_clocks, Self::tac_bit(self.tac));
        self.sys_clocks = self.sys_clocks.wrapping_add(clocks as u16);

        if self.reload_delay > 0 {
            self.reload_delay -= clocks;
            if self.reload_delay <= 0 {
                self.reload_delay = 0;
                self.tima = self.tma;
            }
        }
        if self.irq_delay > 0 {
            self.irq_delay -= clocks;
            if self.irq_delay <= 0 {
                self.irq_delay = 0;
                irq.request(INT_TIMER);
            }
        }
        if edge {
            self.increment();
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.sys_clocks >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    /// Register write at the timer's current clock. The caller reconciles
    /// first. Returns the system counter value a DIV write replaced, so the
    /// units clocked from the divider can react to the reset.
    pub fn write(&mut self, addr: u16, val: u8) -> Option<u16> {
        match addr {
            0xFF04 => {
                let old = self.sys_clocks;
                // Clearing the counter drops the selected bit, which is a
                // falling edge if it was high.
                if Self::signal_with(old, self.tac) {
                    self.increment();
                }
                self.sys_clocks = 0;
                return Some(old);
            }
            0xFF05 => {
                // Writing during the overflow window cancels both the
                // reload and the interrupt.
                if self.reload_delay > 0 {
                    self.reload_delay = 0;
                    self.irq_delay = 0;
                }
                self.tima = val;
            }
            0xFF06 => self.tma = val,
            0xFF07 => {
                let prev = Self::signal_with(self.sys_clocks, self.tac);
                self.tac = val & 0x07;
                let new = Self::signal_with(self.sys_clocks, self.tac);
                // Multiplexer glitch: the edge detector also sees edges
                // caused by switching the selected bit or disabling.
                // Hardware variants disagree in corner cases; this is the
                // same rule for every model.
                if prev && !new {
                    self.increment();
                }
            }
            _ => {}
        }
        None
    }

    pub fn overflow_pending(&self) -> bool {
        self.reload_delay > 0 || self.irq_delay > 0
    }
}

impl Reconcile<Interrupts> for Timer {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn update_clocks_counter_reference(&mut self, reference: i32, irq: &mut Interrupts) {
        let mut remaining = self.clock.advance_to(reference);
        while remaining > 0 {
            let step = remaining.min(self.clocks_to_next_step());
            self.advance(step, irq);
            remaining -= step;
        }
    }

    fn clocks_to_next_event(&self) -> i32 {
        if self.irq_delay > 0 || self.reload_delay > 0 {
            return self.irq_delay.max(self.reload_delay);
        }
        if !self.enabled() {
            return CLOCKS_NEVER;
        }
        let first = clocks_to_falling_edge(self.sys_clocks, Self::tac_bit(self.tac));
        // Overflow happens on the increment that takes TIMA past 0xFF; the
        // interrupt follows after the delay.
        let increments = 0xFF - i32::from(self.tima);
        first + increments * self.period() + OVERFLOW_DELAY
    }

    fn clock_counter(&self) -> i32 {
        self.clock.get()
    }

    fn clock_counter_reset(&mut self) {
        self.clock.reset();
    }
}
