use crate::clock::{CLOCKS_NEVER, ClockCounter, Reconcile, clocks_to_falling_edge};
use crate::interrupts::{INT_SERIAL, Interrupts};

pub trait LinkPort: Send {
    /// Exchange one byte with the link partner. Called once per transfer,
    /// when the first bit is clocked. Returns the byte the partner sends.
    fn transfer(&mut self, byte: u8) -> u8;
}

/// Port used when no cable is attached.
///
/// The data line floats high, so every transfer receives 0xFF. With
/// `loopback` set the outgoing byte is echoed back instead.
#[derive(Default)]
pub struct NullLinkPort {
    loopback: bool,
}

impl NullLinkPort {
    pub fn new(loopback: bool) -> Self {
        Self { loopback }
    }
}

impl LinkPort for NullLinkPort {
    fn transfer(&mut self, byte: u8) -> u8 {
        if self.loopback { byte } else { 0xFF }
    }
}

/// Divider bit that clocks the shift register at 8192 Hz.
const NORMAL_CLOCK_BIT: u32 = 8;
/// Divider bit used by the CGB fast clock (SC bit 1).
const FAST_CLOCK_BIT: u32 = 3;

struct TransferState {
    remaining_bits: u8,
    outgoing: u8,
    incoming: Option<u8>,
    internal_clock: bool,
    clock_bit: u32,
    clocks_to_next_bit: i32,
}

impl TransferState {
    fn shift(&mut self, sb: &mut u8) -> bool {
        let incoming = self.incoming.unwrap_or(0xFF);
        let bit = (incoming >> (self.remaining_bits - 1)) & 1;
        *sb = (*sb << 1) | bit;
        self.remaining_bits -= 1;
        self.remaining_bits == 0
    }

    fn period(&self) -> i32 {
        1 << (self.clock_bit + 1)
    }
}

/// SB/SC and the shift clock.
///
/// With the internal clock, bits shift on falling edges of a system counter
/// bit (8 normally, 3 in CGB fast mode), every 512 or 16 CPU clocks in either
/// speed. Externally clocked transfers only advance through
/// `external_clock_pulse`.
pub struct Serial {
    clock: ClockCounter,
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
    port: Box<dyn LinkPort + Send>,
    transfer: Option<TransferState>,
    cgb_mode: bool,
}

impl Serial {
    pub fn new(cgb: bool) -> Self {
        Self {
            clock: ClockCounter::new(),
            sb: 0,
            sc: if cgb { 0x7F } else { 0x7E },
            out_buf: Vec::new(),
            port: Box::new(NullLinkPort::default()),
            transfer: None,
            cgb_mode: cgb,
        }
    }

    pub fn connect(&mut self, port: Box<dyn LinkPort + Send>) {
        self.port = port;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => {
                if self.cgb_mode {
                    self.sc | 0x7C
                } else {
                    self.sc | 0x7E
                }
            }
            _ => 0xFF,
        }
    }

    /// Register write at the serial unit's current clock. `sys_clocks` is
    /// the system counter at the same clock and phases the first bit.
    pub fn write(&mut self, addr: u16, val: u8, sys_clocks: u16) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val;
                self.transfer = None;
                if val & 0x80 == 0 {
                    return;
                }
                let internal_clock = val & 0x01 != 0;
                let fast = self.cgb_mode && val & 0x02 != 0;
                let clock_bit = if fast { FAST_CLOCK_BIT } else { NORMAL_CLOCK_BIT };
                self.transfer = Some(TransferState {
                    remaining_bits: 8,
                    outgoing: self.sb,
                    incoming: None,
                    internal_clock,
                    clock_bit,
                    clocks_to_next_bit: clocks_to_falling_edge(sys_clocks, clock_bit),
                });
                // Without a partner clocking us an external transfer stays
                // pending forever, so SC bit 7 remains set.
            }
            _ => {}
        }
    }

    /// Realign the shift clock after DIV was cleared. A high clock bit at the
    /// reset is a falling edge and shifts immediately.
    pub fn on_divider_reset(&mut self, old_sys_clocks: u16, irq: &mut Interrupts) {
        let Some(state) = self.transfer.as_mut() else {
            return;
        };
        if !state.internal_clock {
            return;
        }
        let bit_high = (old_sys_clocks >> state.clock_bit) & 1 != 0;
        state.clocks_to_next_bit = state.period();
        if bit_high {
            self.clock_bit(irq);
        }
    }

    /// Deliver clock pulses from a link partner driving an external clock.
    pub fn external_clock_pulse(&mut self, count: u8, irq: &mut Interrupts) {
        for _ in 0..count {
            match self.transfer.as_ref() {
                Some(state) if !state.internal_clock => self.clock_bit(irq),
                _ => return,
            }
        }
    }

    fn clock_bit(&mut self, irq: &mut Interrupts) {
        let complete = {
            let Some(state) = self.transfer.as_mut() else {
                return;
            };
            if state.incoming.is_none() {
                state.incoming = Some(self.port.transfer(state.outgoing));
            }
            state.shift(&mut self.sb)
        };
        if complete {
            if let Some(state) = self.transfer.take() {
                self.out_buf.push(state.outgoing);
            }
            self.sc &= 0x7F;
            irq.request(INT_SERIAL);
        }
    }

    pub fn transfer_active(&self) -> bool {
        self.transfer.is_some()
    }

    /// Bytes sent by the guest since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}

impl Reconcile<Interrupts> for Serial {
    fn reset(&mut self) {
        let port = std::mem::replace(&mut self.port, Box::new(NullLinkPort::default()));
        *self = Self::new(self.cgb_mode);
        self.port = port;
    }

    fn update_clocks_counter_reference(&mut self, reference: i32, irq: &mut Interrupts) {
        let mut remaining = self.clock.advance_to(reference);
        while remaining > 0 {
            let Some(state) = self.transfer.as_mut() else {
                return;
            };
            if !state.internal_clock {
                return;
            }
            if remaining < state.clocks_to_next_bit {
                state.clocks_to_next_bit -= remaining;
                return;
            }
            remaining -= state.clocks_to_next_bit;
            state.clocks_to_next_bit = state.period();
            self.clock_bit(irq);
        }
    }

    fn clocks_to_next_event(&self) -> i32 {
        match self.transfer.as_ref() {
            Some(state) if state.internal_clock => {
                state.clocks_to_next_bit + (i32::from(state.remaining_bits) - 1) * state.period()
            }
            _ => CLOCKS_NEVER,
        }
    }

    fn clock_counter(&self) -> i32 {
        self.clock.get()
    }

    fn clock_counter_reset(&mut self) {
        self.clock.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_reference_changes_nothing() {
        let mut serial = Serial::new(false);
        let mut irq = Interrupts::new();
        serial.write(0xFF01, 0xA5, 0);
        serial.write(0xFF02, 0x81, 0);
        let state = |s: &Serial| {
            (
                s.read(0xFF01),
                s.read(0xFF02),
                s.clocks_to_next_event(),
                s.transfer_active(),
            )
        };

        serial.update_clocks_counter_reference(3 * 512 + 7, &mut irq);
        let mid = state(&serial);
        serial.update_clocks_counter_reference(3 * 512 + 7, &mut irq);
        assert_eq!(state(&serial), mid);

        serial.update_clocks_counter_reference(8 * 512, &mut irq);
        assert_ne!(irq.flags & INT_SERIAL, 0);
        let done = state(&serial);
        irq.flags = 0;
        serial.update_clocks_counter_reference(8 * 512, &mut irq);
        assert_eq!(state(&serial), done);
        assert_eq!(irq.flags, 0);
        assert_eq!(serial.take_output(), vec![0xA5]);
    }

    struct FixedInLinkPort {
        incoming: u8,
        seen: Option<u8>,
    }

    impl LinkPort for FixedInLinkPort {
        fn transfer(&mut self, byte: u8) -> u8 {
            self.seen = Some(byte);
            self.incoming
        }
    }

    #[test]
    fn internal_transfer_takes_eight_bit_periods() {
        let mut serial = Serial::new(false);
        let mut irq = Interrupts::new();
        serial.connect(Box::new(FixedInLinkPort {
            incoming: 0x5A,
            seen: None,
        }));
        serial.write(0xFF01, 0x81, 0);
        serial.write(0xFF02, 0x81, 0);
        assert_eq!(serial.clocks_to_next_event(), 8 * 512);
        serial.update_clocks_counter_reference(8 * 512 - 1, &mut irq);
        assert!(serial.transfer_active());
        serial.update_clocks_counter_reference(8 * 512, &mut irq);
        assert!(!serial.transfer_active());
        assert_eq!(serial.read(0xFF01), 0x5A);
        assert_eq!(serial.read(0xFF02) & 0x80, 0);
        assert_ne!(irq.flags & INT_SERIAL, 0);
        assert_eq!(serial.take_output(), vec![0x81]);
    }

    #[test]
    fn cgb_fast_clock_is_sixteen_clocks_per_bit() {
        let mut serial = Serial::new(true);
        let mut irq = Interrupts::new();
        serial.write(0xFF02, 0x83, 0);
        assert_eq!(serial.clocks_to_next_event(), 8 * 16);
        serial.update_clocks_counter_reference(8 * 16, &mut irq);
        assert_eq!(serial.read(0xFF01), 0xFF);
        assert_ne!(irq.flags & INT_SERIAL, 0);
    }

    #[test]
    fn dmg_ignores_fast_clock_bit() {
        let mut serial = Serial::new(false);
        serial.write(0xFF02, 0x83, 0);
        assert_eq!(serial.clocks_to_next_event(), 8 * 512);
    }

    #[test]
    fn first_bit_aligns_to_divider() {
        let mut serial = Serial::new(false);
        serial.write(0xFF02, 0x81, 0x0100);
        assert_eq!(serial.clocks_to_next_event(), 256 + 7 * 512);
    }

    #[test]
    fn external_clock_never_completes_alone() {
        let mut serial = Serial::new(false);
        let mut irq = Interrupts::new();
        serial.write(0xFF02, 0x80, 0);
        assert_eq!(serial.clocks_to_next_event(), CLOCKS_NEVER);
        serial.update_clocks_counter_reference(100_000, &mut irq);
        assert!(serial.transfer_active());
        serial.external_clock_pulse(8, &mut irq);
        assert!(!serial.transfer_active());
        assert_ne!(irq.flags & INT_SERIAL, 0);
    }
}
