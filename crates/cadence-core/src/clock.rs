/// Returned by `clocks_to_next_event` when a subsystem has nothing pending.
pub const CLOCKS_NEVER: i32 = 0x7FFF_FFFF;

/// CPU clocks in one frame at normal speed (154 lines of 456 dots).
pub const FRAME_CLOCKS: i32 = 70_224;

/// CPU clocks per second at normal speed.
pub const CLOCKS_PER_SECOND: u32 = 4_194_304;

/// Lazy clock reconciliation shared by every timed subsystem.
///
/// `Ctx` is whatever machine state the subsystem touches while catching up
/// (usually the interrupt controller, so overflow events can raise IF bits).
pub trait Reconcile<Ctx: ?Sized> {
    /// Return to power-on timing state with the clock counter at 0.
    fn reset(&mut self);

    /// Advance internal state by the clocks elapsed since the last call.
    ///
    /// A `reference` equal to the current counter is a no-op. A smaller value
    /// is a caller bug.
    fn update_clocks_counter_reference(&mut self, reference: i32, ctx: &mut Ctx);

    /// Clocks that may pass before this subsystem must be reconciled again.
    fn clocks_to_next_event(&self) -> i32;

    /// Clocks already accounted for in the current run segment.
    fn clock_counter(&self) -> i32;

    /// Rebase the counter to 0 at a run segment boundary. Only valid right
    /// after reconciling to the segment's final reference.
    fn clock_counter_reset(&mut self);
}

/// Per-subsystem clock counter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClockCounter {
    clocks: i32,
}

impl ClockCounter {
    pub const fn new() -> Self {
        Self { clocks: 0 }
    }

    #[inline]
    pub fn get(&self) -> i32 {
        self.clocks
    }

    /// Move the counter to `reference`, returning the elapsed clocks.
    #[inline]
    pub fn advance_to(&mut self, reference: i32) -> i32 {
        debug_assert!(
            reference >= self.clocks,
            "reference clock {reference} behind subsystem counter {}",
            self.clocks
        );
        let delta = reference - self.clocks;
        self.clocks = reference;
        delta
    }

    /// Like `advance_to`, but a stale reference is ignored instead of
    /// asserted. Returns 0 in that case.
    #[inline]
    pub fn advance_to_lenient(&mut self, reference: i32) -> i32 {
        if reference <= self.clocks {
            return 0;
        }
        self.advance_to(reference)
    }

    #[inline]
    pub fn reset(&mut self) {
        self.clocks = 0;
    }
}

/// Clocks until the next falling edge of `bit` for a free-running 16-bit
/// divider currently at `counter`.
#[inline]
pub fn clocks_to_falling_edge(counter: u16, bit: u32) -> i32 {
    let period = 1u32 << (bit + 1);
    let phase = u32::from(counter) & (period - 1);
    (period - phase) as i32
}

/// Number of falling edges of `bit` crossed when a divider moves from
/// `counter` forward by `clocks`.
#[inline]
pub fn falling_edges(counter: u16, clocks: i32, bit: u32) -> u32 {
    let start = u64::from(counter);
    let end = start + clocks.max(0) as u64;
    ((end >> (bit + 1)) - (start >> (bit + 1))) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_edge_distance_wraps_within_period() {
        assert_eq!(clocks_to_falling_edge(0x0000, 3), 16);
        assert_eq!(clocks_to_falling_edge(0x000C, 3), 4);
        assert_eq!(clocks_to_falling_edge(0x000F, 3), 1);
        assert_eq!(clocks_to_falling_edge(0xFFFF, 9), 1);
    }

    #[test]
    fn falling_edges_counts_crossings() {
        assert_eq!(falling_edges(0x0000, 15, 3), 0);
        assert_eq!(falling_edges(0x0000, 16, 3), 1);
        assert_eq!(falling_edges(0x000C, 4, 3), 1);
        assert_eq!(falling_edges(0xFFF0, 0x20, 3), 2);
    }

    #[test]
    fn lenient_advance_ignores_stale_reference() {
        let mut c = ClockCounter::new();
        assert_eq!(c.advance_to(10), 10);
        assert_eq!(c.advance_to_lenient(5), 0);
        assert_eq!(c.get(), 10);
        assert_eq!(c.advance_to(10), 0);
    }

    #[test]
    fn counter_never_passes_or_falls_behind_its_reference() {
        let mut c = ClockCounter::new();
        let mut total = 0;
        for reference in [0, 4, 4, 17, 456, 456, 70_224] {
            let before = c.get();
            total += c.advance_to(reference);
            assert!(c.get() >= before);
            assert_eq!(c.get(), reference);
        }
        assert_eq!(total, 70_224);
        c.reset();
        assert_eq!(c.get(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "behind subsystem counter")]
    fn advancing_backwards_is_a_contract_violation() {
        let mut c = ClockCounter::new();
        c.advance_to(100);
        c.advance_to(99);
    }
}
