//! Event horizon and reconciliation order.
//!
//! The CPU clock is the reference. Subsystems lag behind it and are caught
//! up either on demand (a bus access that observes them) or in bulk when the
//! CPU reaches the horizon: the nearest clock at which any subsystem must
//! act on its own.

use crate::GameBoy;
use crate::clock::{CLOCKS_NEVER, Reconcile};

impl GameBoy {
    #[inline]
    pub fn sync_timer(&mut self) {
        let now = self.cpu.clocks();
        self.timer.update_clocks_counter_reference(now, &mut self.interrupts);
    }

    #[inline]
    pub fn sync_serial(&mut self) {
        let now = self.cpu.clocks();
        self.serial.update_clocks_counter_reference(now, &mut self.interrupts);
    }

    #[inline]
    pub fn sync_ppu(&mut self) {
        let now = self.cpu.clocks();
        self.ppu.update_clocks_counter_reference(now, &mut self.interrupts);
    }

    #[inline]
    pub fn sync_apu(&mut self) {
        let now = self.cpu.clocks();
        self.apu.update_clocks_counter_reference(now, &mut ());
    }

    #[inline]
    pub fn sync_cart(&mut self) {
        let now = self.cpu.clocks();
        self.cart.update_clocks_counter_reference(now, &mut ());
    }

    /// Reconcile every subsystem to the CPU clock.
    ///
    /// The timer goes first since serial and sound phase off its divider;
    /// the DMA runs after the PPU whose HBlank it waits for.
    pub fn update_all(&mut self) {
        self.sync_timer();
        self.sync_serial();
        self.sync_apu();
        self.sync_dma();
        if self.cart.is_clocked() {
            self.sync_cart();
        }
    }

    /// Clocks the CPU may run, from now, before some subsystem needs to be
    /// reconciled. Each subsystem reports relative to its own counter, so
    /// this is only exact right after `update_all`.
    pub fn clocks_to_next_event(&self) -> i32 {
        let now = self.cpu.clocks();
        let until = |counter: i32, next: i32| {
            if next == CLOCKS_NEVER {
                CLOCKS_NEVER
            } else {
                (counter + next - now).max(0)
            }
        };
        let candidates = [
            until(self.timer.clock_counter(), self.timer.clocks_to_next_event()),
            until(self.serial.clock_counter(), self.serial.clocks_to_next_event()),
            until(self.ppu.clock_counter(), self.ppu.clocks_to_next_event()),
            until(self.apu.clock_counter(), self.apu.clocks_to_next_event()),
            until(self.dma.clock_counter(), Reconcile::clocks_to_next_event(&self.dma)),
        ];
        candidates.into_iter().min().unwrap_or(CLOCKS_NEVER)
    }

    /// Rebase every counter at the end of a run segment so the shared clock
    /// never overflows. Everything is reconciled first; afterwards all
    /// counters, the CPU's included, read 0.
    pub(crate) fn clock_counters_reset(&mut self) {
        self.sync_timer();
        self.sync_serial();
        self.sync_apu();
        self.sync_dma();
        self.sync_cart();
        let base = self.cpu.clocks();
        self.elapsed_before_segment += base.max(0) as u64;
        self.cpu.rebase(base);
        self.timer.clock_counter_reset();
        self.serial.clock_counter_reset();
        self.apu.clock_counter_reset();
        self.ppu.clock_counter_reset();
        Reconcile::clock_counter_reset(&mut self.dma);
        self.cart.clock_counter_reset();
    }

    /// Clocks since power-on.
    pub fn total_clocks(&self) -> u64 {
        self.elapsed_before_segment + self.cpu.clocks().max(0) as u64
    }
}
