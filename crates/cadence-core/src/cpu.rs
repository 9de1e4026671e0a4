use crate::GameBoy;
use crate::hardware::BootState;

/// Clocks in one machine cycle at either speed. Double speed halves the
/// wall time of a CPU clock, not the count.
pub const MCYCLE_CLOCKS: i32 = 4;

/// Register file and the CPU side of the shared clock.
///
/// Instruction decoding lives in an [`Executor`]; the core only needs the
/// program counter and stack pointer for interrupt dispatch plus the clock
/// reference every subsystem reconciles against.
#[derive(Debug, Clone, Default)]
pub struct CpuState {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    clocks: i32,
    break_requested: bool,
}

impl CpuState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_boot_state(&mut self, state: &BootState) {
        self.a = state.a;
        self.f = state.f;
        self.b = state.b;
        self.c = state.c;
        self.d = state.d;
        self.e = state.e;
        self.h = state.h;
        self.l = state.l;
        self.sp = state.sp;
        self.pc = state.pc;
    }

    /// Clocks since the last counter rebase.
    #[inline]
    pub fn clocks(&self) -> i32 {
        self.clocks
    }

    #[inline]
    pub fn add_clocks(&mut self, clocks: i32) {
        self.clocks += clocks;
    }

    pub(crate) fn rebase(&mut self, base: i32) {
        self.clocks -= base;
    }

    /// Ask the run loop to recompute the event horizon before the next
    /// instruction.
    #[inline]
    pub fn request_break(&mut self) {
        self.break_requested = true;
    }

    pub fn take_break(&mut self) -> bool {
        std::mem::take(&mut self.break_requested)
    }
}

/// Something that drives the CPU side of the bus.
///
/// A step performs one instruction's worth of work: it advances
/// `gb.cpu` by the clocks consumed and performs memory accesses through
/// [`GameBoy::read8`] / [`GameBoy::write8`] at the clock they happen.
pub trait Executor {
    fn step(&mut self, gb: &mut GameBoy);
}

/// Executes an endless stream of NOPs.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleExecutor;

impl Executor for IdleExecutor {
    fn step(&mut self, gb: &mut GameBoy) {
        gb.cpu.add_clocks(MCYCLE_CLOCKS);
        gb.cpu.pc = gb.cpu.pc.wrapping_add(1);
    }
}

/// One scripted CPU bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Read(u16),
    Write(u16, u8),
    /// Spend this many clocks without touching the bus.
    Idle(i32),
    Halt,
    Stop,
}

/// Value observed by a scripted read, with the absolute clock it happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRead {
    pub addr: u16,
    pub value: u8,
    pub clock: u64,
}

/// Replays a fixed list of bus operations, one per step, then idles.
///
/// Each access happens at the current clock and then takes one machine
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct ScriptExecutor {
    ops: Vec<BusOp>,
    next: usize,
    reads: Vec<ScriptRead>,
}

impl ScriptExecutor {
    pub fn new(ops: Vec<BusOp>) -> Self {
        Self {
            ops,
            next: 0,
            reads: Vec::new(),
        }
    }

    pub fn finished(&self) -> bool {
        self.next >= self.ops.len()
    }

    pub fn reads(&self) -> &[ScriptRead] {
        &self.reads
    }
}

impl Executor for ScriptExecutor {
    fn step(&mut self, gb: &mut GameBoy) {
        let Some(op) = self.ops.get(self.next).copied() else {
            IdleExecutor.step(gb);
            return;
        };
        self.next += 1;
        match op {
            BusOp::Read(addr) => {
                let clock = gb.total_clocks();
                let value = gb.read8(addr);
                self.reads.push(ScriptRead { addr, value, clock });
                gb.cpu.add_clocks(MCYCLE_CLOCKS);
            }
            BusOp::Write(addr, val) => {
                gb.write8(addr, val);
                gb.cpu.add_clocks(MCYCLE_CLOCKS);
            }
            BusOp::Idle(clocks) => gb.cpu.add_clocks(clocks.max(1)),
            BusOp::Halt => {
                gb.cpu.add_clocks(MCYCLE_CLOCKS);
                gb.cpu_halt();
            }
            BusOp::Stop => {
                gb.cpu.add_clocks(MCYCLE_CLOCKS);
                gb.cpu_stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_flag_is_consumed_once() {
        let mut cpu = CpuState::new();
        assert!(!cpu.take_break());
        cpu.request_break();
        assert!(cpu.take_break());
        assert!(!cpu.take_break());
    }

    #[test]
    fn rebase_keeps_relative_time() {
        let mut cpu = CpuState::new();
        cpu.add_clocks(70_300);
        cpu.rebase(70_224);
        assert_eq!(cpu.clocks(), 76);
    }
}
