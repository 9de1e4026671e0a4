use crate::apu::Apu;
use crate::cartridge::{Cartridge, HeaderError};
use crate::clock::{CLOCKS_NEVER, FRAME_CLOCKS, Reconcile};
use crate::config::MachineConfig;
use crate::cpu::{CpuState, Executor, MCYCLE_CLOCKS};
use crate::dma::Dma;
use crate::hardware::HardwareType;
use crate::input::Input;
use crate::interrupts::{HaltMode, INT_JOYPAD, Interrupts};
use crate::mmu::{BusMap, BusTable, Memory};
use crate::ppu::{Ppu, RenderMode};
use crate::serial::Serial;
use crate::timer::Timer;

/// CPU clocks the CGB spends switching speed after STOP.
pub const SPEED_SWITCH_CLOCKS: i32 = 8200;

const DMG_BOOT_ROM_LEN: usize = 0x100;
const CGB_BOOT_ROM_LEN: usize = 0x900;

/// The whole machine: every subsystem plus the bound bus dispatch table.
pub struct GameBoy {
    pub hardware: HardwareType,
    pub cpu: CpuState,
    pub interrupts: Interrupts,
    pub timer: Timer,
    pub serial: Serial,
    pub ppu: Ppu,
    pub apu: Apu,
    pub dma: Dma,
    pub input: Input,
    pub mem: Memory,
    pub cart: Cartridge,
    pub strict_vram_checks: bool,
    pub(crate) bus_map: BusMap,
    pub(crate) bus: &'static BusTable,
    pub(crate) double_speed: bool,
    /// KEY1 bit 0.
    pub(crate) speed_switch_armed: bool,
    pub(crate) cgb_compat: bool,
    pub(crate) elapsed_before_segment: u64,
    /// Clocks the previous frame ran past its budget.
    frame_overshoot: i32,
}

impl GameBoy {
    pub fn new(cart: Cartridge, config: MachineConfig) -> Self {
        let hardware = config.resolve_hardware(cart.memory().rom());
        let cgb = hardware.is_cgb_family();
        let mut mem = Memory::new();
        if let Some(boot) = config.boot_rom {
            let expected = if cgb { CGB_BOOT_ROM_LEN } else { DMG_BOOT_ROM_LEN };
            if boot.len() != expected {
                log::warn!(
                    "boot ROM is {} bytes, {hardware} expects {expected}; mapping it anyway",
                    boot.len()
                );
            }
            mem.set_boot_rom(Some(boot));
        }
        let bus_map = BusMap::select(cgb, mem.has_boot_rom());
        let mut gb = Self {
            hardware,
            cpu: CpuState::new(),
            interrupts: Interrupts::new(),
            timer: Timer::new(),
            serial: Serial::new(cgb),
            ppu: Ppu::new(cgb),
            apu: Apu::new(cgb),
            dma: Dma::new(),
            input: Input::new(),
            mem,
            cart,
            strict_vram_checks: config.strict_vram_checks,
            bus_map,
            bus: bus_map.table(),
            double_speed: false,
            speed_switch_armed: false,
            cgb_compat: false,
            elapsed_before_segment: 0,
            frame_overshoot: 0,
        };
        gb.power_on();
        gb
    }

    pub fn from_rom(rom: Vec<u8>, config: MachineConfig) -> Result<Self, HeaderError> {
        Ok(Self::new(Cartridge::from_rom(rom)?, config))
    }

    fn power_on(&mut self) {
        let cgb = self.hardware.is_cgb_family();
        self.ppu.set_stat_write_bug(self.hardware.has_stat_write_bug());
        self.ppu.set_render_mode(if cgb { RenderMode::Cgb } else { RenderMode::Dmg });
        self.cart.set_double_speed(false);

        if self.mem.has_boot_rom() {
            self.select_bus(true);
        } else {
            self.select_bus(false);
            let state = self.hardware.boot_state();
            self.cpu.apply_boot_state(state);
            self.timer.set_sys_clocks(state.sys_clocks);
            self.interrupts.write_if(state.if_reg);
            self.ppu.apply_boot_state(state.lcdc, state.bgp);
            self.apu.apply_boot_state();
            self.apu.align_to_divider(state.sys_clocks);
            if cgb && !self.cart.header().cgb_supported {
                self.enter_dmg_compat();
                self.ppu.apply_dmg_compatibility_palettes();
            }
        }
        log::info!(
            "power on: {} ({}), PC={:04X}",
            self.hardware,
            self.bus.name,
            self.cpu.pc
        );
    }

    /// Power cycle. The cartridge keeps its RAM; plugged backends stay
    /// attached.
    pub fn reset(&mut self) {
        self.timer.reset();
        self.serial.reset();
        self.ppu.reset();
        self.apu.reset();
        Reconcile::reset(&mut self.dma);
        self.cart.reset();
        self.cpu = CpuState::new();
        self.interrupts = Interrupts::new();
        self.input = Input::new();
        let boot = self.mem.take_boot_rom();
        self.mem = Memory::new();
        self.mem.set_boot_rom(boot);
        self.double_speed = false;
        self.speed_switch_armed = false;
        self.cgb_compat = false;
        self.elapsed_before_segment = 0;
        self.frame_overshoot = 0;
        self.power_on();
    }

    pub fn double_speed(&self) -> bool {
        self.double_speed
    }

    pub fn cgb_compat(&self) -> bool {
        self.cgb_compat
    }

    /// HALT: sleep until an enabled interrupt is requested.
    pub fn cpu_halt(&mut self) {
        self.interrupts.halt = HaltMode::Halted;
        self.cpu.request_break();
    }

    /// STOP: performs an armed CGB speed switch, otherwise stops the CPU
    /// until a button is pressed. Either way DIV is cleared.
    pub fn cpu_stop(&mut self) {
        self.write_reg8(0xFF04, 0x00);
        if self.hardware.is_cgb_family() && !self.cgb_compat && self.speed_switch_armed {
            self.update_all();
            self.speed_switch_armed = false;
            self.double_speed = !self.double_speed;
            self.ppu.set_double_speed(self.double_speed);
            self.apu.set_double_speed(self.double_speed, self.timer.sys_clocks());
            self.cart.set_double_speed(self.double_speed);
            log::info!(
                "speed switch to {} speed",
                if self.double_speed { "double" } else { "normal" }
            );
            self.cpu.add_clocks(SPEED_SWITCH_CLOCKS);
        } else {
            self.interrupts.halt = HaltMode::Stopped;
            log::debug!("CPU stopped at PC={:04X}", self.cpu.pc);
        }
        self.cpu.request_break();
    }

    /// Update held buttons (`input::BUTTON_*` bits).
    pub fn set_buttons(&mut self, buttons: u8) {
        if self.input.set_pressed(buttons) {
            self.interrupts.request(INT_JOYPAD);
            if self.interrupts.halt == HaltMode::Stopped {
                self.interrupts.halt = HaltMode::Running;
            }
        }
        self.cpu.request_break();
    }

    /// Run for at least `clocks` CPU clocks. Returns the clocks actually
    /// run; the last instruction may overshoot.
    pub fn run_for(&mut self, exec: &mut dyn Executor, clocks: i32) -> i32 {
        let start = self.cpu.clocks();
        let target = start + clocks;
        while self.cpu.clocks() < target {
            self.update_all();
            // A stalled CPU cannot take interrupts; they stay pending in IF.
            if !self.dma.cpu_blocked() {
                self.handle_interrupts();
            }

            let now = self.cpu.clocks();
            let until_event = self.clocks_to_next_event();
            let horizon = if until_event == CLOCKS_NEVER {
                target
            } else {
                (now + until_event).min(target)
            };

            if self.interrupts.halt != HaltMode::Running {
                // Nothing executes until an event can wake the CPU, so jump
                // straight to it in whole machine cycles.
                let skip = (horizon - now).max(1);
                self.cpu.add_clocks((skip + MCYCLE_CLOCKS - 1) / MCYCLE_CLOCKS * MCYCLE_CLOCKS);
                continue;
            }

            if self.dma.cpu_blocked() {
                self.dma_execute(horizon - now);
                continue;
            }

            while self.cpu.clocks() < horizon {
                exec.step(self);
                if self.cpu.take_break()
                    || self.interrupts.halt != HaltMode::Running
                    || self.dma.cpu_blocked()
                    || (self.interrupts.ime && self.interrupts.pending() != 0)
                {
                    break;
                }
            }
        }
        self.cpu.clocks() - start
    }

    /// Run one frame's worth of clocks (doubled in double speed) and rebase
    /// the clock counters.
    pub fn run_frame(&mut self, exec: &mut dyn Executor) -> i32 {
        let frame = FRAME_CLOCKS << u32::from(self.double_speed);
        let budget = (frame - self.frame_overshoot).max(1);
        let ran = self.run_for(exec, budget);
        self.frame_overshoot = ran - budget;
        self.clock_counters_reset();
        ran
    }

    /// Audio produced since the last call.
    pub fn samples_frame(&mut self) -> Vec<[i16; 2]> {
        self.sync_apu();
        self.apu.samples_frame()
    }
}
