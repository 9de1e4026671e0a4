//! Per-register handlers for 0xFF00-0xFF7F and IE.
//!
//! Every handler that touches time-dependent state first reconciles the
//! owning subsystem to the CPU clock. Writes that move a subsystem's next
//! event also raise the CPU break flag so the horizon is recomputed.

use crate::GameBoy;
use crate::diagnostics;
use crate::interrupts::INT_JOYPAD;

pub(crate) fn read_reg8<const CGB: bool>(gb: &mut GameBoy, addr: u16) -> u8 {
    match addr {
        0xFF00 => gb.input.read(),
        0xFF01 | 0xFF02 => {
            gb.sync_serial();
            gb.serial.read(addr)
        }
        0xFF04..=0xFF07 => {
            gb.sync_timer();
            gb.timer.read(addr)
        }
        0xFF0F => {
            gb.sync_interrupt_sources();
            gb.interrupts.read_if()
        }
        0xFF10..=0xFF26 | 0xFF30..=0xFF3F => {
            gb.sync_apu();
            gb.apu.read_reg(addr)
        }
        0xFF46 => gb.dma.read_oam_register(),
        0xFF40..=0xFF4B => {
            gb.sync_ppu();
            gb.ppu.read_reg(addr)
        }
        0xFF4D if CGB && !gb.cgb_compat => {
            let speed = if gb.double_speed { 0x80 } else { 0x00 };
            speed | 0x7E | u8::from(gb.speed_switch_armed)
        }
        0xFF4F if CGB => gb.ppu.read_reg(addr),
        0xFF51..=0xFF55 if CGB => {
            gb.sync_dma();
            gb.dma.read_hdma_reg(addr)
        }
        0xFF56 if CGB => {
            let rp = gb.mem.io[0x56];
            // No infrared partner: reading enabled, no light received.
            let receive = if rp & 0xC0 == 0xC0 { 0x02 } else { 0x00 };
            (rp & 0xC1) | 0x3C | receive
        }
        0xFF68..=0xFF6C if CGB => {
            gb.sync_ppu();
            gb.ppu.read_reg(addr)
        }
        0xFF70 if CGB && !gb.cgb_compat => 0xF8 | gb.mem.wram_bank as u8,
        0xFF72 | 0xFF73 if CGB => gb.mem.io[usize::from(addr & 0x7F)],
        0xFF74 if CGB && !gb.cgb_compat => gb.mem.io[0x74],
        0xFF75 if CGB => gb.mem.io[0x75] | 0x8F,
        0xFF76 | 0xFF77 if CGB => {
            gb.sync_apu();
            gb.apu.read_pcm(addr)
        }
        0xFFFF => gb.interrupts.enable,
        _ => {
            log::debug!(
                target: "bus",
                "read of unmapped I/O {addr:04X} at PC={:04X} bank={}",
                gb.cpu.pc,
                gb.cart.rom_bank()
            );
            0xFF
        }
    }
}

pub(crate) fn write_reg8<const CGB: bool, const BOOT: bool>(gb: &mut GameBoy, addr: u16, val: u8) {
    gb.mem.io[usize::from(addr & 0x7F)] = val;
    match addr {
        0xFF00 => {
            if gb.hardware.is_sgb_family() && val & 0x30 == 0 {
                diagnostics::report_once("sgb-packets", || {
                    "SGB command packets are not processed".to_string()
                });
            }
            if gb.input.write(val) {
                gb.interrupts.request(INT_JOYPAD);
            }
        }
        0xFF01 | 0xFF02 => {
            gb.sync_timer();
            gb.sync_serial();
            let sys_clocks = gb.timer.sys_clocks();
            gb.serial.write(addr, val, sys_clocks);
            if addr == 0xFF02 {
                gb.cpu.request_break();
            }
        }
        0xFF04 => {
            // Everything clocked from the divider must see the reset at the
            // same instant.
            gb.sync_timer();
            gb.sync_serial();
            gb.sync_apu();
            if let Some(old) = gb.timer.write(addr, val) {
                gb.serial.on_divider_reset(old, &mut gb.interrupts);
                gb.apu.on_divider_reset(old);
            }
            gb.cpu.request_break();
        }
        0xFF05..=0xFF07 => {
            gb.sync_timer();
            gb.timer.write(addr, val);
            if addr != 0xFF06 {
                gb.cpu.request_break();
            }
        }
        0xFF0F => {
            gb.sync_interrupt_sources();
            gb.interrupts.write_if(val);
        }
        0xFF10..=0xFF26 | 0xFF30..=0xFF3F => {
            gb.sync_apu();
            let was_powered = gb.apu.powered();
            gb.apu.write_reg(addr, val);
            if addr == 0xFF26 && was_powered != gb.apu.powered() {
                if gb.apu.powered() {
                    gb.apu.align_to_divider(gb.timer.sys_clocks());
                }
                gb.cpu.request_break();
            }
            if matches!(addr, 0xFF14 | 0xFF19 | 0xFF1E | 0xFF23) && val & 0x80 != 0 {
                gb.cpu.request_break();
            }
        }
        0xFF46 => {
            gb.sync_dma();
            gb.dma.start_oam(val);
            gb.cpu.request_break();
        }
        0xFF40..=0xFF4B => {
            if addr == 0xFF40 {
                gb.sync_dma();
            } else {
                gb.sync_ppu();
            }
            gb.ppu.write_reg(addr, val, &mut gb.interrupts);
            if matches!(addr, 0xFF40 | 0xFF41 | 0xFF43 | 0xFF45) {
                gb.cpu.request_break();
            }
        }
        0xFF4C if CGB && BOOT => {
            if val & 0x04 != 0 {
                gb.enter_dmg_compat();
            }
        }
        0xFF4D if CGB && !gb.cgb_compat => gb.speed_switch_armed = val & 0x01 != 0,
        0xFF4F if CGB && !gb.cgb_compat => {
            gb.sync_ppu();
            gb.ppu.write_reg(addr, val, &mut gb.interrupts);
        }
        0xFF50 if BOOT => {
            if val != 0 {
                gb.unmap_boot_rom();
            }
        }
        0xFF51..=0xFF55 if CGB && !gb.cgb_compat => {
            gb.sync_dma();
            let (dma, mut bus) = gb.dma_bus();
            dma.write_hdma_reg(addr, val, &mut bus);
            if addr == 0xFF55 {
                gb.cpu.request_break();
            }
        }
        0xFF56 if CGB => {}
        0xFF68..=0xFF6C if CGB => {
            gb.sync_ppu();
            gb.ppu.write_reg(addr, val, &mut gb.interrupts);
        }
        0xFF70 if CGB && !gb.cgb_compat => {
            let bank = usize::from(val & 0x07);
            gb.mem.wram_bank = if bank == 0 { 1 } else { bank };
        }
        0xFF72..=0xFF75 if CGB => {}
        0xFFFF => gb.interrupts.enable = val,
        _ => {
            log::debug!(
                target: "bus",
                "write {val:02X} to unmapped I/O {addr:04X} at PC={:04X} bank={}",
                gb.cpu.pc,
                gb.cart.rom_bank()
            );
        }
    }
}

impl GameBoy {
    /// Reconcile every unit that can raise an interrupt flag.
    pub(crate) fn sync_interrupt_sources(&mut self) {
        self.sync_timer();
        self.sync_serial();
        self.sync_ppu();
    }

    pub(crate) fn unmap_boot_rom(&mut self) {
        log::info!("boot ROM unmapped at PC={:04X}", self.cpu.pc);
        self.select_bus(false);
        let compat = self.hardware.is_cgb_family() && !self.cart.header().cgb_supported;
        if compat && !self.cgb_compat {
            self.enter_dmg_compat();
        }
    }

    /// Lock the CGB-only banking registers for a DMG cartridge.
    pub(crate) fn enter_dmg_compat(&mut self) {
        if self.cgb_compat {
            return;
        }
        self.cgb_compat = true;
        self.mem.wram_bank = 1;
        self.ppu.vram_bank = 0;
        self.ppu.set_render_mode(crate::ppu::RenderMode::CgbDmgCompat);
        log::info!("CGB running in DMG compatibility mode");
    }
}
