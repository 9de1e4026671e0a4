#![allow(dead_code)]

use cadence_core::GameBoy;
use cadence_core::config::MachineConfig;
use cadence_core::hardware::HardwareType;

pub const ROM_BANK: usize = 0x4000;

/// ROM image with `banks` 16 KiB banks, each starting with its own index so
/// bank switching can be observed at 0x4000.
pub fn rom_image(cart_type: u8, ram_code: u8, banks: usize) -> Vec<u8> {
    let mut rom = vec![0u8; banks.max(2) * ROM_BANK];
    for (bank, chunk) in rom.chunks_mut(ROM_BANK).enumerate() {
        chunk[0] = bank as u8;
        chunk[1] = (bank >> 8) as u8;
    }
    rom[0x0147] = cart_type;
    rom[0x0149] = ram_code;
    rom
}

pub fn cgb_rom_image(cart_type: u8, ram_code: u8, banks: usize) -> Vec<u8> {
    let mut rom = rom_image(cart_type, ram_code, banks);
    rom[0x0143] = 0x80;
    rom
}

pub fn config(hardware: HardwareType) -> MachineConfig {
    MachineConfig {
        hardware: Some(hardware),
        ..MachineConfig::default()
    }
}

pub fn machine_with_rom(hardware: HardwareType, rom: Vec<u8>) -> GameBoy {
    GameBoy::from_rom(rom, config(hardware)).expect("valid test ROM")
}

/// Post-boot DMG running a plain 32 KiB ROM.
pub fn dmg() -> GameBoy {
    machine_with_rom(HardwareType::Dmg, rom_image(0x00, 0x00, 2))
}

/// Post-boot CGB running a CGB-aware 32 KiB ROM.
pub fn cgb() -> GameBoy {
    machine_with_rom(HardwareType::Cgb, cgb_rom_image(0x00, 0x00, 2))
}

/// Move the CPU clock forward without executing anything; subsystems catch
/// up on the next access that observes them.
pub fn advance(gb: &mut GameBoy, clocks: i32) {
    gb.cpu.add_clocks(clocks);
}
