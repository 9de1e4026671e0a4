use super::{CartridgeMemory, Mapper, MapperKind};

/// 32 KiB ROM with an optional single RAM chip and no banking.
pub(super) struct RomOnly;

impl Mapper for RomOnly {
    fn kind(&self) -> MapperKind {
        MapperKind::Rom
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(0, addr),
            0x4000..=0x7FFF => mem.rom_byte(1, addr),
            0xA000..=0xBFFF => mem.ram_byte(usize::from(addr - 0xA000)),
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0xA000..=0xBFFF => mem.write_ram(usize::from(addr - 0xA000), val),
            _ => log::debug!(target: "bus", "ROM-only cartridge write {val:02X} to {addr:04X}"),
        }
    }

    fn rom_bank(&self) -> usize {
        1
    }
}
