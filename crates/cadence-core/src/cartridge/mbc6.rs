use super::{CartridgeMemory, Mapper, MapperKind};
use crate::diagnostics;

const ROM_HALF_BANK: usize = 0x2000;
const RAM_HALF_BANK: usize = 0x1000;

/// MBC6 with two independently banked 8 KiB ROM windows and two 4 KiB RAM
/// windows. The flash chip is not emulated; flash-mapped windows read 0xFF.
pub(super) struct Mbc6 {
    ram_enable: bool,
    ram_bank: [u8; 2],
    rom_bank: [u8; 2],
    flash_mapped: [bool; 2],
}

impl Mbc6 {
    pub(super) fn new() -> Self {
        Self {
            ram_enable: false,
            ram_bank: [0, 1],
            rom_bank: [2, 3],
            flash_mapped: [false; 2],
        }
    }

    fn rom_window(&self, mem: &CartridgeMemory, window: usize, addr: u16) -> u8 {
        if self.flash_mapped[window] {
            return 0xFF;
        }
        let offset = usize::from(self.rom_bank[window]) * ROM_HALF_BANK + usize::from(addr & 0x1FFF);
        mem.rom_linear(offset)
    }

    fn ram_offset(&self, window: usize, addr: u16) -> usize {
        usize::from(self.ram_bank[window] & 0x07) * RAM_HALF_BANK + usize::from(addr & 0x0FFF)
    }
}

impl Mapper for Mbc6 {
    fn kind(&self) -> MapperKind {
        MapperKind::Mbc6
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(0, addr),
            0x4000..=0x5FFF => self.rom_window(mem, 0, addr),
            0x6000..=0x7FFF => self.rom_window(mem, 1, addr),
            0xA000..=0xAFFF if self.ram_enable => mem.ram_byte(self.ram_offset(0, addr)),
            0xB000..=0xBFFF if self.ram_enable => mem.ram_byte(self.ram_offset(1, addr)),
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0x0000..=0x03FF => self.ram_enable = val & 0x0F == 0x0A,
            0x0400..=0x07FF => self.ram_bank[0] = val,
            0x0800..=0x0BFF => self.ram_bank[1] = val,
            0x0C00..=0x1FFF => {
                diagnostics::report_once("mbc6-flash", || {
                    "MBC6 flash commands are not emulated".to_string()
                });
            }
            0x2000..=0x27FF => self.rom_bank[0] = val & 0x7F,
            0x2800..=0x2FFF => self.flash_mapped[0] = val == 0x08,
            0x3000..=0x37FF => self.rom_bank[1] = val & 0x7F,
            0x3800..=0x3FFF => self.flash_mapped[1] = val == 0x08,
            0xA000..=0xAFFF if self.ram_enable => mem.write_ram(self.ram_offset(0, addr), val),
            0xB000..=0xBFFF if self.ram_enable => mem.write_ram(self.ram_offset(1, addr), val),
            _ => {}
        }
    }

    /// Reported in 16 KiB units for the lower window.
    fn rom_bank(&self) -> usize {
        usize::from(self.rom_bank[0]) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_bank_independently() {
        let mut rom = vec![0; 0x20000];
        rom[5 * ROM_HALF_BANK] = 0x55;
        rom[9 * ROM_HALF_BANK] = 0x99;
        let mut mem = CartridgeMemory::new(rom, 0x8000);
        let mut mbc = Mbc6::new();
        mbc.write(&mut mem, 0x2000, 5);
        mbc.write(&mut mem, 0x3000, 9);
        assert_eq!(mbc.read(&mem, 0x4000), 0x55);
        assert_eq!(mbc.read(&mem, 0x6000), 0x99);
        mbc.write(&mut mem, 0x2800, 0x08);
        assert_eq!(mbc.read(&mem, 0x4000), 0xFF);
    }

    #[test]
    fn ram_windows_use_4k_banks() {
        let mut mem = CartridgeMemory::new(vec![0; 0x8000], 0x8000);
        let mut mbc = Mbc6::new();
        mbc.write(&mut mem, 0x0000, 0x0A);
        mbc.write(&mut mem, 0x0800, 3);
        mbc.write(&mut mem, 0xB010, 0xAB);
        assert_eq!(mem.ram()[3 * RAM_HALF_BANK + 0x10], 0xAB);
    }
}
