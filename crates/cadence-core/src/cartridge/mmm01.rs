use super::{CartridgeMemory, Mapper, MapperKind, RAM_BANK_SIZE, ROM_BANK_SIZE};

/// MMM01 multi-game mapper.
///
/// From reset the last 32 KiB of the image are visible so the menu can run.
/// The menu picks a base bank and locks it; from then on the chip banks
/// like an MBC1 relative to that base.
pub(super) struct Mmm01 {
    mapped: bool,
    base_bank: usize,
    rom_bank: u8,
    ram_bank: u8,
    ram_enable: bool,
    menu_bank: usize,
}

impl Mmm01 {
    pub(super) fn new(mem: &CartridgeMemory) -> Self {
        Self {
            mapped: false,
            base_bank: 0,
            rom_bank: 1,
            ram_bank: 0,
            ram_enable: false,
            menu_bank: mem.rom_len().saturating_sub(0x8000) / ROM_BANK_SIZE,
        }
    }

    fn ram_offset(&self, addr: u16) -> usize {
        usize::from(self.ram_bank) * RAM_BANK_SIZE + usize::from(addr - 0xA000)
    }
}

impl Mapper for Mmm01 {
    fn kind(&self) -> MapperKind {
        MapperKind::Mmm01
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF if !self.mapped => mem.rom_byte(self.menu_bank, addr),
            0x4000..=0x7FFF if !self.mapped => mem.rom_byte(self.menu_bank + 1, addr),
            0x0000..=0x3FFF => mem.rom_byte(self.base_bank, addr),
            0x4000..=0x7FFF => mem.rom_byte(self.rom_bank(), addr),
            0xA000..=0xBFFF if self.ram_enable => mem.ram_byte(self.ram_offset(addr)),
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => {
                self.ram_enable = val & 0x0F == 0x0A;
                if !self.mapped && val & 0x40 != 0 {
                    self.mapped = true;
                    log::debug!(target: "bus", "MMM01 locked at base bank {}", self.base_bank);
                }
            }
            0x2000..=0x3FFF if !self.mapped => self.base_bank = usize::from(val & 0x7F),
            0x2000..=0x3FFF => {
                self.rom_bank = val & 0x1F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0x4000..=0x5FFF => self.ram_bank = val & 0x03,
            0xA000..=0xBFFF if self.ram_enable => mem.write_ram(self.ram_offset(addr), val),
            _ => {}
        }
    }

    fn rom_bank(&self) -> usize {
        if self.mapped {
            self.base_bank + usize::from(self.rom_bank)
        } else {
            self.menu_bank + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> CartridgeMemory {
        let mut rom = vec![0; 16 * ROM_BANK_SIZE];
        for bank in 0..16 {
            rom[bank * ROM_BANK_SIZE] = bank as u8;
        }
        CartridgeMemory::new(rom, 0x2000)
    }

    #[test]
    fn starts_on_last_32k() {
        let mem = memory();
        let mut mbc = Mmm01::new(&mem);
        assert_eq!(mbc.read(&mem, 0x0000), 14);
        assert_eq!(mbc.read(&mem, 0x4000), 15);
    }

    #[test]
    fn base_bank_locks_on_map() {
        let mut mem = memory();
        let mut mbc = Mmm01::new(&mem);
        mbc.write(&mut mem, 0x2000, 4);
        mbc.write(&mut mem, 0x0000, 0x40);
        assert_eq!(mbc.read(&mem, 0x0000), 4);
        assert_eq!(mbc.read(&mem, 0x4000), 5);
        mbc.write(&mut mem, 0x2000, 2);
        assert_eq!(mbc.read(&mem, 0x4000), 6);
        assert_eq!(mbc.read(&mem, 0x0000), 4);
    }
}
