use super::{CartridgeMemory, Mapper, MapperKind, RAM_BANK_SIZE};

/// MBC5. Rumble carts wire RAM-bank bit 3 to the motor instead of the RAM.
pub(super) struct Mbc5 {
    rom_bank: u16,
    ram_bank: u8,
    ram_enable: bool,
    rumble: Option<bool>,
}

impl Mbc5 {
    pub(super) fn new(rumble: bool) -> Self {
        Self {
            rom_bank: 1,
            ram_bank: 0,
            ram_enable: false,
            rumble: rumble.then_some(false),
        }
    }

    fn ram_offset(&self, addr: u16) -> usize {
        usize::from(self.ram_bank) * RAM_BANK_SIZE + usize::from(addr - 0xA000)
    }
}

impl Mapper for Mbc5 {
    fn kind(&self) -> MapperKind {
        if self.rumble.is_some() {
            MapperKind::Mbc5Rumble
        } else {
            MapperKind::Mbc5
        }
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(0, addr),
            // Bank 0 is selectable at 0x4000 on MBC5.
            0x4000..=0x7FFF => mem.rom_byte(self.rom_bank(), addr),
            0xA000..=0xBFFF if self.ram_enable => mem.ram_byte(self.ram_offset(addr)),
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = val & 0x0F == 0x0A,
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | u16::from(val),
            0x3000..=0x3FFF => self.rom_bank = (self.rom_bank & 0xFF) | (u16::from(val & 0x01) << 8),
            0x4000..=0x5FFF => match self.rumble.as_mut() {
                Some(motor) => {
                    *motor = val & 0x08 != 0;
                    self.ram_bank = val & 0x07;
                }
                None => self.ram_bank = val & 0x0F,
            },
            0xA000..=0xBFFF if self.ram_enable => mem.write_ram(self.ram_offset(addr), val),
            _ => {}
        }
    }

    fn rom_bank(&self) -> usize {
        usize::from(self.rom_bank)
    }

    fn rumble_active(&self) -> bool {
        self.rumble.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::ROM_BANK_SIZE;

    #[test]
    fn nine_bit_rom_bank() {
        let mut rom = vec![0; 512 * ROM_BANK_SIZE];
        rom[0x100 * ROM_BANK_SIZE] = 0x42;
        let mut mem = CartridgeMemory::new(rom, 0);
        let mut mbc = Mbc5::new(false);
        mbc.write(&mut mem, 0x2000, 0x00);
        mbc.write(&mut mem, 0x3000, 0x01);
        assert_eq!(mbc.rom_bank(), 0x100);
        assert_eq!(mbc.read(&mem, 0x4000), 0x42);
        mbc.write(&mut mem, 0x3000, 0x00);
        assert_eq!(mbc.rom_bank(), 0);
    }

    #[test]
    fn rumble_bit_does_not_select_ram() {
        let mut mem = CartridgeMemory::new(vec![0; 0x8000], 0x20000);
        let mut mbc = Mbc5::new(true);
        mbc.write(&mut mem, 0x0000, 0x0A);
        mbc.write(&mut mem, 0x4000, 0x09);
        assert!(mbc.rumble_active());
        mbc.write(&mut mem, 0xA000, 0x77);
        assert_eq!(mem.ram()[RAM_BANK_SIZE], 0x77);
        mbc.write(&mut mem, 0x4000, 0x01);
        assert!(!mbc.rumble_active());
    }
}
