use super::{CartridgeMemory, Mapper, MapperKind};

/// MBC2 with its built-in 512 x 4-bit RAM.
pub(super) struct Mbc2 {
    rom_bank: u8,
    ram_enable: bool,
}

impl Mbc2 {
    pub(super) fn new() -> Self {
        Self {
            rom_bank: 1,
            ram_enable: false,
        }
    }
}

impl Mapper for Mbc2 {
    fn kind(&self) -> MapperKind {
        MapperKind::Mbc2
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(0, addr),
            0x4000..=0x7FFF => mem.rom_byte(self.rom_bank(), addr),
            // Only the low nibble is wired; the RAM mirrors every 512 bytes.
            0xA000..=0xBFFF if self.ram_enable => {
                0xF0 | (mem.ram_byte(usize::from(addr & 0x01FF)) & 0x0F)
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            // Address bit 8 selects between RAM enable and ROM bank.
            0x0000..=0x3FFF if addr & 0x0100 == 0 => self.ram_enable = val & 0x0F == 0x0A,
            0x0000..=0x3FFF => {
                self.rom_bank = val & 0x0F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0xA000..=0xBFFF if self.ram_enable => {
                mem.write_ram(usize::from(addr & 0x01FF), val & 0x0F)
            }
            _ => {}
        }
    }

    fn rom_bank(&self) -> usize {
        usize::from(self.rom_bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_is_four_bits_and_mirrored() {
        let mut mem = CartridgeMemory::new(vec![0; 0x10000], 0x200);
        let mut mbc = Mbc2::new();
        mbc.write(&mut mem, 0x0000, 0x0A);
        mbc.write(&mut mem, 0xA005, 0xAB);
        assert_eq!(mbc.read(&mem, 0xA005), 0xFB);
        assert_eq!(mbc.read(&mem, 0xA205), 0xFB);
        assert_eq!(mbc.read(&mem, 0xBE05), 0xFB);
    }

    #[test]
    fn bit8_selects_rom_bank_register() {
        let mut mem = CartridgeMemory::new(vec![0; 0x10000], 0x200);
        let mut mbc = Mbc2::new();
        mbc.write(&mut mem, 0x2000, 0x03);
        assert_eq!(mbc.rom_bank(), 1);
        mbc.write(&mut mem, 0x2100, 0x03);
        assert_eq!(mbc.rom_bank(), 3);
        mbc.write(&mut mem, 0x0100, 0x00);
        assert_eq!(mbc.rom_bank(), 1);
    }
}
