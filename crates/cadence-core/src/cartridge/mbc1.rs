use super::{CartridgeMemory, Mapper, MapperKind, RAM_BANK_SIZE, ROM_BANK_SIZE};

/// MBC1, including the 8 Mbit multicart wiring where the upper bank bits
/// shift in at bit 4 instead of bit 5.
pub(super) struct Mbc1 {
    rom_bank: u8,
    /// Dual-purpose 2-bit register: RAM bank or upper ROM bank bits.
    upper: u8,
    advanced_mode: bool,
    ram_enable: bool,
    multicart: bool,
}

impl Mbc1 {
    pub(super) fn new(multicart: bool) -> Self {
        Self {
            rom_bank: 1,
            upper: 0,
            advanced_mode: false,
            ram_enable: false,
            multicart,
        }
    }

    fn upper_shift(&self) -> u32 {
        if self.multicart { 4 } else { 5 }
    }

    fn low_bank(&self) -> usize {
        let raw = usize::from(self.rom_bank & 0x1F);
        // Bank 0 is decoded on all five bits, even when only four are wired.
        let raw = if raw == 0 { 1 } else { raw };
        if self.multicart { raw & 0x0F } else { raw }
    }

    fn bank0(&self) -> usize {
        if self.advanced_mode {
            usize::from(self.upper) << self.upper_shift()
        } else {
            0
        }
    }

    fn ram_offset(&self, addr: u16) -> usize {
        let bank = if self.advanced_mode { usize::from(self.upper) } else { 0 };
        bank * RAM_BANK_SIZE + usize::from(addr - 0xA000)
    }
}

/// Multicart dumps repeat the boot logo at the start of several 256 KiB
/// games. Only the common 64-bank layout is recognised.
pub(super) fn is_multicart(rom: &[u8]) -> bool {
    if rom.len() / ROM_BANK_SIZE != 64 {
        return false;
    }
    let logo = match rom.get(0x0104..0x0134) {
        Some(s) if s.iter().any(|&b| b != 0) => s,
        _ => return false,
    };
    (1..=2).all(|game| {
        let start = game * 0x10 * ROM_BANK_SIZE + 0x0104;
        rom.get(start..start + logo.len()) == Some(logo)
    })
}

impl Mapper for Mbc1 {
    fn kind(&self) -> MapperKind {
        if self.multicart {
            MapperKind::Mbc1Multicart
        } else {
            MapperKind::Mbc1
        }
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(self.bank0(), addr),
            0x4000..=0x7FFF => mem.rom_byte(self.rom_bank(), addr),
            0xA000..=0xBFFF if self.ram_enable => mem.ram_byte(self.ram_offset(addr)),
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = val & 0x1F,
            0x4000..=0x5FFF => self.upper = val & 0x03,
            0x6000..=0x7FFF => self.advanced_mode = val & 0x01 != 0,
            0xA000..=0xBFFF if self.ram_enable => mem.write_ram(self.ram_offset(addr), val),
            _ => {}
        }
    }

    fn rom_bank(&self) -> usize {
        (usize::from(self.upper) << self.upper_shift()) | self.low_bank()
    }
}
