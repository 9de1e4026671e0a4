use crate::GameBoy;

pub const WRAM_BANK_SIZE: usize = 0x1000;
const HRAM_SIZE: usize = 0x7F;
const IO_SIZE: usize = 0x80;

/// Work RAM, high RAM, the I/O shadow and the boot ROM image.
///
/// Video memory and OAM live in the PPU; cartridge ROM/RAM in the cartridge.
pub struct Memory {
    pub wram: [[u8; WRAM_BANK_SIZE]; 8],
    pub wram_bank: usize,
    pub hram: [u8; HRAM_SIZE],
    /// Last value written to each I/O port, for registers without dedicated
    /// state.
    pub io: [u8; IO_SIZE],
    boot_rom: Option<Vec<u8>>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            wram: [[0; WRAM_BANK_SIZE]; 8],
            wram_bank: 1,
            hram: [0; HRAM_SIZE],
            io: [0xFF; IO_SIZE],
            boot_rom: None,
        }
    }

    pub fn set_boot_rom(&mut self, data: Option<Vec<u8>>) {
        self.boot_rom = data;
    }

    pub fn has_boot_rom(&self) -> bool {
        self.boot_rom.is_some()
    }

    pub fn take_boot_rom(&mut self) -> Option<Vec<u8>> {
        self.boot_rom.take()
    }

    fn boot_byte(&self, addr: u16) -> Option<u8> {
        self.boot_rom
            .as_ref()
            .and_then(|rom| rom.get(usize::from(addr)).copied())
    }

    /// 0xC000-0xDFFF, with the upper 4 KiB following SVBK.
    #[inline]
    pub fn read_wram(&self, addr: u16) -> u8 {
        let offset = usize::from(addr & 0x0FFF);
        if addr & 0x1000 == 0 {
            self.wram[0][offset]
        } else {
            self.wram[self.wram_bank][offset]
        }
    }

    #[inline]
    pub fn write_wram(&mut self, addr: u16, val: u8) {
        let offset = usize::from(addr & 0x0FFF);
        if addr & 0x1000 == 0 {
            self.wram[0][offset] = val;
        } else {
            self.wram[self.wram_bank][offset] = val;
        }
    }
}

/// Bus handler set for one hardware family and boot ROM state.
pub struct BusTable {
    pub name: &'static str,
    pub read8: fn(&mut GameBoy, u16) -> u8,
    pub write8: fn(&mut GameBoy, u16, u8),
    pub read_reg8: fn(&mut GameBoy, u16) -> u8,
    pub write_reg8: fn(&mut GameBoy, u16, u8),
}

/// The four dispatch configurations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusMap {
    DmgBoot,
    Dmg,
    CgbBoot,
    Cgb,
}

impl BusMap {
    pub fn select(cgb: bool, boot_rom_mapped: bool) -> Self {
        match (cgb, boot_rom_mapped) {
            (false, true) => BusMap::DmgBoot,
            (false, false) => BusMap::Dmg,
            (true, true) => BusMap::CgbBoot,
            (true, false) => BusMap::Cgb,
        }
    }

    pub fn boot_rom_mapped(self) -> bool {
        matches!(self, BusMap::DmgBoot | BusMap::CgbBoot)
    }

    pub fn table(self) -> &'static BusTable {
        match self {
            BusMap::DmgBoot => &DMG_BOOT_TABLE,
            BusMap::Dmg => &DMG_TABLE,
            BusMap::CgbBoot => &CGB_BOOT_TABLE,
            BusMap::Cgb => &CGB_TABLE,
        }
    }
}

macro_rules! bus_table {
    ($name:ident, $label:literal, $cgb:literal, $boot:literal) => {
        static $name: BusTable = BusTable {
            name: $label,
            read8: read8::<$cgb, $boot>,
            write8: write8::<$cgb>,
            read_reg8: crate::io::read_reg8::<$cgb>,
            write_reg8: crate::io::write_reg8::<$cgb, $boot>,
        };
    };
}

bus_table!(DMG_BOOT_TABLE, "dmg-boot", false, true);
bus_table!(DMG_TABLE, "dmg", false, false);
bus_table!(CGB_BOOT_TABLE, "cgb-boot", true, true);
bus_table!(CGB_TABLE, "cgb", true, false);

fn read8<const CGB: bool, const BOOT: bool>(gb: &mut GameBoy, addr: u16) -> u8 {
    match addr {
        0x0000..=0x00FF if BOOT => match gb.mem.boot_byte(addr) {
            Some(byte) => byte,
            None => gb.cart_read(addr),
        },
        0x0200..=0x08FF if BOOT && CGB => match gb.mem.boot_byte(addr) {
            Some(byte) => byte,
            None => gb.cart_read(addr),
        },
        0x0000..=0x7FFF | 0xA000..=0xBFFF => gb.cart_read(addr),
        0x8000..=0x9FFF => {
            if gb.strict_vram_checks {
                gb.sync_ppu();
                if !gb.ppu.vram_accessible() {
                    return 0xFF;
                }
            }
            let bank = if CGB { gb.ppu.vram_bank } else { 0 };
            gb.ppu.vram[bank][usize::from(addr - 0x8000)]
        }
        0xC000..=0xDFFF => gb.mem.read_wram(addr),
        0xE000..=0xFDFF => gb.mem.read_wram(addr - 0x2000),
        0xFE00..=0xFE9F => {
            gb.sync_dma();
            if gb.dma.oam_blocked() || !gb.ppu.oam_accessible() {
                return 0xFF;
            }
            gb.ppu.oam[usize::from(addr - 0xFE00)]
        }
        0xFEA0..=0xFEFF => 0x00,
        0xFF00..=0xFF7F | 0xFFFF => crate::io::read_reg8::<CGB>(gb, addr),
        0xFF80..=0xFFFE => gb.mem.hram[usize::from(addr - 0xFF80)],
    }
}

fn write8<const CGB: bool>(gb: &mut GameBoy, addr: u16, val: u8) {
    if gb.dma.oam_active() && addr < 0xFE00 {
        // The transfer may still be reading from here.
        gb.sync_dma();
    }
    match addr {
        0x0000..=0x7FFF | 0xA000..=0xBFFF => gb.cart_write(addr, val),
        0x8000..=0x9FFF => {
            if gb.strict_vram_checks {
                gb.sync_ppu();
                if !gb.ppu.vram_accessible() {
                    return;
                }
            }
            let bank = if CGB { gb.ppu.vram_bank } else { 0 };
            gb.ppu.vram[bank][usize::from(addr - 0x8000)] = val;
        }
        0xC000..=0xDFFF => gb.mem.write_wram(addr, val),
        0xE000..=0xFDFF => gb.mem.write_wram(addr - 0x2000, val),
        0xFE00..=0xFE9F => {
            gb.sync_dma();
            if gb.dma.oam_blocked() || !gb.ppu.oam_accessible() {
                return;
            }
            gb.ppu.oam[usize::from(addr - 0xFE00)] = val;
        }
        0xFEA0..=0xFEFF => {}
        0xFF00..=0xFF7F | 0xFFFF => (gb.bus.write_reg8)(gb, addr, val),
        0xFF80..=0xFFFE => gb.mem.hram[usize::from(addr - 0xFF80)] = val,
    }
}

impl GameBoy {
    /// CPU read through the bound dispatch table.
    #[inline]
    pub fn read8(&mut self, addr: u16) -> u8 {
        (self.bus.read8)(self, addr)
    }

    #[inline]
    pub fn write8(&mut self, addr: u16, val: u8) {
        (self.bus.write8)(self, addr, val)
    }

    /// I/O read for 0xFF00 | `addr` fast paths.
    #[inline]
    pub fn read_reg8(&mut self, addr: u16) -> u8 {
        (self.bus.read_reg8)(self, addr)
    }

    #[inline]
    pub fn write_reg8(&mut self, addr: u16, val: u8) {
        (self.bus.write_reg8)(self, addr, val)
    }

    pub fn bus_map(&self) -> BusMap {
        self.bus_map
    }

    /// Rebind the dispatch table. Called at power-on and when the boot ROM
    /// is unmapped.
    pub(crate) fn select_bus(&mut self, boot_rom_mapped: bool) {
        self.bus_map = BusMap::select(self.hardware.is_cgb_family(), boot_rom_mapped);
        self.bus = self.bus_map.table();
        log::debug!(target: "bus", "dispatch table {}", self.bus.name);
    }

    pub(crate) fn cart_read(&mut self, addr: u16) -> u8 {
        if self.cart.is_clocked() {
            self.sync_cart();
        }
        self.cart.read(addr)
    }

    pub(crate) fn cart_write(&mut self, addr: u16, val: u8) {
        if self.cart.is_clocked() {
            self.sync_cart();
        }
        self.cart.write(addr, val);
    }
}
