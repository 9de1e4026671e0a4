use crate::GameBoy;
use crate::cartridge::Cartridge;
use crate::clock::{CLOCKS_NEVER, ClockCounter, Reconcile};
use crate::mmu::Memory;
use crate::ppu::{MODE_HBLANK, Ppu};

#[cfg(feature = "dma-trace")]
macro_rules! dma_trace {
    ($($arg:tt)*) => {
        log::trace!(target: "dma", $($arg)*);
    };
}
#[cfg(not(feature = "dma-trace"))]
macro_rules! dma_trace {
    ($($arg:tt)*) => {};
}

pub const OAM_DMA_BYTES: usize = 0xA0;
/// Clocks between the DMA register write and the first byte.
const OAM_DMA_START_DELAY: i32 = 4;
const OAM_DMA_CLOCKS_PER_BYTE: i32 = 4;
/// Total OAM DMA duration: 160 bytes at 4 clocks each plus the start delay.
pub const OAM_DMA_CLOCKS: i32 = OAM_DMA_BYTES as i32 * OAM_DMA_CLOCKS_PER_BYTE + OAM_DMA_START_DELAY;

const HDMA_BLOCK_BYTES: u16 = 0x10;
/// Clocks a 16-byte block keeps the CPU off the bus at normal speed.
const HDMA_BLOCK_CLOCKS: i32 = 32;
/// Setup time of a general-purpose transfer before its first block.
const GDMA_PREPARATION_CLOCKS: i32 = 4;

/// Memory a DMA engine reads from and writes to.
pub struct DmaBus<'a> {
    pub ppu: &'a mut Ppu,
    pub mem: &'a mut Memory,
    pub cart: &'a mut Cartridge,
    pub double_speed: bool,
}

impl DmaBus<'_> {
    /// Source read as the OAM DMA sees the bus: everything from 0xE000 up
    /// mirrors work RAM.
    fn read_oam_source(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cart.read(addr),
            0x8000..=0x9FFF => self.ppu.vram[self.ppu.vram_bank][usize::from(addr - 0x8000)],
            0xC000..=0xDFFF => self.mem.read_wram(addr),
            _ => self.mem.read_wram(addr - 0x2000),
        }
    }

    /// Source read for GDMA/HDMA. VRAM and the upper region are not valid
    /// sources and read back as open bus.
    fn read_hdma_source(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cart.read(addr),
            0xC000..=0xDFFF => self.mem.read_wram(addr),
            _ => 0xFF,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct OamDma {
    active: bool,
    source: u16,
    elapsed: i32,
    copied: usize,
}

impl OamDma {
    fn bytes_due(&self) -> usize {
        let due = (self.elapsed - OAM_DMA_START_DELAY) / OAM_DMA_CLOCKS_PER_BYTE;
        due.clamp(0, OAM_DMA_BYTES as i32) as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HdmaMode {
    #[default]
    None,
    General,
    HBlank,
}

#[derive(Debug, Clone)]
struct Hdma {
    mode: HdmaMode,
    source: u16,
    dest: u16,
    remaining: u16,
    preparation_clocks: i32,
    /// CPU clocks still owed to the block that was just copied.
    copy_clocks: i32,
    last_ly: Option<u8>,
    cancelled: bool,
}

impl Default for Hdma {
    fn default() -> Self {
        Self {
            mode: HdmaMode::None,
            source: 0,
            dest: 0x8000,
            remaining: 0,
            preparation_clocks: 0,
            copy_clocks: 0,
            last_ly: None,
            cancelled: false,
        }
    }
}

/// OAM DMA and the CGB VRAM DMA engines.
#[derive(Debug, Clone, Default)]
pub struct Dma {
    clock: ClockCounter,
    oam: OamDma,
    /// Last value written to 0xFF46.
    oam_register: u8,
    hdma: Hdma,
    /// CPU clocks until the next HBlank, sampled at the last reconcile.
    clocks_to_hblank: i32,
}

impl Dma {
    pub fn new() -> Self {
        Self {
            oam_register: 0xFF,
            clocks_to_hblank: CLOCKS_NEVER,
            ..Self::default()
        }
    }

    fn block_clocks(double_speed: bool) -> i32 {
        HDMA_BLOCK_CLOCKS << u32::from(double_speed)
    }

    #[inline]
    pub fn oam_active(&self) -> bool {
        self.oam.active
    }

    /// OAM is owned by the DMA once the first byte is due.
    pub fn oam_blocked(&self) -> bool {
        self.oam.active && self.oam.elapsed >= OAM_DMA_START_DELAY
    }

    pub fn hdma_mode(&self) -> HdmaMode {
        self.hdma.mode
    }

    /// The CPU may not fetch while a general transfer runs or an HBlank
    /// block is being copied.
    pub fn cpu_blocked(&self) -> bool {
        self.hdma.mode == HdmaMode::General || self.hdma.copy_clocks > 0
    }

    pub fn read_oam_register(&self) -> u8 {
        self.oam_register
    }

    /// Start (or restart) an OAM DMA from `value << 8`. The caller
    /// reconciles first.
    pub fn start_oam(&mut self, value: u8) {
        self.oam_register = value;
        self.oam = OamDma {
            active: true,
            source: u16::from(value) << 8,
            elapsed: 0,
            copied: 0,
        };
        dma_trace!("OAM DMA start src={:04X}", self.oam.source);
    }

    pub fn read_hdma_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF55 => {
                let blocks = (self.hdma.remaining / HDMA_BLOCK_BYTES) as u8;
                match self.hdma.mode {
                    HdmaMode::None if self.hdma.cancelled => 0x80 | blocks.wrapping_sub(1),
                    HdmaMode::None => 0xFF,
                    _ => blocks.wrapping_sub(1) & 0x7F,
                }
            }
            _ => 0xFF,
        }
    }

    /// HDMA1-HDMA5 write. The caller reconciles first; starting a transfer
    /// with the LCD off copies one block right away through `bus`.
    pub fn write_hdma_reg(&mut self, addr: u16, val: u8, bus: &mut DmaBus<'_>) {
        match addr {
            0xFF51 => self.hdma.source = (self.hdma.source & 0x00FF) | (u16::from(val) << 8),
            0xFF52 => self.hdma.source = (self.hdma.source & 0xFF00) | u16::from(val & 0xF0),
            0xFF53 => {
                self.hdma.dest = 0x8000 | (self.hdma.dest & 0x00F0) | (u16::from(val & 0x1F) << 8)
            }
            0xFF54 => self.hdma.dest = (self.hdma.dest & 0xFF00) | u16::from(val & 0xF0),
            0xFF55 => {
                if self.hdma.mode == HdmaMode::HBlank && val & 0x80 == 0 {
                    self.hdma.mode = HdmaMode::None;
                    self.hdma.cancelled = true;
                    dma_trace!("HDMA cancelled, {} bytes left", self.hdma.remaining);
                    return;
                }
                self.hdma.remaining = (u16::from(val & 0x7F) + 1) * HDMA_BLOCK_BYTES;
                self.hdma.cancelled = false;
                if val & 0x80 == 0 {
                    self.hdma.mode = HdmaMode::General;
                    self.hdma.preparation_clocks = GDMA_PREPARATION_CLOCKS;
                    dma_trace!("GDMA start {} bytes", self.hdma.remaining);
                } else {
                    self.hdma.mode = HdmaMode::HBlank;
                    self.hdma.last_ly = None;
                    dma_trace!("HDMA start {} bytes", self.hdma.remaining);
                    if !bus.ppu.lcd_enabled() {
                        self.copy_block(bus);
                        self.hdma.copy_clocks = Self::block_clocks(bus.double_speed);
                    }
                }
            }
            _ => {}
        }
    }

    fn copy_block(&mut self, bus: &mut DmaBus<'_>) {
        for _ in 0..HDMA_BLOCK_BYTES {
            let byte = bus.read_hdma_source(self.hdma.source);
            let bank = bus.ppu.vram_bank;
            bus.ppu.vram[bank][usize::from(self.hdma.dest & 0x1FFF)] = byte;
            self.hdma.source = self.hdma.source.wrapping_add(1);
            self.hdma.dest = self.hdma.dest.wrapping_add(1);
        }
        self.hdma.remaining -= HDMA_BLOCK_BYTES;
        // The destination stops at the end of VRAM.
        if self.hdma.dest > 0x9FFF {
            self.hdma.dest = 0x8000;
            self.hdma.remaining = 0;
        }
        if self.hdma.remaining == 0 {
            self.hdma.mode = HdmaMode::None;
        }
    }

    fn catch_up_oam(&mut self, delta: i32, bus: &mut DmaBus<'_>) {
        if !self.oam.active {
            return;
        }
        self.oam.elapsed += delta;
        let due = self.oam.bytes_due();
        while self.oam.copied < due {
            let offset = self.oam.copied;
            let byte = bus.read_oam_source(self.oam.source.wrapping_add(offset as u16));
            bus.ppu.oam[offset] = byte;
            self.oam.copied += 1;
        }
        if self.oam.elapsed >= OAM_DMA_CLOCKS {
            self.oam.active = false;
        }
    }

    fn catch_up_hblank(&mut self, bus: &mut DmaBus<'_>) {
        if self.hdma.mode != HdmaMode::HBlank || self.hdma.copy_clocks > 0 {
            return;
        }
        let ppu = &*bus.ppu;
        if !ppu.lcd_enabled() || ppu.mode() != MODE_HBLANK || ppu.ly() >= 144 {
            return;
        }
        let ly = ppu.ly();
        if self.hdma.last_ly == Some(ly) {
            return;
        }
        self.hdma.last_ly = Some(ly);
        self.copy_block(bus);
        self.hdma.copy_clocks = Self::block_clocks(bus.double_speed);
        dma_trace!("HDMA block on LY {}, {} bytes left", ly, self.hdma.remaining);
    }

    /// Run stalled-CPU DMA work for at most `budget` clocks. Returns the
    /// clocks consumed.
    fn execute(&mut self, budget: i32, bus: &mut DmaBus<'_>) -> i32 {
        let mut spent = 0;
        if self.hdma.copy_clocks > 0 {
            let step = self.hdma.copy_clocks.min(budget);
            self.hdma.copy_clocks -= step;
            spent += step;
        }
        if self.hdma.mode == HdmaMode::General {
            if self.hdma.preparation_clocks > 0 {
                let step = self.hdma.preparation_clocks.min(budget - spent);
                self.hdma.preparation_clocks -= step;
                spent += step;
            }
            let block = Self::block_clocks(bus.double_speed);
            while self.hdma.mode == HdmaMode::General
                && self.hdma.preparation_clocks == 0
                && spent < budget
            {
                self.copy_block(bus);
                spent += block;
            }
        }
        spent
    }

    #[inline]
    pub fn clocks_to_next_event(&self) -> i32 {
        let mut next = CLOCKS_NEVER;
        if self.oam.active {
            next = next.min(OAM_DMA_CLOCKS - self.oam.elapsed);
        }
        if self.cpu_blocked() {
            next = next.min(self.hdma.copy_clocks.max(self.hdma.preparation_clocks).max(1));
        } else if self.hdma.mode == HdmaMode::HBlank {
            next = next.min(self.clocks_to_hblank);
        }
        next
    }
}

impl<'a> Reconcile<DmaBus<'a>> for Dma {
    fn reset(&mut self) {
        *self = Self::new();
    }

    /// The PPU in `bus` must already be reconciled to `reference`.
    fn update_clocks_counter_reference(&mut self, reference: i32, bus: &mut DmaBus<'a>) {
        let delta = self.clock.advance_to(reference);
        self.catch_up_oam(delta, bus);
        self.catch_up_hblank(bus);
        self.clocks_to_hblank = bus.ppu.clocks_to_next_hblank();
    }

    fn clocks_to_next_event(&self) -> i32 {
        Dma::clocks_to_next_event(self)
    }

    fn clock_counter(&self) -> i32 {
        self.clock.get()
    }

    fn clock_counter_reset(&mut self) {
        self.clock.reset();
    }
}

impl GameBoy {
    pub(crate) fn dma_bus(&mut self) -> (&mut Dma, DmaBus<'_>) {
        (
            &mut self.dma,
            DmaBus {
                ppu: &mut self.ppu,
                mem: &mut self.mem,
                cart: &mut self.cart,
                double_speed: self.double_speed,
            },
        )
    }

    /// Bring the PPU and then the DMA engines up to the CPU clock.
    pub fn sync_dma(&mut self) {
        self.sync_ppu();
        let now = self.cpu.clocks();
        let (dma, mut bus) = self.dma_bus();
        dma.update_clocks_counter_reference(now, &mut bus);
    }

    /// Run DMA work that holds the CPU off the bus, for up to `budget`
    /// clocks, advancing the CPU clock by the clocks consumed.
    ///
    /// This is the one synchronous DMA path: the caller must not execute
    /// instructions until `dma.cpu_blocked()` clears.
    pub fn dma_execute(&mut self, budget: i32) -> i32 {
        self.sync_dma();
        let (dma, mut bus) = self.dma_bus();
        let spent = dma.execute(budget.max(1), &mut bus);
        self.cpu.add_clocks(spent);
        spent
    }
}
