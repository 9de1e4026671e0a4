use crate::clock::{CLOCKS_NEVER, ClockCounter, Reconcile};
use crate::interrupts::{INT_STAT, INT_VBLANK, Interrupts};

// Line timing in dots. One dot is one CPU clock at normal speed and two in
// double speed.
const LINE_DOTS: i32 = 456;
const OAM_SCAN_DOTS: i32 = 80;
const TRANSFER_DOTS: i32 = 172;
const LINES_PER_FRAME: u8 = 154;
const VBLANK_FIRST_LINE: u8 = 144;
const LAST_LINE: u8 = 153;
/// Dots into line 153 after which LY already reads 0.
const LAST_LINE_LY_DOTS: i32 = 4;

const VRAM_BANK_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;
const PAL_RAM_SIZE: usize = 0x40;
const PAL_INDEX_MASK: u8 = 0x3F;
const PAL_UNUSED_BIT: u8 = 0x40;
const PAL_AUTO_INCREMENT_BIT: u8 = 0x80;

// LCD modes as reported in STAT bits 0-1
pub const MODE_HBLANK: u8 = 0;
pub const MODE_VBLANK: u8 = 1;
pub const MODE_OAM: u8 = 2;
pub const MODE_TRANSFER: u8 = 3;

const LCDC_ENABLE: u8 = 0x80;
const STAT_HBLANK_IRQ: u8 = 0x08;
const STAT_VBLANK_IRQ: u8 = 0x10;
const STAT_OAM_IRQ: u8 = 0x20;
const STAT_LYC_IRQ: u8 = 0x40;

/// Which rendering rules apply to the current machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Dmg,
    Cgb,
    /// CGB hardware running a DMG cartridge with boot-ROM-assigned palettes.
    CgbDmgCompat,
}

/// LCD registers as seen by a renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LcdRegisters {
    pub lcdc: u8,
    pub scy: u8,
    pub scx: u8,
    pub lyc: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,
    pub wy: u8,
    pub wx: u8,
    pub opri: u8,
}

/// Borrowed video memory handed to the renderer for one scanline.
pub struct VideoState<'a> {
    pub vram: &'a [[u8; VRAM_BANK_SIZE]; 2],
    pub oam: &'a [u8; OAM_SIZE],
    pub regs: &'a LcdRegisters,
    pub bg_palette_ram: &'a [u8; PAL_RAM_SIZE],
    pub obj_palette_ram: &'a [u8; PAL_RAM_SIZE],
}

/// Pixel pipeline collaborator, called when a line leaves mode 3.
pub trait ScanlineRenderer: Send {
    fn draw_scanline(&mut self, line: u8, video: &VideoState<'_>, mode: RenderMode);

    /// Called when line 144 begins. `displayed` is false for the first frame
    /// after the LCD is switched on, which real hardware does not show.
    fn frame_finished(&mut self, _displayed: bool) {}

    fn lcd_disabled(&mut self) {}
}

/// Renderer that discards everything.
#[derive(Default)]
pub struct NullRenderer;

impl ScanlineRenderer for NullRenderer {
    fn draw_scanline(&mut self, _line: u8, _video: &VideoState<'_>, _mode: RenderMode) {}
}

/// PPU mode/line timing, LCD registers and the memory it owns.
pub struct Ppu {
    clock: ClockCounter,
    pub vram: [[u8; VRAM_BANK_SIZE]; 2],
    pub vram_bank: usize,
    pub oam: [u8; OAM_SIZE],

    cgb: bool,
    stat_write_bug: bool,
    render_mode: RenderMode,
    double_speed: bool,

    regs: LcdRegisters,
    stat: u8,
    /// Current line. Differs from the LY register only late on line 153.
    line: u8,
    mode: u8,
    line_dots: i32,
    /// CPU clocks that have not yet made up a whole dot.
    dot_remainder: i32,
    transfer_dots: i32,
    skip_frame: bool,
    stat_irq_line: bool,

    bgpi: u8,
    bgpd: [u8; PAL_RAM_SIZE],
    obpi: u8,
    obpd: [u8; PAL_RAM_SIZE],

    frame_ready: bool,
    frame_counter: u64,
    renderer: Box<dyn ScanlineRenderer + Send>,
}

impl Ppu {
    pub fn new(cgb: bool) -> Self {
        Self {
            clock: ClockCounter::new(),
            vram: [[0; VRAM_BANK_SIZE]; 2],
            vram_bank: 0,
            oam: [0; OAM_SIZE],
            cgb,
            stat_write_bug: !cgb,
            render_mode: if cgb { RenderMode::Cgb } else { RenderMode::Dmg },
            double_speed: false,
            regs: LcdRegisters::default(),
            stat: 0,
            line: 0,
            mode: MODE_HBLANK,
            line_dots: 0,
            dot_remainder: 0,
            transfer_dots: TRANSFER_DOTS,
            skip_frame: false,
            stat_irq_line: false,
            bgpi: PAL_UNUSED_BIT,
            bgpd: [0xFF; PAL_RAM_SIZE],
            obpi: PAL_UNUSED_BIT,
            obpd: [0xFF; PAL_RAM_SIZE],
            frame_ready: false,
            frame_counter: 0,
            renderer: Box::new(NullRenderer),
        }
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn ScanlineRenderer + Send>) {
        self.renderer = renderer;
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub(crate) fn set_stat_write_bug(&mut self, enabled: bool) {
        self.stat_write_bug = enabled;
    }

    /// Post-boot state: LCD on at the start of line 0.
    pub fn apply_boot_state(&mut self, lcdc: u8, bgp: u8) {
        self.regs.lcdc = lcdc;
        self.regs.bgp = bgp;
        self.line = 0;
        self.line_dots = 0;
        self.dot_remainder = 0;
        self.mode = if lcdc & LCDC_ENABLE != 0 { MODE_OAM } else { MODE_HBLANK };
        self.skip_frame = false;
        self.stat_irq_line = false;
    }

    /// Adjust for a CPU speed change. Partial dots are dropped.
    pub fn set_double_speed(&mut self, enabled: bool) {
        self.double_speed = enabled;
        self.dot_remainder = 0;
    }

    #[inline]
    pub fn lcd_enabled(&self) -> bool {
        self.regs.lcdc & LCDC_ENABLE != 0
    }

    #[inline]
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Value of the LY register.
    pub fn ly(&self) -> u8 {
        if !self.lcd_enabled() {
            0
        } else if self.line == LAST_LINE && self.line_dots >= LAST_LINE_LY_DOTS {
            0
        } else {
            self.line
        }
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Returns and clears the VBlank-reached flag.
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    pub fn vram_accessible(&self) -> bool {
        !(self.lcd_enabled() && self.mode == MODE_TRANSFER)
    }

    pub fn oam_accessible(&self) -> bool {
        !(self.lcd_enabled() && matches!(self.mode, MODE_OAM | MODE_TRANSFER))
    }

    fn palette_accessible(&self) -> bool {
        self.vram_accessible()
    }

    #[inline]
    fn dot_shift(&self) -> u32 {
        u32::from(self.double_speed)
    }

    /// Dot at which the current mode (or LY value) ends.
    fn next_boundary(&self) -> i32 {
        if self.line < VBLANK_FIRST_LINE {
            match self.mode {
                MODE_TRANSFER => OAM_SCAN_DOTS + self.transfer_dots,
                MODE_HBLANK if self.line_dots >= OAM_SCAN_DOTS => LINE_DOTS,
                MODE_HBLANK | MODE_OAM => OAM_SCAN_DOTS,
                _ => LINE_DOTS,
            }
        } else if self.line == LAST_LINE && self.line_dots < LAST_LINE_LY_DOTS {
            LAST_LINE_LY_DOTS
        } else {
            LINE_DOTS
        }
    }

    /// CPU clocks until the current line next enters mode 0, or
    /// `CLOCKS_NEVER` outside visible lines or with the LCD off.
    pub fn clocks_to_next_hblank(&self) -> i32 {
        if !self.lcd_enabled() {
            return CLOCKS_NEVER;
        }
        let dots = match self.mode {
            MODE_OAM => OAM_SCAN_DOTS - self.line_dots + TRANSFER_DOTS + i32::from(self.regs.scx & 7),
            MODE_TRANSFER => OAM_SCAN_DOTS + self.transfer_dots - self.line_dots,
            MODE_HBLANK if self.line_dots < OAM_SCAN_DOTS && self.line < VBLANK_FIRST_LINE => {
                OAM_SCAN_DOTS - self.line_dots + TRANSFER_DOTS + i32::from(self.regs.scx & 7)
            }
            _ => return CLOCKS_NEVER,
        };
        (dots << self.dot_shift()) - self.dot_remainder
    }

    fn advance_dots(&mut self, mut dots: i32, irq: &mut Interrupts) {
        while dots > 0 {
            let target = self.next_boundary();
            let step = dots.min(target - self.line_dots);
            self.line_dots += step;
            dots -= step;
            if self.line_dots == target {
                self.enter_next_phase(irq);
            }
        }
    }

    fn enter_next_phase(&mut self, irq: &mut Interrupts) {
        if self.line_dots >= LINE_DOTS {
            self.line_dots = 0;
            self.start_line(self.line + 1, irq);
            return;
        }

        if self.line < VBLANK_FIRST_LINE {
            if self.line_dots == OAM_SCAN_DOTS {
                self.mode = MODE_TRANSFER;
                self.transfer_dots = TRANSFER_DOTS + i32::from(self.regs.scx & 7);
            } else if self.line_dots == OAM_SCAN_DOTS + self.transfer_dots {
                self.mode = MODE_HBLANK;
                if !self.skip_frame {
                    self.draw_line();
                }
            }
        }
        // Line 153's early LY change only affects the comparison.
        self.update_stat_irq(irq, false);
    }

    fn start_line(&mut self, line: u8, irq: &mut Interrupts) {
        self.line = if line >= LINES_PER_FRAME { 0 } else { line };
        if self.line == VBLANK_FIRST_LINE {
            self.mode = MODE_VBLANK;
            irq.request(INT_VBLANK);
            self.frame_ready = true;
            self.frame_counter += 1;
            self.renderer.frame_finished(!self.skip_frame);
            self.skip_frame = false;
            // The OAM condition is still sampled as line 144 starts.
            self.update_stat_irq(irq, true);
            return;
        }
        if self.line < VBLANK_FIRST_LINE {
            self.mode = MODE_OAM;
        }
        self.update_stat_irq(irq, false);
    }

    fn draw_line(&mut self) {
        let video = VideoState {
            vram: &self.vram,
            oam: &self.oam,
            regs: &self.regs,
            bg_palette_ram: &self.bgpd,
            obj_palette_ram: &self.obpd,
        };
        self.renderer.draw_scanline(self.line, &video, self.render_mode);
    }

    fn lyc_match(&self) -> bool {
        self.ly() == self.regs.lyc
    }

    fn stat_condition(&self, oam_at_vblank: bool) -> bool {
        if !self.lcd_enabled() {
            return false;
        }
        let enables = self.stat;
        (enables & STAT_HBLANK_IRQ != 0 && self.mode == MODE_HBLANK)
            || (enables & STAT_VBLANK_IRQ != 0 && self.mode == MODE_VBLANK)
            || (enables & STAT_OAM_IRQ != 0 && (self.mode == MODE_OAM || oam_at_vblank))
            || (enables & STAT_LYC_IRQ != 0 && self.lyc_match())
    }

    /// STAT interrupts fire on rising edges of the OR of all enabled
    /// conditions, so overlapping sources block each other.
    fn update_stat_irq(&mut self, irq: &mut Interrupts, oam_at_vblank: bool) {
        let line = self.stat_condition(oam_at_vblank);
        if line && !self.stat_irq_line {
            irq.request(INT_STAT);
        }
        self.stat_irq_line = self.stat_condition(false);
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.regs.lcdc,
            0xFF41 => {
                let mode = if self.lcd_enabled() { self.mode } else { MODE_HBLANK };
                let coincidence = if self.lcd_enabled() && self.lyc_match() { 0x04 } else { 0 };
                0x80 | (self.stat & 0x78) | coincidence | mode
            }
            0xFF42 => self.regs.scy,
            0xFF43 => self.regs.scx,
            0xFF44 => self.ly(),
            0xFF45 => self.regs.lyc,
            0xFF47 => self.regs.bgp,
            0xFF48 => self.regs.obp0,
            0xFF49 => self.regs.obp1,
            0xFF4A => self.regs.wy,
            0xFF4B => self.regs.wx,
            0xFF4F if self.cgb => 0xFE | self.vram_bank as u8,
            0xFF68 if self.cgb => self.bgpi,
            0xFF69 if self.cgb => {
                if self.palette_accessible() {
                    self.bgpd[Self::palette_ram_index(self.bgpi)]
                } else {
                    0xFF
                }
            }
            0xFF6A if self.cgb => self.obpi,
            0xFF6B if self.cgb => {
                if self.palette_accessible() {
                    self.obpd[Self::palette_ram_index(self.obpi)]
                } else {
                    0xFF
                }
            }
            0xFF6C if self.cgb => self.regs.opri | 0xFE,
            _ => 0xFF,
        }
    }

    /// Register write at the PPU's current clock. The caller reconciles
    /// first.
    pub fn write_reg(&mut self, addr: u16, val: u8, irq: &mut Interrupts) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.regs.lcdc = val;
                let is_on = self.lcd_enabled();
                if was_on && !is_on {
                    if self.mode != MODE_VBLANK {
                        log::debug!(target: "ppu", "LCD disabled outside VBlank on line {}", self.line);
                    }
                    self.line = 0;
                    self.line_dots = 0;
                    self.dot_remainder = 0;
                    self.mode = MODE_HBLANK;
                    self.stat_irq_line = false;
                    self.renderer.lcd_disabled();
                } else if !was_on && is_on {
                    self.line = 0;
                    self.line_dots = 0;
                    self.dot_remainder = 0;
                    self.mode = MODE_HBLANK;
                    // Line 0 after enabling skips the OAM scan: mode 0
                    // until dot 80.
                    self.skip_frame = true;
                    self.update_stat_irq(irq, false);
                }
            }
            0xFF41 => {
                if self.stat_write_bug && self.lcd_enabled() {
                    // DMG: for one cycle every source reads as enabled.
                    let glitch = matches!(self.mode, MODE_HBLANK | MODE_VBLANK) || self.lyc_match();
                    if glitch && !self.stat_irq_line {
                        irq.request(INT_STAT);
                    }
                }
                self.stat = val & 0x78;
                self.update_stat_irq(irq, false);
            }
            0xFF42 => self.regs.scy = val,
            0xFF43 => self.regs.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.regs.lyc = val;
                self.update_stat_irq(irq, false);
            }
            0xFF47 => self.regs.bgp = val,
            0xFF48 => self.regs.obp0 = val,
            0xFF49 => self.regs.obp1 = val,
            0xFF4A => self.regs.wy = val,
            0xFF4B => self.regs.wx = val,
            0xFF4F if self.cgb => self.vram_bank = usize::from(val & 0x01),
            0xFF68 if self.cgb => self.bgpi = Self::sanitize_palette_index(val),
            0xFF69 if self.cgb => {
                if self.palette_accessible() {
                    self.bgpd[Self::palette_ram_index(self.bgpi)] = val;
                }
                Self::step_palette_index(&mut self.bgpi);
            }
            0xFF6A if self.cgb => self.obpi = Self::sanitize_palette_index(val),
            0xFF6B if self.cgb => {
                if self.palette_accessible() {
                    self.obpd[Self::palette_ram_index(self.obpi)] = val;
                }
                Self::step_palette_index(&mut self.obpi);
            }
            0xFF6C if self.cgb => self.regs.opri = val & 0x01,
            _ => {}
        }
    }

    /// Palettes the CGB boot ROM assigns to DMG cartridges.
    pub fn apply_dmg_compatibility_palettes(&mut self) {
        const OBJ_PAL: [u16; 4] = [0x7FFF, 0x421F, 0x1CF2, 0x0000];
        const BG_PAL: [u16; 4] = [0x7FFF, 0x1BEF, 0x6180, 0x0000];

        for (i, color) in BG_PAL.iter().enumerate() {
            self.bgpd[i * 2] = *color as u8;
            self.bgpd[i * 2 + 1] = (*color >> 8) as u8;
        }
        for palette in 0..2 {
            for (i, color) in OBJ_PAL.iter().enumerate() {
                self.obpd[palette * 8 + i * 2] = *color as u8;
                self.obpd[palette * 8 + i * 2 + 1] = (*color >> 8) as u8;
            }
        }
    }

    fn sanitize_palette_index(value: u8) -> u8 {
        (value & (PAL_AUTO_INCREMENT_BIT | PAL_INDEX_MASK)) | PAL_UNUSED_BIT
    }

    fn palette_ram_index(index: u8) -> usize {
        (index & PAL_INDEX_MASK) as usize
    }

    fn step_palette_index(index: &mut u8) {
        if *index & PAL_AUTO_INCREMENT_BIT != 0 {
            let next = (*index & PAL_INDEX_MASK).wrapping_add(1) & PAL_INDEX_MASK;
            *index = PAL_AUTO_INCREMENT_BIT | PAL_UNUSED_BIT | next;
        }
    }

    pub fn lcd_registers(&self) -> &LcdRegisters {
        &self.regs
    }
}

impl Reconcile<Interrupts> for Ppu {
    fn reset(&mut self) {
        let renderer = std::mem::replace(&mut self.renderer, Box::new(NullRenderer));
        let render_mode = self.render_mode;
        let stat_write_bug = self.stat_write_bug;
        *self = Self::new(self.cgb);
        self.renderer = renderer;
        self.render_mode = render_mode;
        self.stat_write_bug = stat_write_bug;
    }

    fn update_clocks_counter_reference(&mut self, reference: i32, irq: &mut Interrupts) {
        let delta = self.clock.advance_to(reference);
        if delta == 0 || !self.lcd_enabled() {
            return;
        }
        let total = self.dot_remainder + delta;
        let shift = self.dot_shift();
        self.dot_remainder = total & ((1 << shift) - 1);
        self.advance_dots(total >> shift, irq);
    }

    fn clocks_to_next_event(&self) -> i32 {
        if !self.lcd_enabled() {
            return CLOCKS_NEVER;
        }
        ((self.next_boundary() - self.line_dots) << self.dot_shift()) - self.dot_remainder
    }

    fn clock_counter(&self) -> i32 {
        self.clock.get()
    }

    fn clock_counter_reset(&mut self) {
        self.clock.reset();
    }
}
