use super::{CartridgeMemory, Mapper, MapperKind, RAM_BANK_SIZE, SaveDataError};
use crate::clock::CLOCKS_PER_SECOND;

/// Persisted clock: five current registers, five latched registers (each a
/// little-endian u32), then the host timestamp as a little-endian u64.
pub const RTC_BLOCK_LEN: usize = 48;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RtcRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    days: u16,
    halt: bool,
    carry: bool,
}

impl RtcRegisters {
    fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halt {
            out |= 0x40;
        }
        if self.carry {
            out |= 0x80;
        }
        out
    }

    fn set_control(&mut self, value: u8) {
        self.days = (self.days & 0x00FF) | (u16::from(value & 0x01) << 8);
        self.halt = value & 0x40 != 0;
        self.carry = value & 0x80 != 0;
    }

    fn to_words(self) -> [u32; 5] {
        [
            u32::from(self.seconds),
            u32::from(self.minutes),
            u32::from(self.hours),
            u32::from(self.days & 0xFF),
            u32::from(self.control_byte()),
        ]
    }

    fn from_words(words: [u32; 5]) -> Self {
        let mut regs = Self {
            seconds: (words[0] & 0x3F) as u8,
            minutes: (words[1] & 0x3F) as u8,
            hours: (words[2] & 0x1F) as u8,
            days: (words[3] & 0xFF) as u16,
            ..Self::default()
        };
        regs.set_control(words[4] as u8);
        regs
    }
}

/// MBC3 real-time clock, counting emulated time.
#[derive(Debug, Clone)]
pub struct Rtc {
    regs: RtcRegisters,
    latched: RtcRegisters,
    subsecond_clocks: u32,
    clocks_per_second: u32,
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

impl Rtc {
    pub fn new() -> Self {
        Self {
            regs: RtcRegisters::default(),
            latched: RtcRegisters::default(),
            subsecond_clocks: 0,
            clocks_per_second: CLOCKS_PER_SECOND,
        }
    }

    fn latch(&mut self) {
        self.latched = self.regs;
    }

    fn read_latched(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.latched.seconds & 0x3F,
            0x09 => self.latched.minutes & 0x3F,
            0x0A => self.latched.hours & 0x1F,
            0x0B => (self.latched.days & 0x00FF) as u8,
            0x0C => self.latched.control_byte(),
            _ => 0xFF,
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        match reg {
            0x08 => {
                self.regs.seconds = value & 0x3F;
                self.subsecond_clocks = 0;
            }
            0x09 => self.regs.minutes = value & 0x3F,
            0x0A => self.regs.hours = value & 0x1F,
            0x0B => self.regs.days = (self.regs.days & 0x0100) | u16::from(value),
            0x0C => self.regs.set_control(value),
            _ => {}
        }
        self.latch();
    }

    /// The oscillator runs on wall time, so double speed halves its rate in
    /// CPU clocks.
    fn set_double_speed(&mut self, enabled: bool) {
        let rate = if enabled { CLOCKS_PER_SECOND * 2 } else { CLOCKS_PER_SECOND };
        if rate != self.clocks_per_second {
            self.subsecond_clocks = (u64::from(self.subsecond_clocks) * u64::from(rate)
                / u64::from(self.clocks_per_second)) as u32;
            self.clocks_per_second = rate;
        }
    }

    fn add_clocks(&mut self, clocks: u32) {
        if self.regs.halt {
            return;
        }
        let total = u64::from(self.subsecond_clocks) + u64::from(clocks);
        let per_second = u64::from(self.clocks_per_second);
        self.subsecond_clocks = (total % per_second) as u32;
        let seconds = total / per_second;
        if seconds > 0 {
            self.tick_seconds(seconds);
        }
    }

    /// Catch up on time that passed outside emulation. A halted clock does
    /// not move.
    pub fn advance_seconds(&mut self, seconds: u64) {
        if !self.regs.halt {
            self.tick_seconds(seconds);
        }
    }

    fn tick_seconds(&mut self, mut seconds: u64) {
        while seconds > 0 {
            let until_minute = self.seconds_until_minute_tick();
            if seconds < until_minute {
                self.regs.seconds = ((u64::from(self.regs.seconds) + seconds) & 0x3F) as u8;
                return;
            }
            seconds -= until_minute;
            self.regs.seconds = 0;
            self.minute_tick();
        }
    }

    /// Out-of-range values count up to 63 and wrap to 0 without carrying.
    fn seconds_until_minute_tick(&self) -> u64 {
        let sec = u64::from(self.regs.seconds);
        if sec <= 59 { 60 - sec } else { (64 - sec) + 60 }
    }

    fn minute_tick(&mut self) {
        if self.regs.minutes == 59 {
            self.regs.minutes = 0;
            self.hour_tick();
        } else {
            self.regs.minutes = (self.regs.minutes + 1) & 0x3F;
        }
    }

    fn hour_tick(&mut self) {
        if self.regs.hours == 23 {
            self.regs.hours = 0;
            self.day_tick();
        } else {
            self.regs.hours = (self.regs.hours + 1) & 0x1F;
        }
    }

    fn day_tick(&mut self) {
        if self.regs.days >= 0x01FF {
            self.regs.days = 0;
            self.regs.carry = true;
        } else {
            self.regs.days += 1;
        }
    }

    pub(crate) fn to_block(&self, timestamp: u64) -> [u8; RTC_BLOCK_LEN] {
        let mut block = [0u8; RTC_BLOCK_LEN];
        let words = self.regs.to_words().into_iter().chain(self.latched.to_words());
        for (chunk, word) in block.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        block[40..48].copy_from_slice(&timestamp.to_le_bytes());
        block
    }

    pub(crate) fn load_block(&mut self, data: &[u8]) -> Result<u64, SaveDataError> {
        if data.len() != RTC_BLOCK_LEN {
            return Err(SaveDataError::RtcSize(data.len()));
        }
        let word = |i: usize| u32::from_le_bytes([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]]);
        self.regs = RtcRegisters::from_words([word(0), word(1), word(2), word(3), word(4)]);
        self.latched = RtcRegisters::from_words([word(5), word(6), word(7), word(8), word(9)]);
        self.subsecond_clocks = 0;
        let mut stamp = [0u8; 8];
        stamp.copy_from_slice(&data[40..48]);
        Ok(u64::from_le_bytes(stamp))
    }
}

/// MBC3 and MBC30. MBC30 widens the ROM bank to 8 bits and RAM to 8 banks.
pub(super) struct Mbc3 {
    rom_bank: u8,
    ram_bank: u8,
    ram_enable: bool,
    latch_armed: bool,
    wide: bool,
    rtc: Option<Rtc>,
}

impl Mbc3 {
    pub(super) fn new(wide: bool, has_rtc: bool) -> Self {
        Self {
            rom_bank: 1,
            ram_bank: 0,
            ram_enable: false,
            latch_armed: false,
            wide,
            rtc: has_rtc.then(Rtc::new),
        }
    }

    fn ram_bank_limit(&self) -> u8 {
        if self.wide { 0x07 } else { 0x03 }
    }

    fn ram_offset(&self, addr: u16) -> usize {
        usize::from(self.ram_bank) * RAM_BANK_SIZE + usize::from(addr - 0xA000)
    }
}

impl Mapper for Mbc3 {
    fn kind(&self) -> MapperKind {
        if self.wide { MapperKind::Mbc30 } else { MapperKind::Mbc3 }
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(0, addr),
            0x4000..=0x7FFF => mem.rom_byte(self.rom_bank(), addr),
            0xA000..=0xBFFF if self.ram_enable => match self.ram_bank {
                bank if bank <= self.ram_bank_limit() => mem.ram_byte(self.ram_offset(addr)),
                reg @ 0x08..=0x0C => self.rtc.as_ref().map_or(0xFF, |rtc| rtc.read_latched(reg)),
                _ => 0xFF,
            },
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                self.rom_bank = if self.wide { val } else { val & 0x7F };
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0x4000..=0x5FFF => self.ram_bank = val & 0x0F,
            0x6000..=0x7FFF => {
                // Latch on a 0 then 1 sequence.
                if val == 0x01 && self.latch_armed {
                    if let Some(rtc) = self.rtc.as_mut() {
                        rtc.latch();
                    }
                }
                self.latch_armed = val == 0x00;
            }
            0xA000..=0xBFFF if self.ram_enable => match self.ram_bank {
                bank if bank <= self.ram_bank_limit() => mem.write_ram(self.ram_offset(addr), val),
                reg @ 0x08..=0x0C => {
                    if let Some(rtc) = self.rtc.as_mut() {
                        rtc.write_register(reg, val);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn rom_bank(&self) -> usize {
        usize::from(self.rom_bank)
    }

    fn is_clocked(&self) -> bool {
        self.rtc.is_some()
    }

    fn advance(&mut self, clocks: i32, _mem: &mut CartridgeMemory) {
        if let Some(rtc) = self.rtc.as_mut() {
            rtc.add_clocks(clocks.max(0) as u32);
        }
    }

    fn set_double_speed(&mut self, enabled: bool) {
        if let Some(rtc) = self.rtc.as_mut() {
            rtc.set_double_speed(enabled);
        }
    }

    fn rtc(&self) -> Option<&Rtc> {
        self.rtc.as_ref()
    }

    fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        self.rtc.as_mut()
    }
}
