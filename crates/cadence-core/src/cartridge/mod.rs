//! Cartridge header, memory and the bank-switching mapper bound at load.

mod camera;
mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;
mod mbc6;
mod mbc7;
mod mmm01;
mod rom;

pub use camera::{CAMERA_IMAGE_HEIGHT, CAMERA_IMAGE_WIDTH, CameraSensor, SENSOR_HEIGHT, SENSOR_WIDTH, SyntheticSensor};
pub use mbc3::{RTC_BLOCK_LEN, Rtc};

use crate::clock::{CLOCKS_NEVER, ClockCounter, Reconcile};
use thiserror::Error;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;
const HEADER_END: usize = 0x0150;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("ROM image is {0} bytes, too small to hold a cartridge header")]
    TooSmall(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SaveDataError {
    #[error("save RAM is {actual} bytes, cartridge has {expected}")]
    RamSize { expected: usize, actual: usize },
    #[error("RTC block is {0} bytes, expected {RTC_BLOCK_LEN}")]
    RtcSize(usize),
    #[error("cartridge has no real-time clock")]
    NoRtc,
}

/// Bank-switching hardware variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapperKind {
    Rom,
    Mbc1,
    Mbc1Multicart,
    Mbc2,
    Mbc3,
    Mbc30,
    Mbc5,
    Mbc5Rumble,
    Mbc6,
    Mbc7,
    Mmm01,
    Camera,
}

impl MapperKind {
    /// Mapper for header byte 0x147. Unsupported types fall back to the
    /// closest implemented variant.
    pub fn from_header(cart_type: u8, ram_code: u8, rom_banks: usize) -> Self {
        match cart_type {
            0x00 | 0x08 | 0x09 => MapperKind::Rom,
            0x01..=0x03 => MapperKind::Mbc1,
            0x05 | 0x06 => MapperKind::Mbc2,
            0x0B..=0x0D => MapperKind::Mmm01,
            0x0F..=0x13 if ram_code == 0x05 || rom_banks > 128 => MapperKind::Mbc30,
            0x0F..=0x13 => MapperKind::Mbc3,
            0x19..=0x1B => MapperKind::Mbc5,
            0x1C..=0x1E => MapperKind::Mbc5Rumble,
            0x20 => MapperKind::Mbc6,
            0x22 => MapperKind::Mbc7,
            0xFC => MapperKind::Camera,
            0xFF => {
                log::warn!("HuC1 cartridge emulated as MBC1, infrared port unavailable");
                MapperKind::Mbc1
            }
            0xFD => {
                log::warn!("TAMA5 cartridge is not supported, mapping as plain ROM");
                MapperKind::Rom
            }
            0xFE => {
                log::warn!("HuC3 cartridge is not supported, mapping as plain ROM");
                MapperKind::Rom
            }
            other => {
                log::warn!("unknown cartridge type {other:02X}, mapping as plain ROM");
                MapperKind::Rom
            }
        }
    }
}

/// Decoded header fields.
#[derive(Clone, Debug)]
pub struct CartridgeInfo {
    pub title: String,
    pub cgb_supported: bool,
    pub cgb_only: bool,
    pub sgb_supported: bool,
    pub cart_type: u8,
    pub kind: MapperKind,
    pub rom_banks: usize,
    pub ram_size: usize,
    pub battery: bool,
    pub rtc: bool,
}

impl CartridgeInfo {
    pub fn parse(rom: &[u8]) -> Result<Self, HeaderError> {
        if rom.len() < HEADER_END {
            return Err(HeaderError::TooSmall(rom.len()));
        }
        let mut title = &rom[0x0134..0x0143];
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }
        let cart_type = rom[0x0147];
        let ram_code = rom[0x0149];
        let rom_banks = rom_bank_count(rom.len());
        let kind = MapperKind::from_header(cart_type, ram_code, rom_banks);
        let ram_size = match kind {
            MapperKind::Mbc2 => 0x200,
            MapperKind::Mbc7 => mbc7::EEPROM_BYTES,
            MapperKind::Mbc6 => 0x8000,
            MapperKind::Camera => 0x20000,
            _ => match ram_code {
                0x00 => 0,
                0x01 => 0x800,
                0x02 => 0x2000,
                0x03 => 0x8000,
                0x04 => 0x20000,
                0x05 => 0x10000,
                _ => 0x2000,
            },
        };
        Ok(Self {
            title: String::from_utf8_lossy(title).trim().to_string(),
            cgb_supported: rom[0x0143] & 0x80 != 0,
            cgb_only: rom[0x0143] == 0xC0,
            sgb_supported: rom[0x0146] == 0x03,
            cart_type,
            kind,
            rom_banks,
            ram_size,
            battery: matches!(
                cart_type,
                0x03 | 0x06 | 0x09 | 0x0D | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E | 0x20 | 0x22 | 0xFC
            ),
            rtc: matches!(cart_type, 0x0F | 0x10),
        })
    }
}

/// Bank count for an image, rounded up to a power of two with a minimum of
/// two banks.
fn rom_bank_count(len: usize) -> usize {
    len.div_ceil(ROM_BANK_SIZE).max(2).next_power_of_two()
}

/// ROM image and external RAM. Mappers address them only through these
/// accessors.
pub struct CartridgeMemory {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_banks: usize,
}

impl CartridgeMemory {
    fn new(mut rom: Vec<u8>, ram_size: usize) -> Self {
        let rom_banks = rom_bank_count(rom.len());
        rom.resize(rom_banks * ROM_BANK_SIZE, 0xFF);
        Self {
            rom,
            ram: vec![0; ram_size],
            rom_banks,
        }
    }

    pub fn rom_banks(&self) -> usize {
        self.rom_banks
    }

    /// Byte `offset` of 16 KiB bank `bank`, wrapped to the image size.
    #[inline]
    pub fn rom_byte(&self, bank: usize, offset: u16) -> u8 {
        let bank = bank & (self.rom_banks - 1);
        self.rom[bank * ROM_BANK_SIZE + usize::from(offset & 0x3FFF)]
    }

    /// Byte at an absolute image offset, wrapped to the image size.
    #[inline]
    pub fn rom_linear(&self, offset: usize) -> u8 {
        self.rom[offset & (self.rom.len() - 1)]
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn rom_len(&self) -> usize {
        self.rom.len()
    }

    pub fn ram_len(&self) -> usize {
        self.ram.len()
    }

    /// 8 KiB bank count, at least one when any RAM is present.
    pub fn ram_banks(&self) -> usize {
        self.ram.len().div_ceil(RAM_BANK_SIZE)
    }

    /// Byte at `offset` into the RAM image, wrapping smaller chips. 0xFF when
    /// the cartridge has no RAM.
    #[inline]
    pub fn ram_byte(&self, offset: usize) -> u8 {
        if self.ram.is_empty() {
            return 0xFF;
        }
        self.ram[offset % self.ram.len()]
    }

    #[inline]
    pub fn write_ram(&mut self, offset: usize, val: u8) {
        if self.ram.is_empty() {
            return;
        }
        let len = self.ram.len();
        self.ram[offset % len] = val;
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }
}

/// Bank-switching logic for one cartridge type.
pub trait Mapper: Send {
    fn kind(&self) -> MapperKind;

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8;

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8);

    /// Bank visible at 0x4000-0x7FFF, for diagnostics.
    fn rom_bank(&self) -> usize;

    /// Mappers with their own time base (RTC, camera) advance here.
    fn is_clocked(&self) -> bool {
        false
    }

    fn advance(&mut self, _clocks: i32, _mem: &mut CartridgeMemory) {}

    fn clocks_to_next_event(&self) -> i32 {
        CLOCKS_NEVER
    }

    fn set_double_speed(&mut self, _enabled: bool) {}

    fn rtc(&self) -> Option<&Rtc> {
        None
    }

    fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        None
    }

    fn rumble_active(&self) -> bool {
        false
    }

    fn set_accelerometer(&mut self, _x: f32, _y: f32) {}

    fn set_camera_sensor(&mut self, _sensor: Box<dyn CameraSensor>) {}
}

fn build_mapper(kind: MapperKind, mem: &CartridgeMemory, rtc: bool) -> Box<dyn Mapper> {
    match kind {
        MapperKind::Rom => Box::new(rom::RomOnly),
        MapperKind::Mbc1 => Box::new(mbc1::Mbc1::new(false)),
        MapperKind::Mbc1Multicart => Box::new(mbc1::Mbc1::new(true)),
        MapperKind::Mbc2 => Box::new(mbc2::Mbc2::new()),
        MapperKind::Mbc3 => Box::new(mbc3::Mbc3::new(false, rtc)),
        MapperKind::Mbc30 => Box::new(mbc3::Mbc3::new(true, rtc)),
        MapperKind::Mbc5 => Box::new(mbc5::Mbc5::new(false)),
        MapperKind::Mbc5Rumble => Box::new(mbc5::Mbc5::new(true)),
        MapperKind::Mbc6 => Box::new(mbc6::Mbc6::new()),
        MapperKind::Mbc7 => Box::new(mbc7::Mbc7::new()),
        MapperKind::Mmm01 => Box::new(mmm01::Mmm01::new(mem)),
        MapperKind::Camera => Box::new(camera::Camera::new()),
    }
}

/// A loaded cartridge: header, memory and the bound mapper.
pub struct Cartridge {
    info: CartridgeInfo,
    mem: CartridgeMemory,
    mapper: Box<dyn Mapper>,
    clock: ClockCounter,
    double_speed: bool,
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge")
            .field("title", &self.info.title)
            .field("kind", &self.mapper.kind())
            .field("rom_bank", &self.mapper.rom_bank())
            .finish()
    }
}

impl Cartridge {
    pub fn from_rom(rom: Vec<u8>) -> Result<Self, HeaderError> {
        let mut info = CartridgeInfo::parse(&rom)?;
        if info.kind == MapperKind::Mbc1 && mbc1::is_multicart(&rom) {
            info.kind = MapperKind::Mbc1Multicart;
        }
        let mem = CartridgeMemory::new(rom, info.ram_size);
        let mapper = build_mapper(info.kind, &mem, info.rtc);
        log::info!(
            "cartridge \"{}\" type {:02X} ({:?}), {} ROM banks, {} bytes RAM",
            info.title,
            info.cart_type,
            info.kind,
            mem.rom_banks(),
            mem.ram_len()
        );
        Ok(Self {
            info,
            mem,
            mapper,
            clock: ClockCounter::new(),
            double_speed: false,
        })
    }

    /// Rebind the mapper. Bank registers return to their power-on state.
    pub fn set_mapper(&mut self, kind: MapperKind) {
        self.info.kind = kind;
        self.mapper = build_mapper(kind, &self.mem, self.info.rtc);
        self.mapper.set_double_speed(self.double_speed);
    }

    pub fn header(&self) -> &CartridgeInfo {
        &self.info
    }

    pub fn kind(&self) -> MapperKind {
        self.mapper.kind()
    }

    #[inline]
    pub fn read(&mut self, addr: u16) -> u8 {
        self.mapper.read(&self.mem, addr)
    }

    #[inline]
    pub fn write(&mut self, addr: u16, val: u8) {
        self.mapper.write(&mut self.mem, addr, val);
    }

    pub fn rom_bank(&self) -> usize {
        self.mapper.rom_bank()
    }

    pub fn is_clocked(&self) -> bool {
        self.mapper.is_clocked()
    }

    pub fn set_double_speed(&mut self, enabled: bool) {
        self.double_speed = enabled;
        self.mapper.set_double_speed(enabled);
    }

    pub fn memory(&self) -> &CartridgeMemory {
        &self.mem
    }

    pub fn ram(&self) -> &[u8] {
        self.mem.ram()
    }

    /// Restore battery-backed RAM. The image must match the RAM size exactly.
    pub fn load_ram(&mut self, data: &[u8]) -> Result<(), SaveDataError> {
        let expected = self.mem.ram_len();
        if data.len() != expected {
            return Err(SaveDataError::RamSize {
                expected,
                actual: data.len(),
            });
        }
        self.mem.ram_mut().copy_from_slice(data);
        Ok(())
    }

    pub fn has_rtc(&self) -> bool {
        self.mapper.rtc().is_some()
    }

    /// Serialize the clock registers with the host `timestamp`.
    pub fn rtc_block(&self, timestamp: u64) -> Option<[u8; RTC_BLOCK_LEN]> {
        self.mapper.rtc().map(|rtc| rtc.to_block(timestamp))
    }

    /// Restore the clock registers, returning the timestamp stored with them.
    pub fn load_rtc_block(&mut self, data: &[u8]) -> Result<u64, SaveDataError> {
        let rtc = self.mapper.rtc_mut().ok_or(SaveDataError::NoRtc)?;
        rtc.load_block(data)
    }

    /// Move the clock forward by wall time that passed while not running.
    pub fn advance_rtc_seconds(&mut self, seconds: u64) {
        if let Some(rtc) = self.mapper.rtc_mut() {
            rtc.advance_seconds(seconds);
        }
    }

    pub fn rumble_active(&self) -> bool {
        self.mapper.rumble_active()
    }

    /// Tilt for MBC7 cartridges, -1.0..=1.0 per axis.
    pub fn set_accelerometer(&mut self, x: f32, y: f32) {
        self.mapper.set_accelerometer(x, y);
    }

    pub fn set_camera_sensor(&mut self, sensor: Box<dyn CameraSensor>) {
        self.mapper.set_camera_sensor(sensor);
    }
}

impl Reconcile<()> for Cartridge {
    fn reset(&mut self) {
        self.clock.reset();
        self.set_mapper(self.info.kind);
    }

    fn update_clocks_counter_reference(&mut self, reference: i32, _ctx: &mut ()) {
        let delta = self.clock.advance_to(reference);
        if delta > 0 {
            self.mapper.advance(delta, &mut self.mem);
        }
    }

    fn clocks_to_next_event(&self) -> i32 {
        self.mapper.clocks_to_next_event()
    }

    fn clock_counter(&self) -> i32 {
        self.clock.get()
    }

    fn clock_counter_reset(&mut self) {
        self.clock.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(cart_type: u8, ram_code: u8, banks: usize) -> Vec<u8> {
        let mut rom = vec![0; banks * ROM_BANK_SIZE];
        rom[0x0134..0x0139].copy_from_slice(b"TESTS");
        rom[0x0147] = cart_type;
        rom[0x0149] = ram_code;
        rom
    }

    #[test]
    fn header_too_small_is_rejected() {
        assert_eq!(
            CartridgeInfo::parse(&[0; 0x100]).unwrap_err(),
            HeaderError::TooSmall(0x100)
        );
    }

    #[test]
    fn header_fields_decode() {
        let mut rom = image(0x13, 0x03, 64);
        rom[0x0143] = 0x80;
        rom[0x0146] = 0x03;
        let info = CartridgeInfo::parse(&rom).unwrap();
        assert_eq!(info.title, "TESTS");
        assert_eq!(info.kind, MapperKind::Mbc3);
        assert!(info.cgb_supported && !info.cgb_only && info.sgb_supported);
        assert!(info.battery && !info.rtc);
        assert_eq!(info.ram_size, 0x8000);
        assert_eq!(info.rom_banks, 64);
    }

    #[test]
    fn mbc30_detected_from_ram_size() {
        let info = CartridgeInfo::parse(&image(0x10, 0x05, 4)).unwrap();
        assert_eq!(info.kind, MapperKind::Mbc30);
        assert!(info.rtc);
    }

    #[test]
    fn unsupported_types_fall_back() {
        assert_eq!(MapperKind::from_header(0xFF, 0, 2), MapperKind::Mbc1);
        assert_eq!(MapperKind::from_header(0xFD, 0, 2), MapperKind::Rom);
        assert_eq!(MapperKind::from_header(0x42, 0, 2), MapperKind::Rom);
    }

    #[test]
    fn odd_sized_images_are_padded() {
        let mut rom = image(0x00, 0, 2);
        rom.truncate(0x5000);
        let cart = Cartridge::from_rom(rom).unwrap();
        assert_eq!(cart.memory().rom_banks(), 2);
        assert_eq!(cart.memory().rom_len(), 0x8000);
    }

    #[test]
    fn save_ram_length_is_checked() {
        let mut cart = Cartridge::from_rom(image(0x03, 0x02, 4)).unwrap();
        assert!(matches!(
            cart.load_ram(&[0; 16]),
            Err(SaveDataError::RamSize { expected: 0x2000, actual: 16 })
        ));
        assert!(cart.load_ram(&[0x5A; 0x2000]).is_ok());
        assert_eq!(cart.ram()[0x1FFF], 0x5A);
    }

    #[test]
    fn set_mapper_rebinds() {
        let mut cart = Cartridge::from_rom(image(0x00, 0x00, 8)).unwrap();
        assert_eq!(cart.kind(), MapperKind::Rom);
        cart.set_mapper(MapperKind::Mbc5);
        cart.write(0x2000, 0x05);
        assert_eq!(cart.rom_bank(), 5);
    }
}
