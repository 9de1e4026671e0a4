use super::{CartridgeMemory, Mapper, MapperKind, RAM_BANK_SIZE};
use crate::clock::CLOCKS_NEVER;
use crate::diagnostics;

pub const SENSOR_WIDTH: usize = 128;
pub const SENSOR_HEIGHT: usize = 128;
pub const CAMERA_IMAGE_WIDTH: usize = 128;
pub const CAMERA_IMAGE_HEIGHT: usize = 112;

const SENSOR_FRAME: usize = SENSOR_WIDTH * SENSOR_HEIGHT;
const REGISTER_COUNT: usize = 0x36;
const DITHER_BASE: usize = 0x06;
/// Processed picture location in RAM bank 0.
const IMAGE_OFFSET: usize = 0x0100;

/// Source of raw 8-bit luminance frames.
pub trait CameraSensor: Send {
    /// Fill `frame` (row-major, `SENSOR_WIDTH` x `SENSOR_HEIGHT`). Returns
    /// false when the device has nothing to give.
    fn capture(&mut self, frame: &mut [u8]) -> bool;
}

/// Moving test pattern used when no device is attached.
#[derive(Debug, Default)]
pub struct SyntheticSensor {
    frame: u32,
}

impl CameraSensor for SyntheticSensor {
    fn capture(&mut self, frame: &mut [u8]) -> bool {
        let bar = (self.frame as usize * 4) % SENSOR_WIDTH;
        for (i, px) in frame.iter_mut().enumerate() {
            let (x, y) = (i % SENSOR_WIDTH, i / SENSOR_WIDTH);
            let gradient = ((x + y) * 255 / (SENSOR_WIDTH + SENSOR_HEIGHT - 2)) as u8;
            *px = if x.abs_diff(bar) < 8 { 255 - gradient } else { gradient };
        }
        self.frame = self.frame.wrapping_add(1);
        true
    }
}

/// Game Boy Camera (MAC-GBD with the M64282FP sensor).
pub(super) struct Camera {
    rom_bank: u8,
    ram_bank: u8,
    registers_mapped: bool,
    ram_write_enable: bool,
    regs: [u8; REGISTER_COUNT],
    /// CPU clocks left in the current capture.
    capture_clocks: i32,
    double_speed: bool,
    sensor: Box<dyn CameraSensor>,
    /// Last raw frame from the sensor.
    frame: Box<[u8; SENSOR_FRAME]>,
}

impl Camera {
    pub(super) fn new() -> Self {
        Self {
            rom_bank: 1,
            ram_bank: 0,
            registers_mapped: false,
            ram_write_enable: false,
            regs: [0; REGISTER_COUNT],
            capture_clocks: 0,
            double_speed: false,
            sensor: Box::new(SyntheticSensor::default()),
            frame: Box::new([0; SENSOR_FRAME]),
        }
    }

    fn busy(&self) -> bool {
        self.capture_clocks > 0
    }

    fn exposure(&self) -> u32 {
        (u32::from(self.regs[2]) << 8) | u32::from(self.regs[3])
    }

    /// Capture length in CPU clocks at the current speed.
    fn capture_duration(&self) -> i32 {
        let negative = self.regs[1] & 0x80 != 0;
        let sensor_clocks = 32_446 + if negative { 0 } else { 512 } + 16 * self.exposure();
        let clocks = (4 * sensor_clocks) as i32;
        clocks << u32::from(self.double_speed)
    }

    fn ram_offset(&self, addr: u16) -> usize {
        usize::from(self.ram_bank) * RAM_BANK_SIZE + usize::from(addr - 0xA000)
    }

    fn write_register(&mut self, addr: u16, val: u8) {
        let index = usize::from(addr & 0x7F);
        if index == 0 {
            let start = val & 0x01 != 0 && !self.busy();
            self.regs[0] = val & 0x07;
            if start {
                self.capture_clocks = self.capture_duration();
                log::trace!(target: "camera", "capture started, {} clocks", self.capture_clocks);
            } else if self.busy() {
                self.regs[0] |= 0x01;
            }
        } else if index < REGISTER_COUNT {
            self.regs[index] = val;
        }
    }

    fn finish_capture(&mut self, mem: &mut CartridgeMemory) {
        self.capture_clocks = 0;
        self.regs[0] &= !0x01;
        if !self.sensor.capture(&mut self.frame[..]) {
            diagnostics::report_once("camera-sensor", || {
                "camera device unavailable, using the synthetic sensor".to_string()
            });
            self.sensor = Box::new(SyntheticSensor::default());
            self.sensor.capture(&mut self.frame[..]);
        }
        if (self.regs[1] >> 5) & 0x03 != 0 {
            diagnostics::report_once("camera-edge", || {
                format!("camera edge mode {} not emulated", (self.regs[1] >> 5) & 0x03)
            });
        }
        self.process_into(mem);
    }

    /// Expose, optionally invert, dither through the 4x4 threshold matrix and
    /// store the result as 2bpp tiles.
    fn process_into(&self, mem: &mut CartridgeMemory) {
        let exposure = self.exposure().max(1);
        let invert = self.regs[4] & 0x08 != 0;
        let top = (SENSOR_HEIGHT - CAMERA_IMAGE_HEIGHT) / 2;
        for y in 0..CAMERA_IMAGE_HEIGHT {
            for x in 0..CAMERA_IMAGE_WIDTH {
                let raw = u32::from(self.frame[(y + top) * SENSOR_WIDTH + x]);
                let mut value = ((raw * exposure) >> 12).min(255) as u8;
                if invert {
                    value = 255 - value;
                }
                let cell = DITHER_BASE + ((y & 3) * 4 + (x & 3)) * 3;
                let color: u8 = if value < self.regs[cell] {
                    3
                } else if value < self.regs[cell + 1] {
                    2
                } else if value < self.regs[cell + 2] {
                    1
                } else {
                    0
                };
                let tile = (y / 8) * (CAMERA_IMAGE_WIDTH / 8) + x / 8;
                let offset = IMAGE_OFFSET + tile * 16 + (y & 7) * 2;
                let mask = 0x80 >> (x & 7);
                for (plane, bit) in [(0, 0x01), (1, 0x02)] {
                    let mut byte = mem.ram_byte(offset + plane);
                    if color & bit != 0 {
                        byte |= mask;
                    } else {
                        byte &= !mask;
                    }
                    mem.write_ram(offset + plane, byte);
                }
            }
        }
    }
}

impl Mapper for Camera {
    fn kind(&self) -> MapperKind {
        MapperKind::Camera
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(0, addr),
            0x4000..=0x7FFF => mem.rom_byte(self.rom_bank(), addr),
            0xA000..=0xBFFF if self.registers_mapped => {
                if addr & 0x7F == 0 { self.regs[0] } else { 0x00 }
            }
            // The RAM is readable without the enable, except mid-capture.
            0xA000..=0xBFFF if self.busy() => 0x00,
            0xA000..=0xBFFF => mem.ram_byte(self.ram_offset(addr)),
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_write_enable = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = val & 0x3F,
            0x4000..=0x5FFF => {
                self.registers_mapped = val & 0x10 != 0;
                if !self.registers_mapped {
                    self.ram_bank = val & 0x0F;
                }
            }
            0xA000..=0xBFFF if self.registers_mapped => self.write_register(addr, val),
            0xA000..=0xBFFF if self.ram_write_enable && !self.busy() => {
                mem.write_ram(self.ram_offset(addr), val)
            }
            _ => {}
        }
    }

    fn rom_bank(&self) -> usize {
        usize::from(self.rom_bank)
    }

    fn is_clocked(&self) -> bool {
        true
    }

    fn advance(&mut self, clocks: i32, mem: &mut CartridgeMemory) {
        if !self.busy() {
            return;
        }
        self.capture_clocks -= clocks;
        if self.capture_clocks <= 0 {
            self.finish_capture(mem);
        }
    }

    fn clocks_to_next_event(&self) -> i32 {
        if self.busy() { self.capture_clocks } else { CLOCKS_NEVER }
    }

    fn set_double_speed(&mut self, enabled: bool) {
        if enabled != self.double_speed && self.busy() {
            self.capture_clocks = if enabled {
                self.capture_clocks * 2
            } else {
                self.capture_clocks / 2
            };
        }
        self.double_speed = enabled;
    }

    fn set_camera_sensor(&mut self, sensor: Box<dyn CameraSensor>) {
        self.sensor = sensor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat(u8);

    impl CameraSensor for Flat {
        fn capture(&mut self, frame: &mut [u8]) -> bool {
            frame.fill(self.0);
            true
        }
    }

    fn camera() -> (Camera, CartridgeMemory) {
        let mut mem = CartridgeMemory::new(vec![0; 0x8000], 0x20000);
        let mut cam = Camera::new();
        cam.write(&mut mem, 0x4000, 0x10);
        (cam, mem)
    }

    #[test]
    fn capture_duration_follows_exposure_and_n_flag() {
        let (mut cam, mut mem) = camera();
        cam.write(&mut mem, 0xA002, 0x01);
        cam.write(&mut mem, 0xA003, 0x00);
        assert_eq!(cam.capture_duration(), 4 * (32_446 + 512 + 16 * 0x100));
        cam.write(&mut mem, 0xA001, 0x80);
        assert_eq!(cam.capture_duration(), 4 * (32_446 + 16 * 0x100));
    }

    #[test]
    fn busy_flag_clears_when_capture_completes() {
        let (mut cam, mut mem) = camera();
        cam.write(&mut mem, 0xA000, 0x01);
        let duration = cam.capture_duration();
        assert_eq!(cam.read(&mem, 0xA000) & 0x01, 0x01);
        assert_eq!(cam.clocks_to_next_event(), duration);
        cam.advance(duration - 1, &mut mem);
        assert_eq!(cam.read(&mem, 0xA000) & 0x01, 0x01);
        cam.advance(1, &mut mem);
        assert_eq!(cam.read(&mem, 0xA000) & 0x01, 0x00);
        assert_eq!(cam.clocks_to_next_event(), CLOCKS_NEVER);
    }

    #[test]
    fn dark_frame_dithers_to_black_tiles() {
        let (mut cam, mut mem) = camera();
        cam.set_camera_sensor(Box::new(Flat(0)));
        for i in 0..48 {
            cam.write(&mut mem, 0xA006 + i, 0x80);
        }
        cam.write(&mut mem, 0xA000, 0x01);
        cam.advance(cam.capture_duration(), &mut mem);
        assert!(mem.ram()[IMAGE_OFFSET..IMAGE_OFFSET + 14 * 16 * 16].iter().all(|&b| b == 0xFF));
        assert_eq!(mem.ram()[IMAGE_OFFSET - 1], 0x00);
    }

    #[test]
    fn ram_writes_blocked_in_register_mode() {
        let (mut cam, mut mem) = camera();
        cam.write(&mut mem, 0x0000, 0x0A);
        cam.write(&mut mem, 0xA100, 0x12);
        assert_eq!(mem.ram()[0x100], 0x00);
        cam.write(&mut mem, 0x4000, 0x00);
        cam.write(&mut mem, 0xA100, 0x12);
        assert_eq!(cam.read(&mem, 0xA100), 0x12);
    }
}
