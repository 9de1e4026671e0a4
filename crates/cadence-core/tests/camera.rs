mod common;

use cadence_core::cartridge::{CameraSensor, MapperKind};
use cadence_core::diagnostics;
use cadence_core::hardware::HardwareType;
use common::{advance, machine_with_rom, rom_image};

/// 0x0100 exposure, positive (N flag clear) readout.
const CAPTURE_CLOCKS: i32 = 4 * (32_446 + 512 + 16 * 0x0100);

struct Flat(u8);

impl CameraSensor for Flat {
    fn capture(&mut self, frame: &mut [u8]) -> bool {
        frame.fill(self.0);
        true
    }
}

struct Unplugged;

impl CameraSensor for Unplugged {
    fn capture(&mut self, _frame: &mut [u8]) -> bool {
        false
    }
}

fn camera() -> cadence_core::GameBoy {
    let mut gb = machine_with_rom(HardwareType::Dmg, rom_image(0xFC, 0x04, 8));
    assert_eq!(gb.cart.kind(), MapperKind::Camera);
    gb.write8(0x4000, 0x10);
    gb.write8(0xA002, 0x01);
    gb.write8(0xA003, 0x00);
    for i in 0..48 {
        gb.write8(0xA006 + i, 0x80);
    }
    gb
}

#[test]
fn capture_busy_flag_tracks_emulated_time() {
    let mut gb = camera();
    gb.cart.set_camera_sensor(Box::new(Flat(0)));
    gb.write8(0xA000, 0x01);
    assert_eq!(gb.read8(0xA000) & 0x01, 0x01);

    gb.update_all();
    // Captures are reconciled on cartridge access, not through the horizon.
    assert_eq!(gb.clocks_to_next_event(), 80);

    advance(&mut gb, CAPTURE_CLOCKS - 1);
    assert_eq!(gb.read8(0xA000) & 0x01, 0x01);
    advance(&mut gb, 1);
    assert_eq!(gb.read8(0xA000) & 0x01, 0x00);

    // A dark frame dithers to color 3 everywhere.
    gb.write8(0x4000, 0x00);
    assert_eq!(gb.read8(0xA100), 0xFF);
    assert_eq!(gb.read8(0xA101), 0xFF);
    assert_eq!(gb.read8(0xA0FF), 0x00);
}

#[test]
fn ram_reads_zero_while_capturing() {
    let mut gb = camera();
    gb.write8(0x4000, 0x00);
    gb.write8(0x0000, 0x0A);
    gb.write8(0xA000, 0x42);
    assert_eq!(gb.read8(0xA000), 0x42);

    gb.write8(0x4000, 0x10);
    gb.write8(0xA000, 0x01);
    gb.write8(0x4000, 0x00);
    assert_eq!(gb.read8(0xA000), 0x00);
    advance(&mut gb, CAPTURE_CLOCKS);
    assert_eq!(gb.read8(0xA000), 0x42);
}

#[test]
fn unavailable_sensor_falls_back_to_test_pattern() {
    let mut gb = camera();
    gb.cart.set_camera_sensor(Box::new(Unplugged));
    // Unity exposure so the pattern's gradient straddles the thresholds.
    gb.write8(0xA002, 0x10);
    gb.write8(0xA000, 0x01);
    advance(&mut gb, 4 * (32_446 + 512 + 16 * 0x1000));
    assert_eq!(gb.read8(0xA000) & 0x01, 0x00);
    assert!(diagnostics::was_reported("camera-sensor"));

    gb.write8(0x4000, 0x00);
    let tiles: Vec<u8> = (0xA100..0xA100 + 14 * 16 * 16).map(|addr| gb.read8(addr)).collect();
    assert!(tiles.iter().any(|&b| b != 0xFF));
    assert!(tiles.iter().any(|&b| b != 0x00));
}
