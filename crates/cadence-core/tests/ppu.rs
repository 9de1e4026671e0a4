mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cadence_core::clock::FRAME_CLOCKS;
use cadence_core::hardware::HardwareType;
use cadence_core::interrupts::{INT_STAT, INT_VBLANK};
use cadence_core::ppu::{RenderMode, ScanlineRenderer, VideoState};
use common::{advance, cgb, dmg, machine_with_rom, rom_image};

#[derive(Clone, Default)]
struct Recorder {
    lines: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<bool>>>,
}

impl ScanlineRenderer for Recorder {
    fn draw_scanline(&mut self, _line: u8, _video: &VideoState<'_>, _mode: RenderMode) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_finished(&mut self, displayed: bool) {
        self.frames.lock().unwrap().push(displayed);
    }
}

#[test]
fn stat_reports_mode_sequence_through_the_bus() {
    let mut gb = dmg();
    assert_eq!(gb.read8(0xFF41), 0x86);
    advance(&mut gb, 80);
    assert_eq!(gb.read8(0xFF41), 0x87);
    advance(&mut gb, 172);
    assert_eq!(gb.read8(0xFF41), 0x84);
    advance(&mut gb, 204);
    assert_eq!(gb.read8(0xFF44), 1);
    assert_eq!(gb.read8(0xFF41), 0x82);
}

#[test]
fn vblank_interrupt_at_line_144() {
    let mut gb = dmg();
    gb.write8(0xFF0F, 0x00);
    advance(&mut gb, 144 * 456 - 1);
    assert_eq!(gb.read8(0xFF0F) & INT_VBLANK, 0);
    advance(&mut gb, 1);
    assert_ne!(gb.read8(0xFF0F) & INT_VBLANK, 0);
    assert_eq!(gb.read8(0xFF44), 144);
    assert_eq!(gb.read8(0xFF41) & 0x03, 1);
    assert!(gb.ppu.take_frame_ready());
}

#[test]
fn lyc_match_raises_stat() {
    let mut gb = dmg();
    gb.write8(0xFF45, 2);
    gb.write8(0xFF41, 0x40);
    gb.write8(0xFF0F, 0x00);
    advance(&mut gb, 2 * 456 - 1);
    assert_eq!(gb.read8(0xFF0F) & INT_STAT, 0);
    advance(&mut gb, 1);
    assert_ne!(gb.read8(0xFF0F) & INT_STAT, 0);
    assert_eq!(gb.read8(0xFF41) & 0x04, 0x04);
}

#[test]
fn renderer_sees_each_visible_line_and_skips_first_frame_after_enable() {
    let mut gb = dmg();
    let recorder = Recorder::default();
    gb.ppu.set_renderer(Box::new(recorder.clone()));

    advance(&mut gb, FRAME_CLOCKS);
    gb.update_all();
    assert_eq!(recorder.lines.load(Ordering::Relaxed), 144);
    assert_eq!(*recorder.frames.lock().unwrap(), vec![true]);

    gb.write8(0xFF40, 0x11);
    gb.write8(0xFF40, 0x91);
    advance(&mut gb, FRAME_CLOCKS);
    gb.update_all();
    assert_eq!(recorder.lines.load(Ordering::Relaxed), 144);
    assert_eq!(*recorder.frames.lock().unwrap(), vec![true, false]);
}

#[test]
fn double_speed_halves_dot_rate_in_cpu_clocks() {
    let mut gb = cgb();
    gb.write8(0xFF4D, 0x01);
    gb.cpu_stop();
    // The 8200-clock switch is 4100 dots: line 8, dot 452.
    assert_eq!(gb.read8(0xFF44), 8);
    advance(&mut gb, 7);
    assert_eq!(gb.read8(0xFF44), 8);
    advance(&mut gb, 1);
    assert_eq!(gb.read8(0xFF44), 9);
}

#[test]
fn cgb_palette_ram_auto_increments() {
    let mut gb = cgb();
    gb.write8(0xFF68, 0x80);
    gb.write8(0xFF69, 0x11);
    gb.write8(0xFF69, 0x22);
    assert_eq!(gb.read8(0xFF68), 0xC2);
    gb.write8(0xFF68, 0x01);
    assert_eq!(gb.read8(0xFF69), 0x22);
}

#[test]
fn dmg_cartridge_on_cgb_gets_compat_palettes() {
    let mut gb = machine_with_rom(HardwareType::Cgb, rom_image(0x00, 0x00, 2));
    assert_eq!(gb.ppu.render_mode(), RenderMode::CgbDmgCompat);
    gb.write8(0xFF68, 0x02);
    assert_eq!(gb.read8(0xFF69), 0xEF);
    gb.write8(0xFF68, 0x03);
    assert_eq!(gb.read8(0xFF69), 0x1B);
}
