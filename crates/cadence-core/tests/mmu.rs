mod common;

use cadence_core::GameBoy;
use cadence_core::config::MachineConfig;
use cadence_core::hardware::HardwareType;
use cadence_core::mmu::BusMap;
use common::{advance, cgb, cgb_rom_image, dmg, machine_with_rom, rom_image};

fn with_boot_rom(hardware: HardwareType, rom: Vec<u8>, boot: Vec<u8>) -> GameBoy {
    let config = MachineConfig {
        hardware: Some(hardware),
        boot_rom: Some(boot),
        ..MachineConfig::default()
    };
    GameBoy::from_rom(rom, config).unwrap()
}

#[test]
fn wram_echo_and_bank_switch() {
    let mut gb = cgb();
    gb.write8(0xC000, 0xAA);
    assert_eq!(gb.read8(0xE000), 0xAA);
    gb.write8(0xE001, 0xBB);
    assert_eq!(gb.read8(0xC001), 0xBB);

    gb.write8(0xD000, 0x11);
    gb.write8(0xFF70, 0x02);
    assert_eq!(gb.read8(0xD000), 0x00);
    gb.write8(0xD000, 0x22);
    gb.write8(0xFF70, 0x01);
    assert_eq!(gb.read8(0xD000), 0x11);
    assert_eq!(gb.read8(0xF000), 0x11);
    gb.write8(0xFF70, 0x02);
    assert_eq!(gb.read8(0xD000), 0x22);
}

#[test]
fn hram_and_unusable_region() {
    let mut gb = dmg();
    gb.write8(0xFF80, 0x12);
    gb.write8(0xFFFE, 0x34);
    assert_eq!(gb.read8(0xFF80), 0x12);
    assert_eq!(gb.read8(0xFFFE), 0x34);
    gb.write8(0xFEA0, 0x56);
    assert_eq!(gb.read8(0xFEA0), 0x00);
}

#[test]
fn oam_is_locked_during_scan_and_transfer() {
    let mut gb = dmg();
    gb.write8(0xFE00, 0x12);
    assert_eq!(gb.read8(0xFE00), 0xFF);
    advance(&mut gb, 80);
    assert_eq!(gb.read8(0xFE00), 0xFF);
    advance(&mut gb, 172);
    gb.write8(0xFE00, 0x34);
    assert_eq!(gb.read8(0xFE00), 0x34);
}

#[test]
fn strict_vram_checks_block_mode_3_access() {
    let config = MachineConfig {
        hardware: Some(HardwareType::Dmg),
        strict_vram_checks: true,
        ..MachineConfig::default()
    };
    let mut gb = GameBoy::from_rom(rom_image(0x00, 0x00, 2), config).unwrap();
    gb.write8(0x8000, 0x11);
    assert_eq!(gb.read8(0x8000), 0x11);
    advance(&mut gb, 80);
    gb.write8(0x8000, 0x22);
    assert_eq!(gb.read8(0x8000), 0xFF);
    advance(&mut gb, 172);
    assert_eq!(gb.read8(0x8000), 0x11);

    let mut lenient = dmg();
    advance(&mut lenient, 80);
    lenient.write8(0x8000, 0x22);
    assert_eq!(lenient.read8(0x8000), 0x22);
}

#[test]
fn vram_bank_select_on_cgb() {
    let mut gb = cgb();
    gb.write8(0x8000, 0x01);
    gb.write8(0xFF4F, 0x01);
    assert_eq!(gb.read8(0xFF4F), 0xFF);
    assert_eq!(gb.read8(0x8000), 0x00);
    gb.write8(0x8000, 0x02);
    gb.write8(0xFF4F, 0x00);
    assert_eq!(gb.read8(0xFF4F), 0xFE);
    assert_eq!(gb.read8(0x8000), 0x01);
}

#[test]
fn dmg_boot_rom_overlays_until_ff50() {
    let mut gb = with_boot_rom(HardwareType::Dmg, rom_image(0x00, 0x00, 2), vec![0xAA; 0x100]);
    assert_eq!(gb.bus_map(), BusMap::DmgBoot);
    assert_eq!(gb.read8(0x0000), 0xAA);
    assert_eq!(gb.read8(0x00FF), 0xAA);
    assert_eq!(gb.read8(0x0147), 0x00);

    gb.write8(0xFF50, 0x00);
    assert_eq!(gb.bus_map(), BusMap::DmgBoot);
    gb.write8(0xFF50, 0x01);
    assert_eq!(gb.bus_map(), BusMap::Dmg);
    assert_eq!(gb.read8(0x0000), 0x00);

    // Unmapping is one-way.
    gb.write8(0xFF50, 0x00);
    assert_eq!(gb.bus_map(), BusMap::Dmg);
    assert_eq!(gb.read8(0x0000), 0x00);
}

#[test]
fn cgb_boot_rom_leaves_the_header_visible() {
    let mut rom = cgb_rom_image(0x00, 0x00, 2);
    rom[0x0150] = 0x5A;
    rom[0x0200] = 0x5B;
    let mut gb = with_boot_rom(HardwareType::Cgb, rom, vec![0xCC; 0x900]);
    assert_eq!(gb.bus_map(), BusMap::CgbBoot);
    assert_eq!(gb.read8(0x0000), 0xCC);
    assert_eq!(gb.read8(0x0150), 0x5A);
    assert_eq!(gb.read8(0x0200), 0xCC);
    assert_eq!(gb.read8(0x0900), 0x00);

    gb.write8(0xFF50, 0x11);
    assert_eq!(gb.bus_map(), BusMap::Cgb);
    assert_eq!(gb.read8(0x0200), 0x5B);
    assert!(!gb.cgb_compat());
}

#[test]
fn dmg_cartridge_on_cgb_boot_enters_compat_mode() {
    let mut gb = with_boot_rom(HardwareType::Cgb, rom_image(0x00, 0x00, 2), vec![0x00; 0x900]);
    assert!(!gb.cgb_compat());
    gb.write8(0xFF4C, 0x04);
    assert!(gb.cgb_compat());
    gb.write8(0xFF50, 0x01);
    assert!(gb.cgb_compat());
    assert_eq!(gb.read8(0xFF70), 0xFF);

    let mut late = with_boot_rom(HardwareType::Cgb, rom_image(0x00, 0x00, 2), vec![0x00; 0x900]);
    late.write8(0xFF50, 0x01);
    assert!(late.cgb_compat());
}

#[test]
fn rom_bank_switch_through_the_bus() {
    let mut gb = machine_with_rom(HardwareType::Dmg, rom_image(0x19, 0x00, 8));
    assert_eq!(gb.read8(0x4000), 1);
    gb.write8(0x2000, 0x05);
    assert_eq!(gb.read8(0x4000), 5);
    // Bank numbers wrap at the ROM size.
    gb.write8(0x2000, 0x0B);
    assert_eq!(gb.read8(0x4000), 3);
    assert_eq!(gb.cart.rom_bank(), 0x0B);
    assert_eq!(gb.read8(0x0000), 0);
}

#[test]
fn unmapped_io_reads_open_bus() {
    let mut gb = dmg();
    for addr in [0xFF03, 0xFF08, 0xFF27, 0xFF4C, 0xFF7F] {
        assert_eq!(gb.read8(addr), 0xFF, "{addr:04X}");
    }
}
