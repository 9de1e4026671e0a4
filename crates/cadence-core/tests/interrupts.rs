mod common;

use cadence_core::cpu::{BusOp, ScriptExecutor};
use cadence_core::input::BUTTON_START;
use cadence_core::interrupts::{HaltMode, INT_JOYPAD, INT_STAT, INT_TIMER, INT_VBLANK};
use common::dmg;

#[test]
fn dispatch_pushes_pc_and_jumps_to_vector() {
    let mut gb = dmg();
    gb.cpu.pc = 0x1234;
    gb.cpu.sp = 0xD000;
    gb.interrupts.ime = true;
    gb.write8(0xFFFF, INT_TIMER);
    gb.write8(0xFF0F, INT_TIMER);

    let start = gb.cpu.clocks();
    assert_eq!(gb.handle_interrupts(), 20);
    assert_eq!(gb.cpu.clocks() - start, 20);
    assert_eq!(gb.cpu.pc, 0x0050);
    assert_eq!(gb.cpu.sp, 0xCFFE);
    assert_eq!(gb.read8(0xCFFF), 0x12);
    assert_eq!(gb.read8(0xCFFE), 0x34);
    assert!(!gb.interrupts.ime);
    assert_eq!(gb.read8(0xFF0F) & INT_TIMER, 0);
}

#[test]
fn highest_priority_source_wins() {
    let mut gb = dmg();
    gb.cpu.sp = 0xD000;
    gb.interrupts.ime = true;
    gb.write8(0xFFFF, 0x1F);
    gb.write8(0xFF0F, INT_JOYPAD | INT_STAT | INT_TIMER);
    gb.handle_interrupts();
    assert_eq!(gb.cpu.pc, 0x0048);
    assert_eq!(gb.interrupts.read_if() & 0x1F, INT_JOYPAD | INT_TIMER);
}

#[test]
fn push_onto_ie_cancels_dispatch() {
    let mut gb = dmg();
    gb.cpu.pc = 0x0042;
    gb.cpu.sp = 0x0000;
    gb.interrupts.ime = true;
    gb.write8(0xFFFF, INT_VBLANK);
    gb.write8(0xFF0F, INT_VBLANK);

    gb.handle_interrupts();
    // The high byte of PC (0x00) lands on IE and disables VBlank.
    assert_eq!(gb.interrupts.enable, 0x00);
    assert_eq!(gb.cpu.pc, 0x0000);
    assert_ne!(gb.read8(0xFF0F) & INT_VBLANK, 0);
}

#[test]
fn halt_exit_without_ime_costs_one_cycle() {
    let mut gb = dmg();
    gb.write8(0xFFFF, INT_TIMER);
    gb.cpu_halt();
    assert_eq!(gb.handle_interrupts(), 0);
    assert_eq!(gb.interrupts.halt, HaltMode::Halted);

    gb.write8(0xFF0F, INT_TIMER);
    let pc = gb.cpu.pc;
    assert_eq!(gb.handle_interrupts(), 4);
    assert_eq!(gb.interrupts.halt, HaltMode::Running);
    assert_eq!(gb.cpu.pc, pc);
    assert_ne!(gb.read8(0xFF0F) & INT_TIMER, 0);
}

#[test]
fn stop_ignores_interrupts_until_a_button_press() {
    let mut gb = dmg();
    gb.interrupts.ime = true;
    gb.write8(0xFFFF, INT_VBLANK | INT_JOYPAD);
    gb.cpu_stop();
    assert_eq!(gb.interrupts.halt, HaltMode::Stopped);
    assert_eq!(gb.handle_interrupts(), 0);

    gb.write8(0xFF00, 0x10);
    gb.set_buttons(BUTTON_START);
    assert_eq!(gb.interrupts.halt, HaltMode::Running);
    assert_ne!(gb.interrupts.read_if() & INT_JOYPAD, 0);
}

#[test]
fn enabled_interrupt_ends_an_instruction_burst() {
    let mut gb = dmg();
    gb.cpu.sp = 0xD000;
    gb.cpu.pc = 0x4000;
    gb.interrupts.ime = true;
    let mut exec = ScriptExecutor::new(vec![
        BusOp::Write(0xFFFF, INT_VBLANK),
        BusOp::Idle(4),
        BusOp::Idle(4),
    ]);
    // IF already has VBlank from the post-boot state, so dispatch happens
    // right after the IE write.
    gb.run_for(&mut exec, 32);
    assert!(!gb.interrupts.ime);
    assert_eq!(gb.read8(0xCFFF), 0x40);
    assert_eq!(gb.read8(0xCFFE), 0x00);
}
