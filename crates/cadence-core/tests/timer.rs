mod common;

use cadence_core::cpu::{BusOp, ScriptExecutor, ScriptRead};
use cadence_core::interrupts::INT_TIMER;
use common::{advance, dmg};

#[test]
fn div_reads_catch_up_lazily() {
    let mut gb = dmg();
    // Post-boot DMG divider is 0xABCC.
    assert_eq!(gb.read8(0xFF04), 0xAB);
    advance(&mut gb, 0x34);
    assert_eq!(gb.read8(0xFF04), 0xAC);
    advance(&mut gb, 0xFF);
    assert_eq!(gb.read8(0xFF04), 0xAC);
    advance(&mut gb, 1);
    assert_eq!(gb.read8(0xFF04), 0xAD);
}

#[test]
fn overflow_reloads_and_interrupts_four_clocks_late() {
    let mut gb = dmg();
    gb.write8(0xFF0F, 0x00);
    gb.write8(0xFF04, 0x00);
    gb.write8(0xFF06, 0x10);
    gb.write8(0xFF05, 0xFE);
    gb.write8(0xFF07, 0x05);

    gb.update_all();
    assert_eq!(gb.clocks_to_next_event(), 36);

    advance(&mut gb, 32);
    assert_eq!(gb.read8(0xFF05), 0x00);
    assert_eq!(gb.read8(0xFF0F) & INT_TIMER, 0);
    advance(&mut gb, 3);
    assert_eq!(gb.read8(0xFF05), 0x00);
    assert_eq!(gb.read8(0xFF0F) & INT_TIMER, 0);
    advance(&mut gb, 1);
    assert_eq!(gb.read8(0xFF05), 0x10);
    assert_ne!(gb.read8(0xFF0F) & INT_TIMER, 0);
}

#[test]
fn tima_write_during_overflow_window_cancels_reload() {
    let mut gb = dmg();
    gb.write8(0xFF0F, 0x00);
    gb.write8(0xFF04, 0x00);
    gb.write8(0xFF06, 0x10);
    gb.write8(0xFF05, 0xFF);
    gb.write8(0xFF07, 0x05);

    advance(&mut gb, 18);
    gb.write8(0xFF05, 0x42);
    advance(&mut gb, 64);
    assert_eq!(gb.read8(0xFF0F) & INT_TIMER, 0);
    // Four more edges at 32, 48, 64 and 80.
    assert_eq!(gb.read8(0xFF05), 0x46);
}

#[test]
fn div_write_with_selected_bit_high_ticks_tima() {
    let mut gb = dmg();
    gb.write8(0xFF04, 0x00);
    gb.write8(0xFF07, 0x05);
    gb.write8(0xFF05, 0x20);

    advance(&mut gb, 8);
    gb.write8(0xFF04, 0x00);
    assert_eq!(gb.read8(0xFF05), 0x21);

    advance(&mut gb, 4);
    gb.write8(0xFF04, 0x00);
    assert_eq!(gb.read8(0xFF05), 0x21);
}

#[test]
fn halted_cpu_wakes_on_timer_interrupt() {
    let mut gb = dmg();
    let mut exec = ScriptExecutor::new(vec![
        BusOp::Write(0xFFFF, 0x04),
        BusOp::Write(0xFF04, 0x00),
        BusOp::Write(0xFF06, 0x10),
        BusOp::Write(0xFF05, 0xFE),
        BusOp::Write(0xFF07, 0x05),
        BusOp::Halt,
        BusOp::Read(0xFF05),
    ]);

    gb.run_for(&mut exec, 64);

    // DIV is cleared at clock 4 and TAC written at 16. TIMA overflows on
    // divider count 32 and the interrupt lands 4 later, at clock 40. The
    // HALT exit takes one more machine cycle.
    assert!(exec.finished());
    assert_eq!(
        exec.reads(),
        &[ScriptRead {
            addr: 0xFF05,
            value: 0x10,
            clock: 44,
        }]
    );
}
