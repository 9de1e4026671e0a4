//! Event-driven timing and bus-dispatch core for Game Boy and Game Boy Color
//! emulation.
//!
//! Every clocked subsystem keeps a lagging clock counter and is brought up to
//! the CPU's clock lazily, right before a bus access observes it or when the
//! scheduler's event horizon is reached.

/// Sound register file, frame sequencer and sample snapshot.
pub mod apu;
/// Cartridge header, save data and memory bank controllers.
pub mod cartridge;
/// Shared clock reference and the reconciliation contract.
pub mod clock;
/// Machine configuration.
pub mod config;
/// CPU collaborator contract and bus-driving executors.
pub mod cpu;
/// Once-only diagnostic reporting.
pub mod diagnostics;
/// OAM DMA and CGB general/HBlank DMA.
pub mod dma;
/// Global machine state and the outer emulation loop.
pub mod gameboy;
/// Hardware models and post-boot state.
pub mod hardware;
/// Joypad input register.
pub mod input;
/// Interrupt flags, master enable and halt state.
pub mod interrupts;
/// I/O register handlers.
mod io;
/// Memory regions and bus dispatch tables.
pub mod mmu;
/// Pixel-processing unit timing.
pub mod ppu;
/// Event horizon scheduling.
pub mod scheduler;
/// Serial link.
pub mod serial;
/// Timer and divider.
pub mod timer;

pub use gameboy::GameBoy;
