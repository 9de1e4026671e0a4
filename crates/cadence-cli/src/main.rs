mod run_config;
mod save;
mod script;

use std::path::PathBuf;
use std::time::Instant;

use cadence_core::GameBoy;
use cadence_core::clock::CLOCKS_PER_SECOND;
use cadence_core::config::MachineConfig;
use cadence_core::cpu::{Executor, IdleExecutor, ScriptExecutor};
use cadence_core::hardware;
use clap::Parser;
use log::{info, warn};

use run_config::RunConfig;
use save::SaveFiles;

#[derive(Parser)]
#[command(about = "Headless Game Boy timing core runner")]
struct Args {
    /// Path to ROM file
    rom: Option<PathBuf>,

    /// Run configuration (TOML); command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective run configuration to this path and continue
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Console model: dmg, mgb, sgb, sgb2, cgb, agb or auto
    #[arg(long)]
    hardware: Option<String>,

    /// Path to boot ROM file
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Number of frames to run (default 60)
    #[arg(long)]
    frames: Option<u64>,

    /// Bus script to replay instead of idling
    #[arg(long)]
    script: Option<PathBuf>,

    /// Block CPU VRAM access during pixel transfer
    #[arg(long)]
    strict_vram: bool,

    /// Do not write battery RAM or RTC files on exit
    #[arg(long)]
    no_save: bool,

    /// Print serial output and timing once per emulated second
    #[arg(long)]
    debug: bool,
}

fn merge(args: &Args, file: RunConfig) -> RunConfig {
    RunConfig {
        hardware: args.hardware.clone().or(file.hardware),
        boot_rom: args.bootrom.clone().or(file.boot_rom),
        strict_vram_checks: args.strict_vram || file.strict_vram_checks,
        frames: args.frames.or(file.frames),
        script: args.script.clone().or(file.script),
        read_only_saves: args.no_save || file.read_only_saves,
    }
}

/// Wall time covered by `clocks` CPU clocks. Double-speed clocks take half
/// as long.
fn emulated_seconds(clocks: i32, double_speed: bool) -> f64 {
    let rate = CLOCKS_PER_SECOND << u32::from(double_speed);
    f64::from(clocks) / f64::from(rate)
}

fn main() {
    let args = Args::parse();
    let filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let file_cfg = args
        .config
        .as_deref()
        .map(run_config::load_from_file)
        .unwrap_or_default();
    let cfg = merge(&args, file_cfg);

    if let Some(path) = &args.write_config {
        if let Err(e) = run_config::save_to_file(path, &cfg) {
            eprintln!("Failed to write config {}: {e}", path.display());
        }
    }

    let Some(rom_path) = args.rom.clone() else {
        eprintln!("No ROM supplied");
        return;
    };

    let rom = match std::fs::read(&rom_path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            return;
        }
    };

    let boot_rom = cfg.boot_rom.as_ref().and_then(|path| match std::fs::read(path) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("Failed to load boot ROM {}: {e}; using post-boot state", path.display());
            None
        }
    });

    let machine = MachineConfig {
        hardware: cfg.hardware.as_deref().and_then(hardware::parse_preference),
        strict_vram_checks: cfg.strict_vram_checks,
        boot_rom,
    };

    let mut gb = match GameBoy::from_rom(rom, machine) {
        Ok(gb) => gb,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            return;
        }
    };

    let saves = SaveFiles::for_rom(&rom_path);
    saves.load(&mut gb.cart);

    let mut script = match &cfg.script {
        Some(path) => {
            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to read script {}: {e}", path.display());
                    return;
                }
            };
            match script::parse(&source) {
                Ok(ops) => Some(ScriptExecutor::new(ops)),
                Err(e) => {
                    eprintln!("Invalid script {}: {e}", path.display());
                    return;
                }
            }
        }
        None => None,
    };

    let frames = cfg.frames.unwrap_or(60);
    info!(
        "Running {} ({}, {:?} mapper) for {frames} frames",
        gb.cart.header().title,
        gb.hardware,
        gb.cart.kind()
    );

    let mut idle = IdleExecutor;
    let started = Instant::now();
    let mut clocks: u64 = 0;
    let mut emulated = 0.0;
    {
        let exec: &mut dyn Executor = match script.as_mut() {
            Some(s) => s,
            None => &mut idle,
        };
        for frame in 1..=frames {
            let double_speed = gb.double_speed();
            let ran = gb.run_frame(exec);
            clocks += ran as u64;
            emulated += emulated_seconds(ran, double_speed);
            if args.debug {
                for b in gb.serial.take_output() {
                    println!("[SERIAL] {:02X} '{}'", b, b as char);
                }
                if frame % 60 == 0 {
                    println!(
                        "[TIMING] frame {frame}: {} PPU frames, LY {}, double speed {}",
                        gb.ppu.frame_counter(),
                        gb.ppu.ly(),
                        gb.double_speed()
                    );
                }
            }
        }
    }
    let wall = started.elapsed();

    if let Some(script) = &script {
        for read in script.reads() {
            println!(
                "read {:04X} = {:02X} @ {}",
                read.addr, read.value, read.clock
            );
        }
        if !script.finished() {
            warn!("Script did not finish within {frames} frames");
        }
    }

    let serial = gb.serial.take_output();
    if !serial.is_empty() {
        println!("serial: {}", String::from_utf8_lossy(&serial));
    }

    println!(
        "{frames} frames, {clocks} clocks, {emulated:.3}s emulated in {:.3}s",
        wall.as_secs_f64()
    );

    if !cfg.read_only_saves {
        if let Err(e) = saves.store(&gb.cart) {
            eprintln!("Failed to write save data: {e}");
        }
    }
}
