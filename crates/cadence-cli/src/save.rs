use cadence_core::cartridge::Cartridge;
use log::{info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Battery RAM and RTC files kept next to a ROM (`game.gb` -> `game.sav`,
/// `game.rtc`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFiles {
    pub ram: PathBuf,
    pub rtc: PathBuf,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn keeps_ram(cart: &Cartridge) -> bool {
    cart.header().battery && !cart.ram().is_empty()
}

impl SaveFiles {
    pub fn for_rom(rom: &Path) -> Self {
        Self {
            ram: rom.with_extension("sav"),
            rtc: rom.with_extension("rtc"),
        }
    }

    /// Restore saved RAM and clock state. Missing files are not an error; a
    /// saved clock is advanced by the wall time since it was written.
    pub fn load(&self, cart: &mut Cartridge) {
        self.load_at(cart, unix_now());
    }

    fn load_at(&self, cart: &mut Cartridge, now: u64) {
        if keeps_ram(cart) {
            match std::fs::read(&self.ram) {
                Ok(data) => match cart.load_ram(&data) {
                    Ok(()) => info!("Loaded battery RAM from {}", self.ram.display()),
                    Err(e) => warn!("Ignoring {}: {e}", self.ram.display()),
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to read {}: {e}", self.ram.display()),
            }
        }

        if cart.has_rtc() {
            match std::fs::read(&self.rtc) {
                Ok(data) => match cart.load_rtc_block(&data) {
                    Ok(stamp) => {
                        let elapsed = now.saturating_sub(stamp);
                        cart.advance_rtc_seconds(elapsed);
                        info!("Loaded RTC from {} ({elapsed}s elapsed)", self.rtc.display());
                    }
                    Err(e) => warn!("Ignoring {}: {e}", self.rtc.display()),
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to read {}: {e}", self.rtc.display()),
            }
        }
    }

    pub fn store(&self, cart: &Cartridge) -> io::Result<()> {
        self.store_at(cart, unix_now())
    }

    fn store_at(&self, cart: &Cartridge, now: u64) -> io::Result<()> {
        if keeps_ram(cart) {
            std::fs::write(&self.ram, cart.ram())?;
        }
        if let Some(block) = cart.rtc_block(now) {
            std::fs::write(&self.rtc, block)?;
        }
        Ok(())
    }
}
