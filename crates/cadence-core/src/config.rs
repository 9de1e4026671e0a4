use crate::hardware::HardwareType;

/// Options fixed when a machine is built.
#[derive(Debug, Clone, Default)]
pub struct MachineConfig {
    /// `None` detects the model from the cartridge header.
    pub hardware: Option<HardwareType>,
    /// Block CPU VRAM access while the PPU is transferring pixels.
    pub strict_vram_checks: bool,
    /// Boot ROM image. Without one the machine starts at 0x0100 with the
    /// model's post-boot register state.
    pub boot_rom: Option<Vec<u8>>,
}

impl MachineConfig {
    pub fn resolve_hardware(&self, rom: &[u8]) -> HardwareType {
        self.hardware.unwrap_or_else(|| HardwareType::detect(rom))
    }
}
