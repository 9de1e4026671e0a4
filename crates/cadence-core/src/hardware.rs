use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
/// Console model being emulated.
///
/// The model picks the bus dispatch family (DMG or CGB), the post-boot
/// register state used when no boot ROM is supplied and a handful of
/// model-specific quirks.
pub enum HardwareType {
    #[default]
    Dmg,
    Mgb,
    Sgb,
    Sgb2,
    Cgb,
    Agb,
}

impl HardwareType {
    pub const ALL: [HardwareType; 6] = [
        HardwareType::Dmg,
        HardwareType::Mgb,
        HardwareType::Sgb,
        HardwareType::Sgb2,
        HardwareType::Cgb,
        HardwareType::Agb,
    ];

    #[inline]
    /// Returns whether the model decodes the CGB register and banking set.
    pub const fn is_cgb_family(self) -> bool {
        matches!(self, HardwareType::Cgb | HardwareType::Agb)
    }

    #[inline]
    pub const fn is_sgb_family(self) -> bool {
        matches!(self, HardwareType::Sgb | HardwareType::Sgb2)
    }

    #[inline]
    /// Returns whether writing STAT can raise a spurious STAT interrupt.
    pub const fn has_stat_write_bug(self) -> bool {
        !self.is_cgb_family()
    }

    /// Pick a model from the cartridge header: the CGB flag at 0x143 wins,
    /// then the SGB flag at 0x146, otherwise DMG.
    pub fn detect(rom: &[u8]) -> HardwareType {
        let cgb_flag = rom.get(0x143).copied().unwrap_or(0);
        let sgb_flag = rom.get(0x146).copied().unwrap_or(0);
        if cgb_flag & 0x80 != 0 {
            HardwareType::Cgb
        } else if sgb_flag == 0x03 {
            HardwareType::Sgb
        } else {
            HardwareType::Dmg
        }
    }

    /// Register state left behind by this model's boot ROM.
    pub fn boot_state(self) -> &'static BootState {
        match self {
            HardwareType::Dmg => &DMG_BOOT,
            HardwareType::Mgb => &MGB_BOOT,
            HardwareType::Sgb => &SGB_BOOT,
            HardwareType::Sgb2 => &SGB2_BOOT,
            HardwareType::Cgb => &CGB_BOOT,
            HardwareType::Agb => &AGB_BOOT,
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HardwareType::Dmg => "dmg",
            HardwareType::Mgb => "mgb",
            HardwareType::Sgb => "sgb",
            HardwareType::Sgb2 => "sgb2",
            HardwareType::Cgb => "cgb",
            HardwareType::Agb => "agb",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hardware type `{0}`")]
pub struct UnknownHardware(pub String);

impl FromStr for HardwareType {
    type Err = UnknownHardware;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dmg" | "gb" => Ok(HardwareType::Dmg),
            "mgb" | "pocket" => Ok(HardwareType::Mgb),
            "sgb" => Ok(HardwareType::Sgb),
            "sgb2" => Ok(HardwareType::Sgb2),
            "cgb" | "gbc" => Ok(HardwareType::Cgb),
            "agb" | "gba" => Ok(HardwareType::Agb),
            other => Err(UnknownHardware(other.to_string())),
        }
    }
}

/// Parse a user-supplied model name. `auto` and unknown names yield `None`
/// so the caller falls back to header detection; unknown names are logged.
pub fn parse_preference(name: &str) -> Option<HardwareType> {
    if name.trim().eq_ignore_ascii_case("auto") {
        return None;
    }
    match name.parse() {
        Ok(hw) => Some(hw),
        Err(err) => {
            log::warn!("{err}; falling back to cartridge header detection");
            None
        }
    }
}

/// CPU registers and I/O state after the boot ROM hands over at 0x0100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootState {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    /// Internal 16-bit divider. DIV reads the upper byte.
    pub sys_clocks: u16,
    pub lcdc: u8,
    pub bgp: u8,
    pub if_reg: u8,
}

const DMG_BOOT: BootState = BootState {
    a: 0x01,
    f: 0xB0,
    b: 0x00,
    c: 0x13,
    d: 0x00,
    e: 0xD8,
    h: 0x01,
    l: 0x4D,
    sp: 0xFFFE,
    pc: 0x0100,
    sys_clocks: 0xABCC,
    lcdc: 0x91,
    bgp: 0xFC,
    if_reg: 0xE1,
};

const MGB_BOOT: BootState = BootState { a: 0xFF, ..DMG_BOOT };

const SGB_BOOT: BootState = BootState {
    a: 0x01,
    f: 0x00,
    b: 0x00,
    c: 0x14,
    d: 0x00,
    e: 0x00,
    h: 0xC0,
    l: 0x60,
    ..DMG_BOOT
};

const SGB2_BOOT: BootState = BootState { a: 0xFF, ..SGB_BOOT };

const CGB_BOOT: BootState = BootState {
    a: 0x11,
    f: 0x80,
    b: 0x00,
    c: 0x00,
    d: 0xFF,
    e: 0x56,
    h: 0x00,
    l: 0x0D,
    sp: 0xFFFE,
    pc: 0x0100,
    sys_clocks: 0x1EA0,
    lcdc: 0x91,
    bgp: 0xFC,
    if_reg: 0xE1,
};

const AGB_BOOT: BootState = BootState {
    f: 0x00,
    b: 0x01,
    ..CGB_BOOT
};

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cgb: u8, sgb: u8) -> Vec<u8> {
        let mut rom = vec![0; 0x150];
        rom[0x143] = cgb;
        rom[0x146] = sgb;
        rom
    }

    #[test]
    fn detect_prefers_cgb_flag() {
        assert_eq!(HardwareType::detect(&header(0x80, 0x03)), HardwareType::Cgb);
        assert_eq!(HardwareType::detect(&header(0xC0, 0x00)), HardwareType::Cgb);
        assert_eq!(HardwareType::detect(&header(0x00, 0x03)), HardwareType::Sgb);
        assert_eq!(HardwareType::detect(&header(0x00, 0x00)), HardwareType::Dmg);
        assert_eq!(HardwareType::detect(&[]), HardwareType::Dmg);
    }

    #[test]
    fn unknown_preference_falls_back_to_detection() {
        assert_eq!(parse_preference("auto"), None);
        assert_eq!(parse_preference("virtual-boy"), None);
        assert_eq!(parse_preference("GBC"), Some(HardwareType::Cgb));
    }

    #[test]
    fn names_round_trip_through_display() {
        for hw in HardwareType::ALL {
            assert_eq!(hw.to_string().parse::<HardwareType>(), Ok(hw));
        }
    }
}
