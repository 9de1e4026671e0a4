use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// Model name (`dmg`, `cgb`, ...). Missing or `auto` detects from the header.
    pub hardware: Option<String>,
    pub boot_rom: Option<PathBuf>,
    pub strict_vram_checks: bool,
    pub frames: Option<u64>,
    pub script: Option<PathBuf>,
    /// Skip writing `.sav` / `.rtc` files on exit.
    pub read_only_saves: bool,
}

pub fn load_from_file(path: &Path) -> RunConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to read run config {}: {e}; using defaults", path.display());
            return RunConfig::default();
        }
    };

    match toml::from_str::<RunConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse run config {}: {e}; using defaults",
                path.display()
            );
            RunConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &RunConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).unwrap_or_else(|_| String::new());
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn kebab_case_keys_and_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            "hardware = \"cgb\"\nstrict-vram-checks = true\nframes = 120\n",
        )
        .unwrap();

        let cfg = load_from_file(&path);
        assert_eq!(cfg.hardware.as_deref(), Some("cgb"));
        assert!(cfg.strict_vram_checks);
        assert_eq!(cfg.frames, Some(120));
        assert_eq!(cfg.boot_rom, None);
        assert!(!cfg.read_only_saves);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "frames = \"lots\"").unwrap();
        assert_eq!(load_from_file(&path), RunConfig::default());
        assert_eq!(load_from_file(&dir.path().join("missing.toml")), RunConfig::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("run.toml");
        let cfg = RunConfig {
            hardware: Some("sgb2".into()),
            boot_rom: Some(PathBuf::from("boot/dmg.bin")),
            script: Some(PathBuf::from("probe.txt")),
            read_only_saves: true,
            ..RunConfig::default()
        };
        save_to_file(&path, &cfg).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("boot-rom"));
        assert_eq!(load_from_file(&path), cfg);
    }
}
