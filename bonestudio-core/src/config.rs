//! Tool configuration, read from YAML. Every field is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRESET_FILE: &str = "DynamicBonesPresets.cfg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Preset file of the avatar project.
    pub preset_file: PathBuf,
    /// Write built-in presets into the store when they are missing.
    pub seed_defaults: bool,
    /// Also search outside the head bone when the head has no hair child.
    pub hair_fallback_whole_rig: bool,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            preset_file: PathBuf::from(DEFAULT_PRESET_FILE),
            seed_defaults: true,
            hair_fallback_whole_rig: false,
        }
    }
}

pub fn load_from_yaml_str(s: &str) -> Result<StudioConfig> {
    let cfg: StudioConfig = serde_yaml::from_str(s)?;
    Ok(cfg)
}

pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<StudioConfig> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    load_from_yaml_str(&data).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = load_from_yaml_str("preset_file: Assets/Kaori/presets.cfg\n").unwrap();
        assert_eq!(cfg.preset_file, PathBuf::from("Assets/Kaori/presets.cfg"));
        assert!(cfg.seed_defaults);
        assert!(!cfg.hair_fallback_whole_rig);
    }

    #[test]
    fn unknown_types_are_errors() {
        assert!(load_from_yaml_str("seed_defaults: maybe\n").is_err());
    }
}
