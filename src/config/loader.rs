// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_FUEL_LEVEL, DEFAULT_MAX_STALLED_WRITES, DEFAULT_MODULE_DIR, MAX_FUEL_LEVEL,
    MIN_FUEL_LEVEL, MODULE_PATH_ENV,
};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for the channel layer.
///
/// Every section is optional; an empty document yields the defaults.
///
/// # Example
/// ```yaml
/// modules:
///   search_path: ["/usr/lib/channel-hub", "/opt/site/channels"]
///   fuel: 10000000
/// tee:
///   max_stalled_writes: 64
/// file:
///   create_missing: false
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChannelConfig {
    #[serde(default)]
    pub modules: ModuleConfig,
    #[serde(default)]
    pub tee: TeeConfig,
    #[serde(default)]
    pub file: FileConfig,
}

/// Where and how dynamically loaded channel units run.
///
/// # Fields
/// * `search_path` - Directories searched in order for `channel_<type>.wasm` (optional)
/// * `fuel` - Instruction budget per call into a unit (optional)
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ModuleConfig {
    pub search_path: Option<Vec<PathBuf>>,
    pub fuel: Option<u64>,
}

impl ModuleConfig {
    /// Configured search path, or the default directory followed by any
    /// directories named in `CHANNEL_HUB_MODULE_PATH`.
    pub fn get_search_path(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.search_path {
            return path.clone();
        }

        let mut path = vec![PathBuf::from(DEFAULT_MODULE_DIR)];
        if let Ok(extra) = std::env::var(MODULE_PATH_ENV) {
            path.extend(
                extra
                    .split(':')
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from),
            );
        }
        path
    }

    pub fn get_fuel(&self) -> u64 {
        self.fuel.unwrap_or(DEFAULT_FUEL_LEVEL)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TeeConfig {
    pub max_stalled_writes: Option<u32>,
}

impl TeeConfig {
    pub fn get_max_stalled_writes(&self) -> u32 {
        self.max_stalled_writes.unwrap_or(DEFAULT_MAX_STALLED_WRITES)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    /// Create missing files when opening them writable.
    #[serde(default)]
    pub create_missing: bool,
}

impl ChannelConfig {
    /// Check every configured value against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if let Some(path) = &self.modules.search_path {
            for (index, dir) in path.iter().enumerate() {
                if dir.as_os_str().is_empty() {
                    problems.push(format!("modules.search_path[{}] is empty", index));
                }
            }
        }

        if let Some(fuel) = self.modules.fuel {
            if !(MIN_FUEL_LEVEL..=MAX_FUEL_LEVEL).contains(&fuel) {
                problems.push(format!(
                    "modules.fuel {} is outside [{}, {}]",
                    fuel, MIN_FUEL_LEVEL, MAX_FUEL_LEVEL
                ));
            }
        }

        if self.tee.max_stalled_writes == Some(0) {
            problems.push("tee.max_stalled_writes must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }
}

/// Load a config from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ChannelConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        Some("toml") => Ok(toml::from_str(&content)?),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load a config and reject out-of-range values.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<ChannelConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_basic_yaml_config() {
        let yaml = r#"
modules:
  search_path: ["/opt/channels"]
  fuel: 2000000
tee:
  max_stalled_writes: 8
"#;

        let cfg: ChannelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cfg.modules.get_search_path(),
            vec![PathBuf::from("/opt/channels")]
        );
        assert_eq!(cfg.modules.get_fuel(), 2_000_000);
        assert_eq!(cfg.tee.get_max_stalled_writes(), 8);
        assert!(!cfg.file.create_missing);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg: ChannelConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, ChannelConfig::default());
        assert_eq!(cfg.modules.get_fuel(), DEFAULT_FUEL_LEVEL);
        assert_eq!(cfg.tee.get_max_stalled_writes(), DEFAULT_MAX_STALLED_WRITES);
    }

    #[test]
    fn test_load_toml_config() {
        let file = write_config(
            ".toml",
            "[file]\ncreate_missing = true\n\n[modules]\nfuel = 1000000\n",
        );
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert!(cfg.file.create_missing);
        assert_eq!(cfg.modules.get_fuel(), 1_000_000);
    }

    #[test]
    fn test_load_yaml_config() {
        let file = write_config(".yaml", "tee:\n  max_stalled_writes: 3\n");
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.tee.get_max_stalled_writes(), 3);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let file = write_config(".ini", "fuel=1");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let yaml = r#"
modules:
  search_path: [""]
  fuel: 5
tee:
  max_stalled_writes: 0
"#;
        let cfg: ChannelConfig = serde_yaml::from_str(yaml).unwrap();
        match cfg.validate() {
            Err(ConfigError::Validation(problems)) => assert_eq!(problems.len(), 3),
            other => panic!("Expected validation failure, got {:?}", other),
        }
    }
}
