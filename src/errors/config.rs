// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating a [`crate::config::ChannelConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file extension does not name a supported format.
    #[error("Unsupported config format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// One or more values are out of range.
    #[error("Configuration validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
}
