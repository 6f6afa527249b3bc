// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for WASM unit loading.
//!
//! This module contains message types for logging events related to:
//! * Searching the module path for a unit
//! * Loading, validating and rejecting units
//! * Retaining units that built a hub

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};

/// WASM unit loaded and validated.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use channel_hub::observability::messages::wasm::UnitLoaded;
///
/// let msg = UnitLoaded {
///     type_name: "ring",
///     unit_path: "/usr/lib/channel/channel_ring.wasm",
///     size_bytes: 4096,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct UnitLoaded<'a> {
    pub type_name: &'a str,
    pub unit_path: &'a str,
    pub size_bytes: usize,
}

impl Display for UnitLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded channel unit for '{}': {} ({} bytes)",
            self.type_name, self.unit_path, self.size_bytes
        )
    }
}

impl StructuredLog for UnitLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            type_name = self.type_name,
            unit_path = self.unit_path,
            size_bytes = self.size_bytes,
            "{}", self
        );
    }
}

/// No unit exists for a type name anywhere on the search path.
///
/// # Log Level
/// `debug!` - Expected during resolution fallback
pub struct UnitNotFound<'a> {
    pub type_name: &'a str,
    pub searched: usize,
}

impl Display for UnitNotFound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "No channel unit for '{}' in {} search directories",
            self.type_name, self.searched
        )
    }
}

impl StructuredLog for UnitNotFound<'_> {
    fn log(&self) {
        tracing::debug!(type_name = self.type_name, searched = self.searched, "{}", self);
    }
}

/// A unit was found but rejected and unloaded.
///
/// # Log Level
/// `warn!` - Failure requiring attention
pub struct UnitRejected<'a> {
    pub type_name: &'a str,
    pub unit_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for UnitRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unloading channel unit '{}' for '{}': {}",
            self.unit_path, self.type_name, self.error
        )
    }
}

impl StructuredLog for UnitRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            type_name = self.type_name,
            unit_path = self.unit_path,
            error = %self.error,
            "{}", self
        );
    }
}

/// A unit built its first hub and stays loaded for the life of the loader.
///
/// # Log Level
/// `info!` - Important operational event
pub struct UnitRetained<'a> {
    pub type_name: &'a str,
    pub retained_units: usize,
}

impl Display for UnitRetained<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Retaining channel unit '{}' ({} units retained)",
            self.type_name, self.retained_units
        )
    }
}

impl StructuredLog for UnitRetained<'_> {
    fn log(&self) {
        tracing::info!(
            type_name = self.type_name,
            retained_units = self.retained_units,
            "{}", self
        );
    }
}
