// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for WASM unit loading and execution.
//!
//! Loading distinguishes a unit that cannot be loaded at all (the caller may
//! fall back to other interpretations of the name) from a unit that loads but
//! breaks the channel ABI. Both convert into [`ChannelError`].

use crate::errors::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WasmError {
    /// No unit file for the type on the search path.
    #[error("No channel unit for '{0}'")]
    NotFound(String),

    /// The unit file exists but could not be read or compiled.
    #[error("Channel unit '{path}' cannot be loaded: {reason}")]
    Unloadable { path: String, reason: String },

    /// The unit loaded but lacks a required export or has the wrong signature.
    #[error("Channel unit '{path}' is missing {export}")]
    MissingExport { path: String, export: String },

    /// Memory allocation or access error in the unit's linear memory.
    #[error("Memory error: {0}")]
    MemoryError(String),

    /// The unit reported failure from a data-plane call.
    #[error("Unit call '{call}' failed with status {status}")]
    CallFailed { call: &'static str, status: i32 },

    /// Wasmtime runtime error, including fuel exhaustion.
    #[error("WASM execution error: {0}")]
    ExecutionError(#[from] wasmtime::Error),

    /// Wasmtime engine creation or configuration error.
    #[error("Engine creation error: {0}")]
    EngineError(String),
}

pub type WasmResult<T> = Result<T, WasmError>;

impl From<WasmError> for ChannelError {
    fn from(error: WasmError) -> Self {
        match error {
            WasmError::NotFound(_) | WasmError::Unloadable { .. } => {
                ChannelError::NotFound(error.to_string())
            }
            WasmError::MissingExport { path, export } => ChannelError::CorruptModule {
                module: path,
                reason: format!("missing {}", export),
            },
            other => ChannelError::Module(other.to_string()),
        }
    }
}
