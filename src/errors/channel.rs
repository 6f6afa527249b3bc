// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error type shared by every hub, channel and backend operation.
//!
//! The variants follow the taxonomy the host translator cares about:
//! resource exhaustion, capability mismatch, direction violations, the
//! recoverable not-found signal that drives the loader fallback, module
//! corruption and naming ambiguity. Every variant converts into an
//! [`std::io::Error`] so the host can surface it as an ordinary I/O error.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by the channel layer.
///
/// `Clone` is required because a single broadcast round result is handed to
/// every participant of the round.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// Allocation or another bounded resource ran out.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The resolved class does not provide the requested operation or flag.
    #[error("Class '{class}' does not support {operation}")]
    Unsupported {
        class: String,
        operation: &'static str,
    },

    /// The channel's direction flags forbid the operation.
    #[error("Permission denied: cannot {operation} on this channel")]
    PermissionDenied { operation: &'static str },

    /// Nothing answers to this name. Recoverable during typed resolution.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A loaded unit lacks its expected symbol or exports.
    #[error("Module '{module}' is corrupt: {reason}")]
    CorruptModule { module: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Every candidate separator collides with a child name.
    #[error("No separator available to name the children of this hub")]
    Unnameable,

    /// A tee child kept accepting zero bytes.
    #[error("Child {child} accepted no data after {attempts} attempts")]
    WriteStalled { child: usize, attempts: u32 },

    /// The channel outlived the hub it was opened on.
    #[error("Hub backing this channel has been freed")]
    HubFreed,

    /// Runtime failure inside a dynamically loaded unit.
    #[error("Module runtime error: {0}")]
    Module(String),

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl ChannelError {
    pub fn unsupported(class: &str, operation: &'static str) -> Self {
        ChannelError::Unsupported {
            class: class.to_string(),
            operation,
        }
    }

    /// True for the recoverable "not found" signal.
    pub fn is_not_found(&self) -> bool {
        match self {
            ChannelError::NotFound(_) => true,
            ChannelError::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Underlying I/O error kind, if this wraps one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ChannelError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::OutOfMemory => ChannelError::ResourceExhausted(err.to_string()),
            _ => ChannelError::Io(Arc::new(err)),
        }
    }
}

impl From<ChannelError> for io::Error {
    fn from(err: ChannelError) -> Self {
        let kind = match &err {
            ChannelError::ResourceExhausted(_) => io::ErrorKind::OutOfMemory,
            ChannelError::Unsupported { .. } => io::ErrorKind::Unsupported,
            ChannelError::PermissionDenied { .. } => io::ErrorKind::PermissionDenied,
            ChannelError::NotFound(_) => io::ErrorKind::NotFound,
            ChannelError::CorruptModule { .. } => io::ErrorKind::InvalidData,
            ChannelError::InvalidArgument(_) | ChannelError::Unnameable => {
                io::ErrorKind::InvalidInput
            }
            ChannelError::WriteStalled { .. } => io::ErrorKind::WriteZero,
            ChannelError::HubFreed => io::ErrorKind::BrokenPipe,
            ChannelError::Module(_) => io::ErrorKind::Other,
            ChannelError::Io(inner) => {
                return io::Error::new(inner.kind(), inner.to_string());
            }
        };
        io::Error::new(kind, err)
    }
}

/// Result alias used throughout the crate.
pub type ChannelResult<T> = Result<T, ChannelError>;
