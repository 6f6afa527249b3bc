// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the built-in backends (file, query, tee, broadcast).

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A read+write file open was narrowed after a permission failure.
///
/// # Log Level
/// `info!` - Behavior differs from what was asked
pub struct FileOpenNarrowed<'a> {
    pub path: &'a str,
    pub mode: &'a str,
}

impl Display for FileOpenNarrowed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Opened '{}' {} after read-write was denied", self.path, self.mode)
    }
}

impl StructuredLog for FileOpenNarrowed<'_> {
    fn log(&self) {
        tracing::info!(path = self.path, mode = self.mode, "{}", self);
    }
}

/// The resource could not supply a hub itself; a file hub is used instead.
pub struct FetchFellBack<'a> {
    pub resource: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for FetchFellBack<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resource '{}' exposes no hub ({}), using it as a file",
            self.resource, self.error
        )
    }
}

impl StructuredLog for FetchFellBack<'_> {
    fn log(&self) {
        tracing::debug!(resource = self.resource, error = %self.error, "{}", self);
    }
}

/// A tee child failed a write or flush.
///
/// # Log Level
/// `warn!` - Earlier children may already hold the data
pub struct TeeChildFailed<'a> {
    pub operation: &'a str,
    pub child: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for TeeChildFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Tee {} failed on child {}: {}",
            self.operation, self.child, self.error
        )
    }
}

impl StructuredLog for TeeChildFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            operation = self.operation,
            child = self.child,
            error = %self.error,
            "{}", self
        );
    }
}

/// One broadcast barrier round finished.
///
/// # Log Level
/// `debug!` - Per-round detail
///
/// # Example
/// ```
/// use channel_hub::observability::messages::backends::BroadcastRound;
/// use channel_hub::observability::messages::StructuredLog;
///
/// let msg = BroadcastRound {
///     generation: 3,
///     participants: 2,
///     amount: 4096,
///     bytes: Some(512),
/// };
///
/// msg.log();
/// ```
pub struct BroadcastRound {
    pub generation: u64,
    pub participants: usize,
    pub amount: usize,
    /// `None` when the upstream read failed.
    pub bytes: Option<usize>,
}

impl Display for BroadcastRound {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.bytes {
            Some(bytes) => write!(
                f,
                "Broadcast round {}: {} participants, asked {} bytes, got {}",
                self.generation, self.participants, self.amount, bytes
            ),
            None => write!(
                f,
                "Broadcast round {}: upstream read of {} bytes failed for {} participants",
                self.generation, self.amount, self.participants
            ),
        }
    }
}

impl StructuredLog for BroadcastRound {
    fn log(&self) {
        tracing::debug!(
            generation = self.generation,
            participants = self.participants,
            amount = self.amount,
            bytes = self.bytes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "broadcast_round",
            span_name = name,
            generation = self.generation,
            participants = self.participants,
        )
    }
}

/// The shared upstream channel opened or closed with the participant count.
pub struct BroadcastUpstream<'a> {
    pub event: &'a str,
    pub participants: usize,
}

impl Display for BroadcastUpstream<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Broadcast upstream {} ({} participants)",
            self.event, self.participants
        )
    }
}

impl StructuredLog for BroadcastUpstream<'_> {
    fn log(&self) {
        tracing::debug!(event = self.event, participants = self.participants, "{}", self);
    }
}

/// A control request reached a port with no handler for it.
///
/// # Log Level
/// `debug!` - Expected when a port hosts several request families
pub struct ControlUnhandled<'a> {
    pub port: u64,
    pub code: u32,
    pub reason: &'a str,
}

impl Display for ControlUnhandled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Control request {} on port {} not handled: {}",
            self.code, self.port, self.reason
        )
    }
}

impl StructuredLog for ControlUnhandled<'_> {
    fn log(&self) {
        tracing::debug!(port = self.port, code = self.code, reason = self.reason, "{}", self);
    }
}
