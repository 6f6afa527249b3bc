// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output and
//! [`StructuredLog`] to emit the same event with typed fields.
//!
//! # Organization
//!
//! * `hub` - Hub and channel lifecycle
//! * `resolution` - Typed resolution and composite construction
//! * `wasm` - Dynamically loaded channel units
//! * `backends` - File, query, tee and broadcast events
//!
//! # Usage Pattern
//!
//! ```rust
//! use channel_hub::observability::messages::hub::HubCreated;
//! use channel_hub::observability::messages::StructuredLog;
//!
//! HubCreated {
//!     class: "tee",
//!     name: "@file:/tmp/a@file:/tmp/b",
//!     children: 2,
//! }
//! .log();
//! ```

pub mod backends;
pub mod hub;
pub mod resolution;
pub mod wasm;

use tracing::Span;

/// Emit a message as a structured `tracing` event.
pub trait StructuredLog {
    /// Log the event at the message's level with its fields attached.
    fn log(&self);

    /// A span carrying the message's identifying fields.
    fn span(&self, _name: &str) -> Span {
        Span::none()
    }
}
