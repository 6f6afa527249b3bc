// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Diagnostic output throughout the crate goes through message structs in
//! [`messages`] rather than ad-hoc strings, so every event has a stable text
//! form and a stable set of fields.
//!
//! The library never installs a subscriber on its own. Hosts that have no
//! tracing setup of their own can call [`init_tracing`].

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or `default_filter`
/// when the variable is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
