// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Channel class implementations.
//!
//! # Available Backends
//!
//! ## File
//! Byte streams over host files, narrowing read-write opens when the host refuses them.
//!
//! ## Query
//! Asks an external [`query::HubFetcher`] whether a resource already exposes a hub,
//! falling back to a file hub for the same name.
//!
//! ## Tee
//! Hard write-only fan-out: every write is delivered in full to every child.
//!
//! ## Broadcast
//! Hard read-only barrier: all open participants share one upstream read per round.
//!
//! ## WASM
//! Classes loaded by name from `channel_<type>.wasm` units on the module search path.
//!
//! ## Stub Backend (Test-Only)
//! A counting class with scripted short writes and failures. NOT available in
//! production builds.
//!
//! # Example
//! ```rust,no_run
//! use channel_hub::{ChannelFlags, Resolver};
//!
//! # async fn run() -> channel_hub::ChannelResult<()> {
//! let resolver = Resolver::default();
//! let hub = resolver.resolve("tee:file:@/tmp/a.log@/tmp/b.log", ChannelFlags::NONE, None)?;
//! let mut channel = hub.open(ChannelFlags::NONE).await?;
//! channel.write(b"both files get this").await?;
//! channel.close().await;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod file;
pub mod query;
#[cfg(test)]
pub mod stub;
pub mod tee;
pub mod wasm;
