// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // file, query, tee, broadcast, wasm units
pub mod config;     // channel layer configuration
pub mod control;    // control request dispatch
pub mod core;       // hubs, channels, flags
pub mod engine;     // hub tree composition
pub mod errors;     // error handling
pub mod observability;
pub mod registry;   // class lookup + typed resolution
pub mod traits;     // the channel class abstraction

pub use crate::core::{Channel, ChannelFlags, Hub, HubRef};
pub use errors::{ChannelError, ChannelResult};
pub use registry::Resolver;
