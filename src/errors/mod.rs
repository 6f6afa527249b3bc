// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod channel;
mod config;

pub use channel::{ChannelError, ChannelResult};
pub use config::ConfigError;
