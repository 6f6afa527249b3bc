// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Primitive object model: hubs, channels and their flags.

mod channel;
mod flags;
mod hub;

pub use channel::{Channel, ChannelState};
pub use flags::ChannelFlags;
pub use hub::{Hub, HubHook, HubNode, HubRef};
