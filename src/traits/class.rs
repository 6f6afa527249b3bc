// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The [`ChannelClass`] trait: the capability set implementing a backend type.
//!
//! `read` and `write` are required for every class. Every other slot is
//! optional and only invoked by the core when the class advertises it through
//! [`ChannelClass::hooks`]. A slot that is not advertised behaves exactly as if
//! it were missing, whatever its default body does.

use std::ops::BitOr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::control::{ControlReply, ControlRequest};
use crate::core::{Channel, ChannelFlags, Hub, HubNode};
use crate::errors::{ChannelError, ChannelResult};
use crate::registry::Resolver;

/// Shared handle to a channel class.
pub type ClassRef = Arc<dyn ChannelClass>;

/// Optional slots a class provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hooks(u16);

impl Hooks {
    pub const NONE: Self = Self(0);
    pub const FLUSH: Self = Self(1 << 0);
    pub const OPEN: Self = Self(1 << 1);
    pub const CLOSE: Self = Self(1 << 2);
    pub const SET_FLAGS: Self = Self(1 << 3);
    pub const CLEAR_FLAGS: Self = Self(1 << 4);
    pub const SET_HUB_FLAGS: Self = Self(1 << 5);
    pub const CLEAR_HUB_FLAGS: Self = Self(1 << 6);
    pub const CLEAR_HUB: Self = Self(1 << 7);
    pub const CREATE_HUB: Self = Self(1 << 8);
    pub const CONTROL: Self = Self(1 << 9);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Hooks {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[async_trait]
pub trait ChannelClass: Send + Sync {
    /// Type name used in `TYPE:NAME` references.
    fn name(&self) -> &str;

    fn hooks(&self) -> Hooks {
        Hooks::NONE
    }

    /// Read up to `amount` bytes.
    async fn read(&self, channel: &mut Channel, amount: usize) -> ChannelResult<Vec<u8>>;

    /// Write `buf`, returning how many bytes were accepted.
    async fn write(&self, channel: &mut Channel, buf: &[u8]) -> ChannelResult<usize>;

    async fn flush(&self, _channel: &mut Channel) -> ChannelResult<()> {
        Err(ChannelError::unsupported(self.name(), "flush"))
    }

    /// Per-open setup; runs after the channel's effective flags are computed.
    async fn open(&self, _channel: &mut Channel) -> ChannelResult<()> {
        Ok(())
    }

    /// Per-open teardown. Errors are logged by the core, never returned.
    async fn close(&self, _channel: &mut Channel) -> ChannelResult<()> {
        Ok(())
    }

    /// Set backend-specific bits on an open channel.
    fn set_flags(&self, _channel: &mut Channel, _flags: ChannelFlags) -> ChannelResult<()> {
        Err(ChannelError::unsupported(self.name(), "channel flags"))
    }

    fn clear_flags(&self, _channel: &mut Channel, _flags: ChannelFlags) -> ChannelResult<()> {
        Err(ChannelError::unsupported(self.name(), "channel flags"))
    }

    /// Set backend-specific bits on a hub. Only called with bits not yet set.
    fn set_hub_flags(&self, _hub: &HubNode, _flags: ChannelFlags) -> ChannelResult<()> {
        Err(ChannelError::unsupported(self.name(), "hub flags"))
    }

    /// Clear backend-specific bits on a hub. Only called with bits currently set.
    fn clear_hub_flags(&self, _hub: &HubNode, _flags: ChannelFlags) -> ChannelResult<()> {
        Err(ChannelError::unsupported(self.name(), "hub flags"))
    }

    /// Release class-private hub resources before the hub is freed.
    fn clear_hub(&self, _hub: &HubNode) {}

    /// Build a hub from the argument text of a `TYPE:NAME` reference.
    fn create_hub(
        self: Arc<Self>,
        _resolver: &Resolver,
        _name: &str,
        _flags: ChannelFlags,
        _candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        Err(ChannelError::unsupported(self.name(), "create_hub"))
    }

    /// Handle an out-of-band control request addressed to `channel`.
    async fn control(
        &self,
        _channel: &mut Channel,
        _request: &ControlRequest,
    ) -> ChannelResult<ControlReply> {
        Err(ChannelError::unsupported(self.name(), "control"))
    }
}
