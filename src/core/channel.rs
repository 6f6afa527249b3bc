// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Channels: open sessions on a hub.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::{ChannelFlags, HubNode, HubRef};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::hub::{ChannelCloseFailed, ChannelOpened};
use crate::observability::messages::StructuredLog;
use crate::traits::{ClassRef, Hooks};

/// Class-private per-open state.
pub type ChannelState = Box<dyn Any + Send + Sync>;

/// One open session bound to a hub.
///
/// The hub is referenced weakly: keeping a hub alive for as long as its
/// channels is the caller's job. Operations on a channel whose hub is gone
/// fail with [`ChannelError::HubFreed`] where they need the hub.
pub struct Channel {
    hub: Weak<HubNode>,
    class: ClassRef,
    flags: ChannelFlags,
    state: Option<ChannelState>,
    handle: Option<u64>,
}

impl Channel {
    pub(crate) async fn open(node: &Arc<HubNode>, flags: ChannelFlags) -> ChannelResult<Channel> {
        let effective = flags | (node.flags() & ChannelFlags::DIRECTION);
        if effective.contains(ChannelFlags::DIRECTION) {
            return Err(ChannelError::PermissionDenied {
                operation: "open a channel both read-only and write-only",
            });
        }

        let class = Arc::clone(node.class());
        let mut channel = Channel {
            hub: Arc::downgrade(node),
            class: Arc::clone(&class),
            flags: effective,
            state: None,
            handle: None,
        };

        if class.hooks().contains(Hooks::OPEN) {
            class.open(&mut channel).await?;
        }

        ChannelOpened {
            class: class.name(),
            requested: flags,
            effective: channel.flags,
        }
        .log();
        Ok(channel)
    }

    /// Strong view of the hub for the duration of an operation.
    pub fn hub(&self) -> ChannelResult<HubRef> {
        self.hub
            .upgrade()
            .map(HubRef::from_node)
            .ok_or(ChannelError::HubFreed)
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    /// Narrow the channel to `direction` after a backend opened in a reduced mode.
    pub fn restrict(&mut self, direction: ChannelFlags) {
        self.flags |= direction & ChannelFlags::DIRECTION;
    }

    pub fn handle(&self) -> Option<u64> {
        self.handle
    }

    pub fn set_handle(&mut self, handle: u64) {
        self.handle = Some(handle);
    }

    pub fn set_state<T: Any + Send + Sync>(&mut self, state: T) {
        self.state = Some(Box::new(state));
    }

    pub fn state<T: Any>(&self) -> ChannelResult<&T> {
        self.state
            .as_ref()
            .and_then(|state| state.downcast_ref::<T>())
            .ok_or_else(|| missing_state(&self.class))
    }

    pub fn state_mut<T: Any>(&mut self) -> ChannelResult<&mut T> {
        let class = &self.class;
        self.state
            .as_mut()
            .and_then(|state| state.downcast_mut::<T>())
            .ok_or_else(|| missing_state(class))
    }

    /// Remove and return the per-open state.
    pub fn take_state<T: Any>(&mut self) -> Option<T> {
        let state = self.state.take()?;
        match state.downcast::<T>() {
            Ok(state) => Some(*state),
            Err(state) => {
                self.state = Some(state);
                None
            }
        }
    }

    pub async fn read(&mut self, amount: usize) -> ChannelResult<Vec<u8>> {
        if self.flags.contains(ChannelFlags::WRITE_ONLY) {
            return Err(ChannelError::PermissionDenied { operation: "read" });
        }
        let class = Arc::clone(&self.class);
        class.read(self, amount).await
    }

    pub async fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        if self.flags.contains(ChannelFlags::READ_ONLY) {
            return Err(ChannelError::PermissionDenied { operation: "write" });
        }
        let class = Arc::clone(&self.class);
        class.write(self, buf).await
    }

    /// Flush buffered data. A class without a flush hook has nothing to flush.
    pub async fn flush(&mut self) -> ChannelResult<()> {
        let class = Arc::clone(&self.class);
        if !class.hooks().contains(Hooks::FLUSH) {
            return Ok(());
        }
        class.flush(self).await
    }

    /// Close the channel. Always frees it; hook failures are only logged.
    pub async fn close(mut self) {
        let class = Arc::clone(&self.class);
        if class.hooks().contains(Hooks::CLOSE) {
            if let Err(error) = class.close(&mut self).await {
                ChannelCloseFailed {
                    class: class.name(),
                    error: &error,
                }
                .log();
            }
        }
    }

    /// Set flags on this channel only.
    ///
    /// Generic bits are recorded directly; backend bits go through the class's
    /// `set_flags` hook.
    pub fn set_flags(&mut self, flags: ChannelFlags) -> ChannelResult<()> {
        if (self.flags | flags).contains(ChannelFlags::DIRECTION) {
            return Err(ChannelError::PermissionDenied {
                operation: "make a channel both read-only and write-only",
            });
        }

        let backend = flags.backend() - self.flags;
        if !backend.is_empty() {
            let class = Arc::clone(&self.class);
            if !class.hooks().contains(Hooks::SET_FLAGS) {
                return Err(ChannelError::unsupported(class.name(), "setting channel flags"));
            }
            class.set_flags(self, backend)?;
        }
        self.flags |= flags;
        Ok(())
    }

    /// Clear flags on this channel. Direction bits inherited from the hub stay.
    pub fn clear_flags(&mut self, flags: ChannelFlags) -> ChannelResult<()> {
        let floor = match self.hub.upgrade() {
            Some(node) => node.flags() & ChannelFlags::DIRECTION,
            None => ChannelFlags::NONE,
        };
        if flags.intersects(floor) {
            return Err(ChannelError::PermissionDenied {
                operation: "clear a direction flag enforced by the hub",
            });
        }

        let backend = flags.backend() & self.flags;
        if !backend.is_empty() {
            let class = Arc::clone(&self.class);
            if !class.hooks().contains(Hooks::CLEAR_FLAGS) {
                return Err(ChannelError::unsupported(class.name(), "clearing channel flags"));
            }
            class.clear_flags(self, backend)?;
        }
        self.flags = self.flags - flags;
        Ok(())
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("class", &self.class.name())
            .field("flags", &self.flags)
            .field("handle", &self.handle)
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

fn missing_state(class: &ClassRef) -> ChannelError {
    ChannelError::InvalidArgument(format!(
        "channel of class '{}' has no open state",
        class.name()
    ))
}
