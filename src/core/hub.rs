// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Hubs: configured backend instances that produce channels.
//!
//! A [`Hub`] is the single owning handle of a [`HubNode`]. Children are owned
//! by their parent's node, so a hub tree is freed by dropping its root. The
//! node sits behind an `Arc` only so that channels can keep a `Weak` handle to
//! it; [`HubRef`] is the short-lived strong view handed out while an operation
//! is in flight and is never stored by the crate.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::{Channel, ChannelFlags};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::hub::{HubFreed, HubFlagsChanged};
use crate::observability::messages::StructuredLog;
use crate::traits::{ClassRef, Hooks};

/// Class-private state attached to a hub at allocation.
pub type HubHook = Box<dyn Any + Send + Sync>;

/// Data shared by a hub's owner and the channels opened on it.
pub struct HubNode {
    class: ClassRef,
    flags: RwLock<ChannelFlags>,
    name: RwLock<Option<String>>,
    children: RwLock<Vec<Hub>>,
    hook: Option<HubHook>,
}

impl HubNode {
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn flags(&self) -> ChannelFlags {
        *self.flags.read()
    }

    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: Option<String>) {
        *self.name.write() = name;
    }

    /// `TYPE:name`, the reference that resolves back to an equivalent hub.
    pub fn spec(&self) -> String {
        format!(
            "{}:{}",
            self.class.name(),
            self.name.read().as_deref().unwrap_or("")
        )
    }

    /// Class-private hook, if one of type `T` was attached.
    pub fn hook<T: Any>(&self) -> Option<&T> {
        self.hook.as_ref().and_then(|hook| hook.downcast_ref::<T>())
    }

    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Transient handles to the children, in order.
    pub fn child_refs(&self) -> Vec<HubRef> {
        self.children.read().iter().map(Hub::share).collect()
    }

    /// Run `f` with the children locked for reading.
    pub fn with_children<R>(&self, f: impl FnOnce(&[Hub]) -> R) -> R {
        f(&self.children.read())
    }

    /// Swap in a new child list, returning the previous one.
    pub(crate) fn replace_children(&self, children: Vec<Hub>) -> Vec<Hub> {
        std::mem::replace(&mut *self.children.write(), children)
    }

    /// Set `flags` on the hub.
    ///
    /// Generic bits are recorded directly. Backend bits that are not already
    /// set are handed to the class's `set_hub_flags` hook.
    pub fn set_flags(&self, flags: ChannelFlags) -> ChannelResult<()> {
        if flags.intersects(ChannelFlags::HARD) {
            return Err(ChannelError::InvalidArgument(
                "hard flags can only be given when a hub is allocated".to_string(),
            ));
        }

        let before = self.flags();
        let backend = flags.backend() - before;
        if !backend.is_empty() {
            if !self.class.hooks().contains(Hooks::SET_HUB_FLAGS) {
                return Err(ChannelError::unsupported(
                    self.class.name(),
                    "setting backend hub flags",
                ));
            }
            self.class.set_hub_flags(self, backend)?;
        }

        let after = {
            let mut current = self.flags.write();
            *current |= flags;
            *current
        };
        self.log_change(before, after);
        Ok(())
    }

    /// Clear `flags` on the hub.
    ///
    /// Backend bits that are currently set go through the class's
    /// `clear_hub_flags` hook. Soft bits pinned by a hard flag stay set.
    pub fn clear_flags(&self, flags: ChannelFlags) -> ChannelResult<()> {
        if flags.intersects(ChannelFlags::HARD) {
            return Err(ChannelError::InvalidArgument(
                "hard flags cannot be cleared".to_string(),
            ));
        }

        let before = self.flags();
        let backend = flags.backend() & before;
        if !backend.is_empty() {
            if !self.class.hooks().contains(Hooks::CLEAR_HUB_FLAGS) {
                return Err(ChannelError::unsupported(
                    self.class.name(),
                    "clearing backend hub flags",
                ));
            }
            self.class.clear_hub_flags(self, backend)?;
        }

        let after = {
            let mut current = self.flags.write();
            *current = (*current - flags) | before.hard_floor();
            *current
        };
        self.log_change(before, after);
        Ok(())
    }

    fn log_change(&self, before: ChannelFlags, after: ChannelFlags) {
        if before != after {
            HubFlagsChanged {
                class: self.class.name(),
                before,
                after,
            }
            .log();
        }
    }
}

impl Drop for HubNode {
    fn drop(&mut self) {
        if self.class.hooks().contains(Hooks::CLEAR_HUB) {
            self.class.clear_hub(self);
        }
        HubFreed {
            class: self.class.name(),
            name: self.name.get_mut().as_deref(),
            children: self.children.get_mut().len(),
        }
        .log();
    }
}

impl fmt::Debug for HubNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubNode")
            .field("class", &self.class.name())
            .field("flags", &self.flags())
            .field("name", &self.name())
            .field("children", &*self.children.read())
            .finish()
    }
}

/// Owning handle to a hub. Not `Clone`: a hub has exactly one owner.
pub struct Hub {
    node: Arc<HubNode>,
}

impl Hub {
    /// Allocate a hub of `class`. Hard flags imply their soft counterparts.
    pub fn alloc(class: ClassRef, flags: ChannelFlags) -> Hub {
        Self::build(class, flags, None)
    }

    pub fn alloc_with_hook(class: ClassRef, flags: ChannelFlags, hook: HubHook) -> Hub {
        Self::build(class, flags, Some(hook))
    }

    fn build(class: ClassRef, flags: ChannelFlags, hook: Option<HubHook>) -> Hub {
        Hub {
            node: Arc::new(HubNode {
                class,
                flags: RwLock::new(flags.with_hard_floor()),
                name: RwLock::new(None),
                children: RwLock::new(Vec::new()),
                hook,
            }),
        }
    }

    /// Builder-style name assignment.
    pub fn named(self, name: impl Into<String>) -> Hub {
        self.node.set_name(Some(name.into()));
        self
    }

    /// Free the hub: run `clear_hub`, then release it and its children.
    pub fn free(self) {
        drop(self);
    }

    /// Transient strong view, for operations that must outlive a borrow.
    pub fn share(&self) -> HubRef {
        HubRef {
            node: Arc::clone(&self.node),
        }
    }

    /// Open a channel on this hub.
    pub async fn open(&self, flags: ChannelFlags) -> ChannelResult<Channel> {
        Channel::open(&self.node, flags).await
    }
}

impl Deref for Hub {
    type Target = HubNode;
    fn deref(&self) -> &HubNode {
        &self.node
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt(f)
    }
}

/// Transient, non-owning-in-intent view of a hub.
#[derive(Clone)]
pub struct HubRef {
    node: Arc<HubNode>,
}

impl HubRef {
    pub(crate) fn from_node(node: Arc<HubNode>) -> Self {
        HubRef { node }
    }

    pub async fn open(&self, flags: ChannelFlags) -> ChannelResult<Channel> {
        Channel::open(&self.node, flags).await
    }
}

impl Deref for HubRef {
    type Target = HubNode;
    fn deref(&self) -> &HubNode {
        &self.node
    }
}

impl fmt::Debug for HubRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt(f)
    }
}
