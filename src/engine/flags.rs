// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Applying one flag change to every child of a hub.
//!
//! Both operations are all or nothing for the hub's child list: when a child
//! refuses the change, the children already changed get back exactly the bits
//! they differed by, and the child's error is returned.

use crate::core::{ChannelFlags, HubNode, HubRef};
use crate::errors::ChannelResult;
use crate::observability::messages::resolution::ChildFlagsRolledBack;
use crate::observability::messages::StructuredLog;

pub fn set_child_flags(hub: &HubNode, flags: ChannelFlags) -> ChannelResult<()> {
    apply(hub, flags, |child| child.set_flags(flags), |child, before| {
        // undo only what this call added
        child.clear_flags(child.flags() - before)
    })
}

pub fn clear_child_flags(hub: &HubNode, flags: ChannelFlags) -> ChannelResult<()> {
    apply(hub, flags, |child| child.clear_flags(flags), |child, before| {
        child.set_flags(before - child.flags())
    })
}

fn apply(
    hub: &HubNode,
    flags: ChannelFlags,
    change: impl Fn(&HubRef) -> ChannelResult<()>,
    undo: impl Fn(&HubRef, ChannelFlags) -> ChannelResult<()>,
) -> ChannelResult<()> {
    let children = hub.child_refs();
    let mut changed: Vec<(&HubRef, ChannelFlags)> = Vec::with_capacity(children.len());

    for (index, child) in children.iter().enumerate() {
        let before = child.flags();
        if let Err(error) = change(child) {
            ChildFlagsRolledBack {
                failed_child: index,
                flags,
                error: &error,
            }
            .log();
            for (child, before) in changed.into_iter().rev() {
                if let Err(undo_error) = undo(child, before) {
                    tracing::warn!(error = %undo_error, "Child flag rollback failed");
                }
            }
            return Err(error);
        }
        changed.push((child, before));
    }
    Ok(())
}
