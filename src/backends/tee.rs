// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fan-out writes.
//!
//! A tee hub is hard write-only. The first channel opened on it opens every
//! child once; every channel on the hub then writes through that one shared
//! set, and the last one to close closes it. A write goes to child 0 first;
//! however many bytes child 0 accepts is the amount every other child must
//! then take in full.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::{Channel, ChannelFlags, Hub, HubNode, HubRef};
use crate::engine::{clear_child_flags, create_hub_children, set_child_flags, set_children};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::backends::TeeChildFailed;
use crate::observability::messages::hub::HubCreated;
use crate::observability::messages::StructuredLog;
use crate::registry::Resolver;
use crate::traits::{ChannelClass, ClassRef, Hooks};

pub struct TeeClass;

struct TeeHub {
    max_stalled_writes: u32,
    shared: Mutex<TeeChildren>,
}

/// Child channels shared by every open tee channel of one hub.
#[derive(Default)]
struct TeeChildren {
    children: Vec<Channel>,
    open_count: usize,
}

/// Marks a channel as holding a share of the hub's children.
struct TeeMember;

impl TeeClass {
    pub fn shared() -> ClassRef {
        Arc::new(TeeClass)
    }
}

fn tee_hub(hub: &HubRef) -> ChannelResult<&TeeHub> {
    hub.hook::<TeeHub>()
        .ok_or_else(|| ChannelError::InvalidArgument("tee hub has no child set".to_string()))
}

/// Write all of `data` to `child`, retrying short writes.
async fn write_fully(
    child: &mut Channel,
    index: usize,
    data: &[u8],
    max_stalled: u32,
) -> ChannelResult<()> {
    let mut written = 0;
    let mut stalled = 0;
    while written < data.len() {
        let n = child.write(&data[written..]).await?;
        if n == 0 {
            stalled += 1;
            if stalled >= max_stalled {
                return Err(ChannelError::WriteStalled {
                    child: index,
                    attempts: stalled,
                });
            }
            continue;
        }
        stalled = 0;
        written += n.min(data.len() - written);
    }
    Ok(())
}

#[async_trait]
impl ChannelClass for TeeClass {
    fn name(&self) -> &str {
        "tee"
    }

    fn hooks(&self) -> Hooks {
        Hooks::FLUSH
            | Hooks::OPEN
            | Hooks::CLOSE
            | Hooks::SET_HUB_FLAGS
            | Hooks::CLEAR_HUB_FLAGS
            | Hooks::CREATE_HUB
    }

    async fn read(&self, _channel: &mut Channel, _amount: usize) -> ChannelResult<Vec<u8>> {
        Err(ChannelError::unsupported(self.name(), "read"))
    }

    async fn write(&self, channel: &mut Channel, buf: &[u8]) -> ChannelResult<usize> {
        channel.state::<TeeMember>()?;
        let hub = channel.hub()?;
        let tee = tee_hub(&hub)?;
        let max_stalled = tee.max_stalled_writes.max(1);
        let mut shared = tee.shared.lock().await;

        let Some((first, rest)) = shared.children.split_first_mut() else {
            return Ok(0);
        };

        let amount = first.write(buf).await.map_err(|error| {
            TeeChildFailed {
                operation: "write",
                child: 0,
                error: &error,
            }
            .log();
            error
        })?;
        let accepted = &buf[..amount.min(buf.len())];

        for (offset, child) in rest.iter_mut().enumerate() {
            let index = offset + 1;
            if let Err(error) = write_fully(child, index, accepted, max_stalled).await {
                TeeChildFailed {
                    operation: "write",
                    child: index,
                    error: &error,
                }
                .log();
                return Err(error);
            }
        }

        Ok(accepted.len())
    }

    /// Flush every child, reporting the last failure.
    async fn flush(&self, channel: &mut Channel) -> ChannelResult<()> {
        channel.state::<TeeMember>()?;
        let hub = channel.hub()?;
        let mut shared = tee_hub(&hub)?.shared.lock().await;

        let mut last_error = None;
        for (index, child) in shared.children.iter_mut().enumerate() {
            if let Err(error) = child.flush().await {
                TeeChildFailed {
                    operation: "flush",
                    child: index,
                    error: &error,
                }
                .log();
                last_error = Some(error);
            }
        }
        last_error.map_or(Ok(()), Err)
    }

    /// Open every child on the hub's first open; later opens share them.
    async fn open(&self, channel: &mut Channel) -> ChannelResult<()> {
        let hub = channel.hub()?;
        let mut shared = tee_hub(&hub)?.shared.lock().await;

        if shared.open_count == 0 {
            let mut children = Vec::with_capacity(hub.child_count());
            for child in hub.child_refs() {
                match child.open(ChannelFlags::WRITE_ONLY).await {
                    Ok(opened) => children.push(opened),
                    Err(error) => {
                        for opened in children {
                            opened.close().await;
                        }
                        return Err(error);
                    }
                }
            }
            shared.children = children;
        }
        shared.open_count += 1;

        drop(shared);
        drop(hub);
        channel.set_state(TeeMember);
        Ok(())
    }

    /// Drop this channel's share; the last one out closes the children.
    async fn close(&self, channel: &mut Channel) -> ChannelResult<()> {
        if channel.take_state::<TeeMember>().is_none() {
            return Ok(());
        }
        let hub = channel.hub()?;
        let mut shared = tee_hub(&hub)?.shared.lock().await;

        shared.open_count -= 1;
        if shared.open_count == 0 {
            for child in std::mem::take(&mut shared.children) {
                child.close().await;
            }
        }
        Ok(())
    }

    fn set_hub_flags(&self, hub: &HubNode, flags: ChannelFlags) -> ChannelResult<()> {
        set_child_flags(hub, flags)
    }

    fn clear_hub_flags(&self, hub: &HubNode, flags: ChannelFlags) -> ChannelResult<()> {
        clear_child_flags(hub, flags)
    }

    fn create_hub(
        self: Arc<Self>,
        resolver: &Resolver,
        name: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        if flags.intersects(ChannelFlags::READ_ONLY | ChannelFlags::HARD_READ_ONLY) {
            return Err(ChannelError::InvalidArgument(
                "a tee hub cannot be readable".to_string(),
            ));
        }

        let children = create_hub_children(resolver, name, flags.generic(), candidates)?;
        let count = children.len();
        let hook = TeeHub {
            max_stalled_writes: resolver.config().tee.get_max_stalled_writes().max(1),
            shared: Mutex::new(TeeChildren::default()),
        };
        let hub = Hub::alloc_with_hook(self, ChannelFlags::HARD_WRITE_ONLY, Box::new(hook))
            .named(name);
        set_children(&hub, children);

        if !flags.backend().is_empty() {
            hub.set_flags(flags.backend())?;
        }

        HubCreated {
            class: "tee",
            name,
            children: count,
        }
        .log();
        Ok(hub)
    }
}
