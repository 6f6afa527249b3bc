// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One upstream read shared by every open reader.
//!
//! A broadcast hub is hard read-only with exactly one child, the upstream.
//! Reads proceed in barrier rounds: nothing is read upstream until every open
//! participant is waiting in `read`, then one upstream read of the smallest
//! nonzero amount requested is handed to all of them.
//!
//! A participant that opens while a round is gathering joins that round. One
//! that closes lowers the round's target, and the round fires if everyone left
//! is already waiting. A new round never fires until every waiter of the
//! previous round has collected its result. A read dropped before it returns
//! leaves the barrier as if it had never been called.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::Instrument;

use crate::core::{Channel, ChannelFlags, Hub, HubRef};
use crate::engine::{create_hub_children, set_children};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::backends::{BroadcastRound, BroadcastUpstream};
use crate::observability::messages::hub::HubCreated;
use crate::observability::messages::StructuredLog;
use crate::registry::Resolver;
use crate::traits::{ChannelClass, ClassRef, Hooks};

pub struct BroadcastClass;

/// Round bookkeeping. Never locked across an `.await`.
struct Barrier {
    num_channels: usize,
    wait_count: usize,
    pending_count: usize,
    /// Amounts requested by the waiters of the gathering round, by ticket.
    requests: Vec<(u64, usize)>,
    next_ticket: u64,
    /// A waiter is reading upstream for the gathering round.
    firing: bool,
    result: ChannelResult<Vec<u8>>,
    generation: u64,
}

impl Barrier {
    fn round_complete(&self) -> bool {
        self.wait_count > 0
            && self.wait_count == self.num_channels
            && self.pending_count == 0
            && !self.firing
    }

    /// Smallest nonzero amount requested this round.
    fn round_amount(&self) -> usize {
        self.requests
            .iter()
            .map(|(_, amount)| *amount)
            .filter(|amount| *amount > 0)
            .min()
            .unwrap_or(0)
    }

    /// Hand `result` to every waiter of the gathering round.
    fn publish(&mut self, result: ChannelResult<Vec<u8>>) {
        self.result = result;
        self.pending_count = self.wait_count;
        self.wait_count = 0;
        self.requests.clear();
        self.firing = false;
        self.generation += 1;
    }
}

struct BroadcastHub {
    barrier: Mutex<Barrier>,
    upstream: AsyncMutex<Option<Channel>>,
    released: Notify,
}

impl BroadcastHub {
    fn new() -> Self {
        Self {
            barrier: Mutex::new(Barrier {
                num_channels: 0,
                wait_count: 0,
                pending_count: 0,
                requests: Vec::new(),
                next_ticket: 0,
                firing: false,
                result: Ok(Vec::new()),
                generation: 0,
            }),
            upstream: AsyncMutex::new(None),
            released: Notify::new(),
        }
    }

    async fn read_upstream(&self, round: BroadcastRound) -> ChannelResult<Vec<u8>> {
        let span = round.span("fire");
        let mut upstream = self.upstream.lock().await;
        let result = match upstream.as_mut() {
            Some(upstream) => upstream.read(round.amount).instrument(span).await,
            None => Err(ChannelError::HubFreed),
        };

        BroadcastRound {
            bytes: result.as_ref().ok().map(Vec::len),
            ..round
        }
        .log();
        result
    }
}

/// One participant's place in a round.
///
/// Dropping a waiter that never collected its result, such as a read
/// cancelled by a timeout, takes it back out of the barrier: out of the
/// gathering round if that round has not fired, out of the pending count
/// if it has.
struct Waiter<'a> {
    shared: &'a BroadcastHub,
    ticket: u64,
    round: u64,
    firing: bool,
    collected: bool,
}

impl<'a> Waiter<'a> {
    fn join(shared: &'a BroadcastHub, amount: usize) -> Self {
        let mut barrier = shared.barrier.lock();
        let ticket = barrier.next_ticket;
        barrier.next_ticket += 1;
        barrier.wait_count += 1;
        barrier.requests.push((ticket, amount));
        Self {
            shared,
            ticket,
            round: barrier.generation,
            firing: false,
            collected: false,
        }
    }

    /// Take this waiter's copy of the round result. The last one out takes
    /// the buffer itself.
    fn collect(&mut self) -> ChannelResult<Vec<u8>> {
        let mut barrier = self.shared.barrier.lock();
        barrier.pending_count -= 1;
        self.collected = true;
        if barrier.pending_count == 0 {
            std::mem::replace(&mut barrier.result, Ok(Vec::new()))
        } else {
            barrier.result.clone()
        }
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.collected {
            return;
        }
        {
            let mut barrier = self.shared.barrier.lock();
            if barrier.generation == self.round {
                barrier.wait_count -= 1;
                let ticket = self.ticket;
                barrier.requests.retain(|(t, _)| *t != ticket);
                if self.firing {
                    barrier.firing = false;
                }
            } else {
                barrier.pending_count -= 1;
                if barrier.pending_count == 0 {
                    barrier.result = Ok(Vec::new());
                }
            }
        }
        self.shared.released.notify_waiters();
    }
}

enum Step {
    Collect,
    Wait,
    Fire(BroadcastRound),
}

/// Marks a channel as a counted participant.
struct Participant;

impl BroadcastClass {
    pub fn shared() -> ClassRef {
        Arc::new(BroadcastClass)
    }
}

fn broadcast_hub(hub: &HubRef) -> ChannelResult<&BroadcastHub> {
    hub.hook::<BroadcastHub>()
        .ok_or_else(|| ChannelError::InvalidArgument("broadcast hub has no barrier".to_string()))
}

#[async_trait]
impl ChannelClass for BroadcastClass {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn hooks(&self) -> Hooks {
        Hooks::OPEN | Hooks::CLOSE | Hooks::CREATE_HUB
    }

    async fn read(&self, channel: &mut Channel, amount: usize) -> ChannelResult<Vec<u8>> {
        let hub = channel.hub()?;
        let shared = broadcast_hub(&hub)?;
        let mut waiter = Waiter::join(shared, amount);

        loop {
            // registered before the barrier is inspected so no wakeup is missed
            let released = shared.released.notified();
            let step = {
                let mut barrier = shared.barrier.lock();
                if barrier.generation != waiter.round {
                    Step::Collect
                } else if barrier.round_complete() {
                    barrier.firing = true;
                    Step::Fire(BroadcastRound {
                        generation: barrier.generation,
                        participants: barrier.wait_count,
                        amount: barrier.round_amount(),
                        bytes: None,
                    })
                } else {
                    Step::Wait
                }
            };

            match step {
                Step::Collect => break,
                Step::Wait => released.await,
                Step::Fire(round) => {
                    waiter.firing = true;
                    let result = shared.read_upstream(round).await;
                    shared.barrier.lock().publish(result);
                    waiter.firing = false;
                    shared.released.notify_waiters();
                }
            }
        }

        let result = waiter.collect();
        // the next round may already be gathered
        shared.released.notify_waiters();
        result
    }

    async fn write(&self, _channel: &mut Channel, _buf: &[u8]) -> ChannelResult<usize> {
        Err(ChannelError::unsupported(self.name(), "write"))
    }

    /// Join the participant set, opening the upstream for the first one.
    async fn open(&self, channel: &mut Channel) -> ChannelResult<()> {
        let hub = channel.hub()?;
        let shared = broadcast_hub(&hub)?;
        let mut upstream = shared.upstream.lock().await;

        let first = shared.barrier.lock().num_channels == 0;
        if first {
            let child = hub
                .child_refs()
                .into_iter()
                .next()
                .ok_or_else(|| ChannelError::InvalidArgument("broadcast hub has no upstream".to_string()))?;
            *upstream = Some(child.open(ChannelFlags::READ_ONLY).await?);
            BroadcastUpstream {
                event: "opened",
                participants: 1,
            }
            .log();
        }
        shared.barrier.lock().num_channels += 1;

        drop(upstream);
        drop(hub);
        channel.set_state(Participant);
        Ok(())
    }

    async fn close(&self, channel: &mut Channel) -> ChannelResult<()> {
        let hub = channel.hub()?;
        let shared = broadcast_hub(&hub)?;
        let mut upstream = shared.upstream.lock().await;
        if channel.take_state::<Participant>().is_none() {
            return Ok(());
        }

        let remaining = {
            let mut barrier = shared.barrier.lock();
            barrier.num_channels -= 1;
            barrier.num_channels
        };
        if remaining == 0 {
            if let Some(channel) = upstream.take() {
                channel.close().await;
                BroadcastUpstream {
                    event: "closed",
                    participants: 0,
                }
                .log();
            }
        }
        drop(upstream);

        // everyone left may already be waiting
        shared.released.notify_waiters();
        Ok(())
    }

    fn create_hub(
        self: Arc<Self>,
        resolver: &Resolver,
        name: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        if flags.intersects(ChannelFlags::WRITE_ONLY | ChannelFlags::HARD_WRITE_ONLY) {
            return Err(ChannelError::InvalidArgument(
                "a broadcast hub cannot be writable".to_string(),
            ));
        }

        let children = create_hub_children(resolver, name, flags.generic(), candidates)?;
        if children.len() != 1 {
            return Err(ChannelError::InvalidArgument(format!(
                "broadcast needs exactly one upstream, '{}' names {}",
                name,
                children.len()
            )));
        }

        let hub = Hub::alloc_with_hook(
            self,
            ChannelFlags::HARD_READ_ONLY,
            Box::new(BroadcastHub::new()),
        )
        .named(name);
        set_children(&hub, children);

        HubCreated {
            class: "broadcast",
            name,
            children: 1,
        }
        .log();
        Ok(hub)
    }
}
