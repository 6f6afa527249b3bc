// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test-only channel class with call counters and scripted failures.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::control::{ControlReply, ControlRequest};
use crate::core::{Channel, ChannelFlags, Hub, HubNode};
use crate::errors::{ChannelError, ChannelResult};
use crate::registry::Resolver;
use crate::traits::{ChannelClass, ClassRef, Hooks};

/// Counters shared by every hub and channel of one [`StubClass`].
#[derive(Default)]
pub struct StubStats {
    opens: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    flushes: AtomicUsize,
    controls: AtomicUsize,
    hub_flag_calls: AtomicUsize,
    hubs_cleared: AtomicUsize,
    written: Mutex<Vec<Vec<u8>>>,
}

impl StubStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn controls(&self) -> usize {
        self.controls.load(Ordering::SeqCst)
    }

    /// Calls to either hub flag hook.
    pub fn hub_flag_calls(&self) -> usize {
        self.hub_flag_calls.load(Ordering::SeqCst)
    }

    pub fn hubs_cleared(&self) -> usize {
        self.hubs_cleared.load(Ordering::SeqCst)
    }

    /// Bytes accepted by each successful write call, in call order.
    pub fn write_calls(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }

    pub fn bytes_written(&self) -> Vec<u8> {
        self.written.lock().concat()
    }
}

#[derive(Default, Clone, Copy)]
struct Behavior {
    max_write: Option<usize>,
    fail_writes: bool,
    fail_flush: bool,
    fail_open: bool,
    fail_close: bool,
}

/// A class whose channels accept writes into memory and read a
/// deterministic byte pattern.
pub struct StubClass {
    name: String,
    hooks: Hooks,
    behavior: Behavior,
    stats: StubStats,
}

impl StubClass {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hooks: Hooks::OPEN | Hooks::CLOSE | Hooks::CLEAR_HUB | Hooks::CREATE_HUB,
            behavior: Behavior::default(),
            stats: StubStats::default(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Self::new("stub").into_shared()
    }

    pub fn with_hub_flag_hooks() -> Arc<Self> {
        Self::new("stub")
            .with_hooks(Hooks::SET_HUB_FLAGS | Hooks::CLEAR_HUB_FLAGS)
            .into_shared()
    }

    pub fn failing_close() -> Arc<Self> {
        let mut class = Self::new("stub");
        class.behavior.fail_close = true;
        class.into_shared()
    }

    /// Advertise `extra` on top of the default hooks.
    pub fn with_hooks(mut self, extra: Hooks) -> Self {
        self.hooks = self.hooks | extra;
        self
    }

    /// Accept at most `max` bytes per write call.
    pub fn short_writes(mut self, max: usize) -> Self {
        self.behavior.max_write = Some(max);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.behavior.fail_writes = true;
        self
    }

    pub fn failing_flush(mut self) -> Self {
        self.hooks = self.hooks | Hooks::FLUSH;
        self.behavior.fail_flush = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.behavior.fail_open = true;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn stats(&self) -> &StubStats {
        &self.stats
    }

    /// The same class as a trait object, for candidate lists.
    pub fn as_class(self: &Arc<Self>) -> ClassRef {
        Arc::clone(self) as ClassRef
    }

    fn failure(&self, what: &str) -> ChannelError {
        io::Error::other(format!("stub '{}' {} failure", self.name, what)).into()
    }
}

#[async_trait]
impl ChannelClass for StubClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self) -> Hooks {
        self.hooks
    }

    async fn read(&self, _channel: &mut Channel, amount: usize) -> ChannelResult<Vec<u8>> {
        let round = self.stats.reads.fetch_add(1, Ordering::SeqCst);
        Ok((0..amount)
            .map(|i| (round * 31 + i) as u8)
            .collect())
    }

    async fn write(&self, _channel: &mut Channel, buf: &[u8]) -> ChannelResult<usize> {
        self.stats.writes.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_writes {
            return Err(self.failure("write"));
        }

        let accepted = self
            .behavior
            .max_write
            .map_or(buf.len(), |max| max.min(buf.len()));
        self.stats.written.lock().push(buf[..accepted].to_vec());
        Ok(accepted)
    }

    async fn flush(&self, _channel: &mut Channel) -> ChannelResult<()> {
        self.stats.flushes.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_flush {
            return Err(self.failure("flush"));
        }
        Ok(())
    }

    async fn open(&self, _channel: &mut Channel) -> ChannelResult<()> {
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_open {
            return Err(self.failure("open"));
        }
        Ok(())
    }

    async fn close(&self, _channel: &mut Channel) -> ChannelResult<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_close {
            return Err(self.failure("close"));
        }
        Ok(())
    }

    fn set_hub_flags(&self, _hub: &HubNode, _flags: ChannelFlags) -> ChannelResult<()> {
        self.stats.hub_flag_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear_hub_flags(&self, _hub: &HubNode, _flags: ChannelFlags) -> ChannelResult<()> {
        self.stats.hub_flag_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear_hub(&self, _hub: &HubNode) {
        self.stats.hubs_cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn create_hub(
        self: Arc<Self>,
        _resolver: &Resolver,
        name: &str,
        flags: ChannelFlags,
        _candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        Ok(Hub::alloc(self, flags).named(name))
    }

    async fn control(
        &self,
        _channel: &mut Channel,
        request: &ControlRequest,
    ) -> ChannelResult<ControlReply> {
        self.stats.controls.fetch_add(1, Ordering::SeqCst);
        Ok(ControlReply {
            payload: request.payload.iter().rev().copied().collect(),
        })
    }
}
