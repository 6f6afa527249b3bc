// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Routing inbound control requests to the channel they address.
//!
//! The host owns the mapping from a request's port to an open channel and
//! exposes it through [`ChannelPort`]. [`demultiplex`] only dispatches: it
//! looks the channel up, hands the request to the channel's class when the
//! class has a control handler, and gives the channel back to the host.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::Channel;
use crate::errors::ChannelResult;
use crate::observability::messages::backends::ControlUnhandled;
use crate::observability::messages::StructuredLog;
use crate::traits::Hooks;

/// An out-of-band request addressed to one open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub port: u64,
    pub code: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlReply {
    pub payload: Vec<u8>,
}

/// Shared open channel as the host keeps it.
pub type SharedChannel = Arc<Mutex<Channel>>;

/// Host side of the demultiplexer.
pub trait ChannelPort: Send + Sync {
    /// The channel `request` is addressed to, if the port has one.
    fn lookup(&self, request: &ControlRequest) -> Option<SharedChannel>;

    /// Hand back a channel obtained from [`ChannelPort::lookup`].
    fn release(&self, request: &ControlRequest, channel: SharedChannel);
}

#[derive(Debug)]
pub enum Outcome {
    /// The channel's class ran its control handler.
    Handled(ChannelResult<ControlReply>),
    /// No channel, or a class without a control handler.
    Unhandled,
}

impl Outcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled(_))
    }
}

pub async fn demultiplex(port: &dyn ChannelPort, request: &ControlRequest) -> Outcome {
    let Some(shared) = port.lookup(request) else {
        ControlUnhandled {
            port: request.port,
            code: request.code,
            reason: "no channel on port",
        }
        .log();
        return Outcome::Unhandled;
    };

    let outcome = {
        let mut channel = shared.lock().await;
        let class = Arc::clone(channel.class());
        if class.hooks().contains(Hooks::CONTROL) {
            Outcome::Handled(class.control(&mut channel, request).await)
        } else {
            ControlUnhandled {
                port: request.port,
                code: request.code,
                reason: "class has no control handler",
            }
            .log();
            Outcome::Unhandled
        }
    };

    port.release(request, shared);
    outcome
}
