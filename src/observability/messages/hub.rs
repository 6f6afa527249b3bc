// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for hub and channel lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Hub creation and release
//! * Hub flag changes
//! * Channel open and close

use crate::core::ChannelFlags;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A class built a new hub.
///
/// # Log Level
/// `debug!` - Construction detail
///
/// # Example
/// ```
/// use channel_hub::observability::messages::hub::HubCreated;
///
/// let msg = HubCreated {
///     class: "file",
///     name: "/tmp/out.log",
///     children: 0,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct HubCreated<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub children: usize,
}

impl Display for HubCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created {} hub '{}' with {} children",
            self.class, self.name, self.children
        )
    }
}

impl StructuredLog for HubCreated<'_> {
    fn log(&self) {
        tracing::debug!(
            class = self.class,
            name = self.name,
            children = self.children,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "hub",
            span_name = name,
            class = self.class,
            name = self.name,
        )
    }
}

/// A hub was freed.
///
/// # Log Level
/// `trace!` - High-volume lifecycle detail
pub struct HubFreed<'a> {
    pub class: &'a str,
    pub name: Option<&'a str>,
    pub children: usize,
}

impl Display for HubFreed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Freed {} hub '{}' and {} direct children",
            self.class,
            self.name.unwrap_or(""),
            self.children
        )
    }
}

impl StructuredLog for HubFreed<'_> {
    fn log(&self) {
        tracing::trace!(
            class = self.class,
            name = self.name,
            children = self.children,
            "{}", self
        );
    }
}

/// Hub flags changed.
///
/// # Log Level
/// `debug!` - State change
pub struct HubFlagsChanged<'a> {
    pub class: &'a str,
    pub before: ChannelFlags,
    pub after: ChannelFlags,
}

impl Display for HubFlagsChanged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} hub flags changed: {:?} -> {:?}",
            self.class, self.before, self.after
        )
    }
}

impl StructuredLog for HubFlagsChanged<'_> {
    fn log(&self) {
        tracing::debug!(
            class = self.class,
            before = self.before.bits(),
            after = self.after.bits(),
            "{}", self
        );
    }
}

pub struct ChannelOpened<'a> {
    pub class: &'a str,
    pub requested: ChannelFlags,
    pub effective: ChannelFlags,
}

impl Display for ChannelOpened<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Opened {} channel: requested {:?}, effective {:?}",
            self.class, self.requested, self.effective
        )
    }
}

impl StructuredLog for ChannelOpened<'_> {
    fn log(&self) {
        tracing::trace!(
            class = self.class,
            requested = self.requested.bits(),
            effective = self.effective.bits(),
            "{}", self
        );
    }
}

/// A class's close hook failed. The channel is freed anyway.
///
/// # Log Level
/// `warn!` - Unexpected but absorbed
pub struct ChannelCloseFailed<'a> {
    pub class: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ChannelCloseFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Closing {} channel failed, freeing it anyway: {}",
            self.class, self.error
        )
    }
}

impl StructuredLog for ChannelCloseFailed<'_> {
    fn log(&self) {
        tracing::warn!(class = self.class, error = %self.error, "{}", self);
    }
}
