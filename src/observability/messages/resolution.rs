// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for typed resolution and hub-tree composition.
//!
//! This module contains message types for logging events related to:
//! * Class lookup and the source that answered it
//! * Fallback from a class name to a bare resource reference
//! * Child construction failures and flag rollback

use crate::core::ChannelFlags;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Typed resolution started for a name.
///
/// # Log Level
/// `debug!` - Construction detail
///
/// # Example
/// ```
/// use channel_hub::observability::messages::resolution::ResolutionStarted;
/// use channel_hub::observability::messages::StructuredLog;
///
/// let msg = ResolutionStarted {
///     name: "tee:@/tmp/a@/tmp/b",
///     closed_world: false,
/// };
///
/// let _span = msg.span("resolve").entered();
/// msg.log();
/// ```
pub struct ResolutionStarted<'a> {
    pub name: &'a str,
    pub closed_world: bool,
}

impl Display for ResolutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Resolving '{}'", self.name)?;
        if self.closed_world {
            write!(f, " against caller-supplied classes only")?;
        }
        Ok(())
    }
}

impl StructuredLog for ResolutionStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            name = self.name,
            closed_world = self.closed_world,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "resolution",
            span_name = name,
            name = self.name,
            closed_world = self.closed_world,
        )
    }
}

/// A type name matched a class.
///
/// # Log Level
/// `debug!` - Construction detail
pub struct ClassResolved<'a> {
    pub type_name: &'a str,
    /// Which lookup answered: candidates, registry, exported or module.
    pub source: &'a str,
}

impl Display for ClassResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolved class '{}' from {}",
            self.type_name, self.source
        )
    }
}

impl StructuredLog for ClassResolved<'_> {
    fn log(&self) {
        tracing::debug!(type_name = self.type_name, source = self.source, "{}", self);
    }
}

/// A name is treated as a bare resource reference.
pub struct QueryFallback<'a> {
    pub name: &'a str,
    pub reason: &'a str,
}

impl Display for QueryFallback<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Treating '{}' as a resource reference: {}",
            self.name, self.reason
        )
    }
}

impl StructuredLog for QueryFallback<'_> {
    fn log(&self) {
        tracing::debug!(name = self.name, reason = self.reason, "{}", self);
    }
}

/// A child of a composite name could not be built; siblings are freed.
///
/// # Log Level
/// `warn!` - Construction failure
pub struct ChildResolutionFailed<'a> {
    pub index: usize,
    pub fragment: &'a str,
    pub built: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for ChildResolutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Child {} ('{}') failed, freeing {} already built: {}",
            self.index, self.fragment, self.built, self.error
        )
    }
}

impl StructuredLog for ChildResolutionFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            index = self.index,
            fragment = self.fragment,
            built = self.built,
            error = %self.error,
            "{}", self
        );
    }
}

/// A child flag change failed and earlier children are being rolled back.
///
/// # Log Level
/// `warn!` - Partial failure being undone
pub struct ChildFlagsRolledBack<'a> {
    pub failed_child: usize,
    pub flags: ChannelFlags,
    pub error: &'a dyn std::error::Error,
}

impl Display for ChildFlagsRolledBack<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Changing {:?} failed on child {}, rolling back {} earlier children: {}",
            self.flags, self.failed_child, self.failed_child, self.error
        )
    }
}

impl StructuredLog for ChildFlagsRolledBack<'_> {
    fn log(&self) {
        tracing::warn!(
            failed_child = self.failed_child,
            flags = self.flags.bits(),
            error = %self.error,
            "{}", self
        );
    }
}
