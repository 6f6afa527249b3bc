// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bare resource references.
//!
//! A name with no recognizable type is first offered to the host's
//! [`HubFetcher`], which knows whether the resource is already a live channel
//! source. When that fails the name is opened as a plain file, unless the
//! caller set [`ChannelFlags::QUERY_NO_FILE`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::file::FileClass;
use crate::core::{Channel, ChannelFlags, Hub};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::backends::FetchFellBack;
use crate::observability::messages::StructuredLog;
use crate::registry::Resolver;
use crate::traits::{ChannelClass, ClassRef, Hooks};

/// Host primitive asking a named resource for the hub it exposes.
pub trait HubFetcher: Send + Sync {
    fn fetch(
        &self,
        resource: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub>;
}

pub struct QueryClass;

impl QueryClass {
    pub fn shared() -> ClassRef {
        Arc::new(QueryClass)
    }
}

#[async_trait]
impl ChannelClass for QueryClass {
    fn name(&self) -> &str {
        "query"
    }

    fn hooks(&self) -> Hooks {
        Hooks::CREATE_HUB
    }

    async fn read(&self, _channel: &mut Channel, _amount: usize) -> ChannelResult<Vec<u8>> {
        Err(ChannelError::unsupported(self.name(), "read"))
    }

    async fn write(&self, _channel: &mut Channel, _buf: &[u8]) -> ChannelResult<usize> {
        Err(ChannelError::unsupported(self.name(), "write"))
    }

    fn create_hub(
        self: Arc<Self>,
        resolver: &Resolver,
        name: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        let fetched = match resolver.fetcher() {
            Some(fetcher) => fetcher.fetch(name, flags, candidates),
            None => Err(ChannelError::unsupported(self.name(), "fetching hubs")),
        };

        match fetched {
            Ok(hub) => Ok(hub),
            Err(error) if flags.contains(ChannelFlags::QUERY_NO_FILE) => Err(error),
            Err(error) => {
                FetchFellBack {
                    resource: name,
                    error: &error,
                }
                .log();
                FileClass::shared().create_hub(resolver, name, flags, candidates)
            }
        }
    }
}
