// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::backends::broadcast::BroadcastClass;
use crate::backends::file::FileClass;
use crate::backends::query::QueryClass;
use crate::backends::tee::TeeClass;
use crate::errors::{ChannelError, ChannelResult};
use crate::traits::ClassRef;

static GLOBAL: Lazy<Arc<ClassRegistry>> = Lazy::new(|| Arc::new(ClassRegistry::with_builtins()));

/// Registries published by other framework instances in this process.
static EXPORTED: Lazy<RwLock<Vec<Weak<ClassRegistry>>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Name to class table, in registration order.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<Vec<ClassRef>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `file`, `query`, `tee` and `broadcast` classes.
    pub fn with_builtins() -> Self {
        let builtins: Vec<ClassRef> = vec![
            FileClass::shared(),
            QueryClass::shared(),
            TeeClass::shared(),
            BroadcastClass::shared(),
        ];
        Self {
            classes: RwLock::new(builtins),
        }
    }

    /// The process-wide registry used by [`Resolver::default`](crate::registry::Resolver).
    pub fn global() -> Arc<ClassRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Add a class. Names are unique within a registry.
    pub fn register(&self, class: ClassRef) -> ChannelResult<()> {
        let mut classes = self.classes.write();
        if classes.iter().any(|existing| existing.name() == class.name()) {
            return Err(ChannelError::InvalidArgument(format!(
                "a class named '{}' is already registered",
                class.name()
            )));
        }
        tracing::debug!(class = class.name(), "Registered channel class");
        classes.push(class);
        Ok(())
    }

    pub fn lookup(&self, type_name: &str) -> Option<ClassRef> {
        self.classes
            .read()
            .iter()
            .find(|class| class.name() == type_name)
            .map(Arc::clone)
    }

    pub fn names(&self) -> Vec<String> {
        self.classes
            .read()
            .iter()
            .map(|class| class.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

/// Publish `registry` so resolvers built on other registries can find its
/// classes. The export lapses when the registry is dropped.
pub fn export_registry(registry: &Arc<ClassRegistry>) {
    let mut exported = EXPORTED.write();
    exported.retain(|entry| entry.strong_count() > 0);
    if !exported
        .iter()
        .any(|entry| std::ptr::eq(entry.as_ptr(), Arc::as_ptr(registry)))
    {
        exported.push(Arc::downgrade(registry));
    }
}

/// Search exported registries other than `own`.
pub(crate) fn lookup_exported(type_name: &str, own: &Arc<ClassRegistry>) -> Option<ClassRef> {
    EXPORTED
        .read()
        .iter()
        .filter_map(Weak::upgrade)
        .filter(|registry| !Arc::ptr_eq(registry, own))
        .find_map(|registry| registry.lookup(type_name))
}
