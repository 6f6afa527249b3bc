// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::backends::query::{HubFetcher, QueryClass};
use crate::backends::wasm::ModuleLoader;
use crate::config::ChannelConfig;
use crate::core::{ChannelFlags, Hub};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::resolution::{ClassResolved, QueryFallback, ResolutionStarted};
use crate::observability::messages::StructuredLog;
use crate::registry::class_registry::{lookup_exported, ClassRegistry};
use crate::traits::{ClassRef, Hooks};

/// Turns `[TYPE:]NAME` references into hubs.
///
/// A resolver bundles everything resolution consults: the static class
/// registry, the module loader for unknown types, the external hub fetcher
/// used by the query class, and the configuration handed to backends.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<ClassRegistry>,
    loader: Option<Arc<ModuleLoader>>,
    fetcher: Option<Arc<dyn HubFetcher>>,
    config: Arc<ChannelConfig>,
}

impl Resolver {
    /// A resolver over the global registry with module loading enabled.
    pub fn new(config: ChannelConfig) -> Self {
        let loader = ModuleLoader::new(&config.modules);
        Self {
            registry: ClassRegistry::global(),
            loader: Some(Arc::new(loader)),
            fetcher: None,
            config: Arc::new(config),
        }
    }

    pub fn with_registry(mut self, registry: Arc<ClassRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_loader(mut self, loader: Arc<ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Never fall back to loading units for unknown types.
    pub fn without_loader(mut self) -> Self {
        self.loader = None;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn HubFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> Option<&Arc<ModuleLoader>> {
        self.loader.as_ref()
    }

    pub fn fetcher(&self) -> Option<&Arc<dyn HubFetcher>> {
        self.fetcher.as_ref()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Build the hub `name` refers to.
    ///
    /// With `candidates`, only those classes are considered for the type
    /// prefix. Without, the registry is searched first, then registries
    /// exported by other instances, then the module loader. A name whose
    /// type resolves nowhere is an error when the prefix was explicit and
    /// a bare resource reference for the query class otherwise.
    pub fn resolve(
        &self,
        name: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        let started = ResolutionStarted {
            name,
            closed_world: candidates.is_some(),
        };
        let span = started.span("resolve");
        let _guard = span.enter();
        started.log();

        if name.is_empty() {
            return Err(ChannelError::InvalidArgument(
                "channel name is empty".to_string(),
            ));
        }

        if let Some(resource) = name.strip_prefix(':') {
            QueryFallback {
                name,
                reason: "empty type prefix",
            }
            .log();
            return self.query(resource, flags, candidates);
        }

        let (type_name, argument, explicit) = match name.split_once(':') {
            Some((type_name, argument)) => (type_name, argument, true),
            None => (name, "", false),
        };

        if let Some((class, source)) = self.lookup(type_name, candidates) {
            ClassResolved { type_name, source }.log();
            return self.build(class, argument, flags, candidates);
        }

        if candidates.is_none() {
            if let Some(loader) = &self.loader {
                match loader.create_module_hub(self, name, flags, candidates) {
                    Ok(hub) => {
                        ClassResolved {
                            type_name,
                            source: "module",
                        }
                        .log();
                        return Ok(hub);
                    }
                    Err(error) if error.is_not_found() => {}
                    Err(error) => return Err(error),
                }
            }
        }

        if explicit {
            return Err(ChannelError::InvalidArgument(format!(
                "unknown channel type '{}'",
                type_name
            )));
        }

        QueryFallback {
            name,
            reason: "no class by that name",
        }
        .log();
        self.query(name, flags, candidates)
    }

    fn lookup(
        &self,
        type_name: &str,
        candidates: Option<&[ClassRef]>,
    ) -> Option<(ClassRef, &'static str)> {
        match candidates {
            Some(candidates) => candidates
                .iter()
                .find(|class| class.name() == type_name)
                .map(|class| (Arc::clone(class), "candidates")),
            None => self
                .registry
                .lookup(type_name)
                .map(|class| (class, "registry"))
                .or_else(|| {
                    lookup_exported(type_name, &self.registry).map(|class| (class, "exported"))
                }),
        }
    }

    fn build(
        &self,
        class: ClassRef,
        argument: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        if !class.hooks().contains(Hooks::CREATE_HUB) {
            return Err(ChannelError::unsupported(class.name(), "create_hub"));
        }
        class.create_hub(self, argument, flags, candidates)
    }

    fn query(
        &self,
        resource: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        self.build(QueryClass::shared(), resource, flags, candidates)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::StubClass;
    use crate::traits::ChannelClass;

    fn resolver() -> Resolver {
        Resolver::default().without_loader()
    }

    #[test]
    fn test_explicit_prefix_selects_registered_class() {
        let hub = resolver()
            .resolve("file:/tmp/x", ChannelFlags::NONE, None)
            .unwrap();
        assert_eq!(hub.class_name(), "file");
        assert_eq!(hub.name().as_deref(), Some("/tmp/x"));
    }

    #[test]
    fn test_unknown_bare_name_falls_back_to_query() {
        let hub = resolver().resolve("/tmp/x", ChannelFlags::NONE, None).unwrap();
        // no fetcher is installed, so the query class hands back a file hub
        assert_eq!(hub.class_name(), "file");
        assert_eq!(hub.name().as_deref(), Some("/tmp/x"));
    }

    #[test]
    fn test_unknown_explicit_prefix_is_invalid() {
        let err = resolver()
            .resolve("nosuch:/tmp/x", ChannelFlags::NONE, None)
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
    }

    #[test]
    fn test_leading_colon_goes_to_query() {
        let hub = resolver()
            .resolve(":file:odd", ChannelFlags::NONE, None)
            .unwrap();
        assert_eq!(hub.class_name(), "file");
        assert_eq!(hub.name().as_deref(), Some("file:odd"));
    }

    #[test]
    fn test_candidates_close_the_world() {
        let alpha = StubClass::new("alpha").into_shared();
        let candidates = vec![alpha.as_class()];

        let hub = resolver()
            .resolve("alpha:one", ChannelFlags::NONE, Some(&candidates))
            .unwrap();
        assert_eq!(hub.class_name(), "alpha");

        // "file" is registered globally but not among the candidates
        let err = resolver()
            .resolve("file:/tmp/x", ChannelFlags::NONE, Some(&candidates))
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
    }

    #[test]
    fn test_bare_class_name_gets_empty_argument() {
        let beta = StubClass::new("beta").into_shared();
        let candidates = vec![beta.as_class()];
        let hub = resolver()
            .resolve("beta", ChannelFlags::NONE, Some(&candidates))
            .unwrap();
        assert_eq!(hub.class_name(), "beta");
        assert_eq!(hub.name().as_deref(), Some(""));
    }

    #[test]
    fn test_class_without_create_hub_is_unsupported() {
        let bare = StubClass::new("bare");
        let registry = Arc::new(ClassRegistry::new());
        let class: ClassRef = Arc::new(WithoutCreate(bare));
        registry.register(class).unwrap();

        let err = resolver()
            .with_registry(registry)
            .resolve("bare:x", ChannelFlags::NONE, None)
            .unwrap_err();
        assert!(matches!(err, ChannelError::Unsupported { .. }));
    }

    #[test]
    fn test_private_registry_sees_exported_classes() {
        let exporter = Arc::new(ClassRegistry::new());
        exporter
            .register(StubClass::new("from-elsewhere").into_shared())
            .unwrap();
        crate::registry::export_registry(&exporter);

        let hub = resolver()
            .with_registry(Arc::new(ClassRegistry::new()))
            .resolve("from-elsewhere:x", ChannelFlags::NONE, None)
            .unwrap();
        assert_eq!(hub.class_name(), "from-elsewhere");
    }

    /// Stub class that hides its `create_hub` slot.
    struct WithoutCreate(StubClass);

    #[async_trait::async_trait]
    impl ChannelClass for WithoutCreate {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn read(
            &self,
            channel: &mut crate::core::Channel,
            amount: usize,
        ) -> ChannelResult<Vec<u8>> {
            self.0.read(channel, amount).await
        }

        async fn write(&self, channel: &mut crate::core::Channel, buf: &[u8]) -> ChannelResult<usize> {
            self.0.write(channel, buf).await
        }
    }
}
