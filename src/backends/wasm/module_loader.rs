// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loading channel classes from WASM units by naming convention.
//!
//! ## Responsibilities
//! - Locate `channel_<type>.wasm` along the search path
//! - Validate unit size, compile it and check the channel ABI
//! - Retain every unit that built a hub for the life of the loader
//! - Unload units that fail inspection immediately

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use wasmtime::{Config, Engine, Module};

use crate::backends::wasm::error::{WasmError, WasmResult};
use crate::backends::wasm::unit::UnitClass;
use crate::config::consts::MAX_UNIT_SIZE;
use crate::config::ModuleConfig;
use crate::core::{ChannelFlags, Hub};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::wasm::{UnitLoaded, UnitNotFound, UnitRejected, UnitRetained};
use crate::observability::messages::StructuredLog;
use crate::registry::Resolver;
use crate::traits::{ChannelClass, ClassRef, Hooks};

/// Counts one loaded unit for as long as it is alive.
pub(crate) struct UnitHandle {
    live: Arc<AtomicUsize>,
}

impl UnitHandle {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            live: Arc::clone(live),
        }
    }
}

impl Drop for UnitHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ModuleLoader {
    search_path: Vec<PathBuf>,
    fuel: u64,
    engine: OnceCell<Engine>,
    retained: Mutex<HashMap<String, Arc<UnitClass>>>,
    live_units: Arc<AtomicUsize>,
}

impl ModuleLoader {
    pub fn new(config: &ModuleConfig) -> Self {
        Self {
            search_path: config.get_search_path(),
            fuel: config.get_fuel(),
            engine: OnceCell::new(),
            retained: Mutex::new(HashMap::new()),
            live_units: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Unit handles currently alive, retained or not.
    pub fn loaded_units(&self) -> usize {
        self.live_units.load(Ordering::SeqCst)
    }

    pub fn retained_units(&self) -> usize {
        self.retained.lock().len()
    }

    /// Find the class for `type_name`, loading its unit when it is not
    /// retained yet. A freshly loaded unit is unloaded again when the
    /// returned class is dropped.
    pub fn find_class(&self, type_name: &str) -> ChannelResult<Arc<UnitClass>> {
        let retained = self.retained.lock();
        if let Some(unit) = retained.get(type_name) {
            return Ok(Arc::clone(unit));
        }
        Ok(self.load_unit(type_name)?)
    }

    /// Build a hub for `TYPE:NAME` from the unit providing `TYPE`.
    pub fn create_module_hub(
        &self,
        resolver: &Resolver,
        name: &str,
        flags: ChannelFlags,
        candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        let (type_name, argument) = name.split_once(':').unwrap_or((name, ""));

        let mut retained = self.retained.lock();
        let (unit, fresh) = match retained.get(type_name) {
            Some(unit) => (Arc::clone(unit), false),
            None => (self.load_unit(type_name)?, true),
        };

        if !unit.hooks().contains(Hooks::CREATE_HUB) {
            return Err(ChannelError::unsupported(type_name, "create_hub"));
        }

        let hub = Arc::clone(&unit).create_hub(resolver, argument, flags, candidates)?;
        if fresh {
            retained.insert(type_name.to_string(), unit);
            UnitRetained {
                type_name,
                retained_units: retained.len(),
            }
            .log();
        }
        Ok(hub)
    }

    fn load_unit(&self, type_name: &str) -> WasmResult<Arc<UnitClass>> {
        if !Self::loadable_name(type_name) {
            return Err(WasmError::NotFound(type_name.to_string()));
        }

        let file_name = format!("channel_{}.wasm", type_name);
        let Some(path) = self
            .search_path
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
        else {
            UnitNotFound {
                type_name,
                searched: self.search_path.len(),
            }
            .log();
            return Err(WasmError::NotFound(type_name.to_string()));
        };

        let unit_path = path.display().to_string();
        let loaded = self.load(type_name, &path, &unit_path);
        if let Err(error) = &loaded {
            UnitRejected {
                type_name,
                unit_path: &unit_path,
                error,
            }
            .log();
        }
        loaded
    }

    fn load(
        &self,
        type_name: &str,
        path: &std::path::Path,
        unit_path: &str,
    ) -> WasmResult<Arc<UnitClass>> {
        let unloadable = |reason: String| WasmError::Unloadable {
            path: unit_path.to_string(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| unloadable(e.to_string()))?;
        if bytes.len() > MAX_UNIT_SIZE {
            return Err(unloadable(format!(
                "unit too large: {} bytes (max: {} bytes)",
                bytes.len(),
                MAX_UNIT_SIZE
            )));
        }

        let engine = self.engine()?;
        let module = Module::new(engine, &bytes).map_err(|e| unloadable(e.to_string()))?;
        let handle = UnitHandle::new(&self.live_units);

        UnitLoaded {
            type_name,
            unit_path,
            size_bytes: bytes.len(),
        }
        .log();

        let unit = UnitClass::inspect(
            type_name,
            unit_path.to_string(),
            engine.clone(),
            module,
            self.fuel,
            handle,
        )?;
        Ok(Arc::new(unit))
    }

    fn engine(&self) -> WasmResult<&Engine> {
        self.engine.get_or_try_init(|| {
            let mut config = Config::new();
            // every call into a unit runs on a bounded instruction budget
            config.consume_fuel(true);
            config.epoch_interruption(false);
            Engine::new(&config).map_err(|e| WasmError::EngineError(e.to_string()))
        })
    }

    /// Type names outside `[A-Za-z0-9_-]+` never map to a unit file.
    fn loadable_name(type_name: &str) -> bool {
        !type_name.is_empty()
            && type_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::registry::ClassRegistry;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// A unit that stores the last write and hands it back on read.
    const ECHO_UNIT: &str = r#"
(module
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 4096))
  (global $stored (mut i32) (i32.const 0))
  (func (export "allocate") (param $len i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap (i32.add (global.get $heap) (local.get $len)))
    (local.get $ptr))
  (func (export "deallocate") (param i32 i32))
  (func (export "channel_echo_class") (result i32) (i32.const 3))
  (func (export "hub_init") (param $ptr i32) (param $len i32) (result i32)
    (if (result i32) (i32.eqz (local.get $len))
      (then (i32.const -1))
      (else (i32.const 0))))
  (func (export "channel_write") (param $ptr i32) (param $len i32) (result i32)
    (memory.copy (i32.const 256) (local.get $ptr) (local.get $len))
    (global.set $stored (local.get $len))
    (local.get $len))
  (func (export "channel_read") (param $amount i32) (param $len_ptr i32) (result i32)
    (local $n i32)
    (local.set $n (global.get $stored))
    (if (i32.gt_u (local.get $n) (local.get $amount))
      (then (local.set $n (local.get $amount))))
    (i32.store (local.get $len_ptr) (local.get $n))
    (global.set $stored (i32.const 0))
    (i32.const 256))
  (func (export "channel_flush") (result i32) (i32.const 0))
)
"#;

    fn write_unit(dir: &Path, type_name: &str, wat_text: &str) {
        let bytes = wat::parse_str(wat_text).unwrap();
        std::fs::write(dir.join(format!("channel_{}.wasm", type_name)), bytes).unwrap();
    }

    fn loader_in(dir: &TempDir, fuel: Option<u64>) -> ModuleLoader {
        ModuleLoader::new(&ModuleConfig {
            search_path: Some(vec![dir.path().to_path_buf()]),
            fuel,
        })
    }

    fn resolver_for(loader: &Arc<ModuleLoader>) -> Resolver {
        Resolver::new(ChannelConfig::default())
            .with_registry(Arc::new(ClassRegistry::with_builtins()))
            .with_loader(Arc::clone(loader))
    }

    #[test]
    fn test_unknown_type_is_not_found_and_registry_untouched() {
        let dir = tempdir().unwrap();
        let loader = Arc::new(loader_in(&dir, None));
        let resolver = resolver_for(&loader);
        let before = resolver.registry().names();

        let err = loader
            .create_module_hub(&resolver, "absent:x", ChannelFlags::NONE, None)
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(resolver.registry().names(), before);
        assert_eq!(loader.loaded_units(), 0);
    }

    #[test]
    fn test_unit_without_class_symbol_is_corrupt_and_unloaded() {
        let dir = tempdir().unwrap();
        write_unit(
            dir.path(),
            "echo",
            &ECHO_UNIT.replace("channel_echo_class", "some_other_symbol"),
        );
        let loader = Arc::new(loader_in(&dir, None));

        let err = loader.find_class("echo").err().unwrap();
        assert!(matches!(err, ChannelError::CorruptModule { .. }));
        assert_eq!(loader.loaded_units(), 0);
    }

    #[test]
    fn test_mistyped_class_symbol_is_corrupt() {
        let dir = tempdir().unwrap();
        write_unit(
            dir.path(),
            "echo",
            &ECHO_UNIT.replace(
                r#"(func (export "channel_echo_class") (result i32) (i32.const 3))"#,
                r#"(func (export "channel_echo_class") (param i32) (result i32) (i32.const 3))"#,
            ),
        );
        let loader = loader_in(&dir, None);
        let err = loader.find_class("echo").err().unwrap();
        assert!(matches!(err, ChannelError::CorruptModule { .. }));
        assert_eq!(loader.loaded_units(), 0);
    }

    #[test]
    fn test_garbage_unit_is_not_found() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("channel_junk.wasm"), b"not wasm").unwrap();
        let loader = loader_in(&dir, None);
        assert!(loader.find_class("junk").err().unwrap().is_not_found());
        assert_eq!(loader.loaded_units(), 0);
    }

    #[test]
    fn test_unit_without_create_hub_is_unsupported() {
        let dir = tempdir().unwrap();
        write_unit(
            dir.path(),
            "echo",
            &ECHO_UNIT.replace("(result i32) (i32.const 3))", "(result i32) (i32.const 2))"),
        );
        let loader = Arc::new(loader_in(&dir, None));
        let resolver = resolver_for(&loader);

        let err = loader
            .create_module_hub(&resolver, "echo:x", ChannelFlags::NONE, None)
            .unwrap_err();
        assert!(matches!(err, ChannelError::Unsupported { .. }));
        assert_eq!(loader.loaded_units(), 0);
    }

    #[test]
    fn test_path_like_type_names_are_never_loaded() {
        let dir = tempdir().unwrap();
        let loader = loader_in(&dir, None);
        for name in ["", "../echo", "a.b", "tmp/x"] {
            assert!(loader.find_class(name).err().unwrap().is_not_found(), "{}", name);
        }
    }

    #[test]
    fn test_failed_hub_init_unloads_fresh_unit() {
        let dir = tempdir().unwrap();
        write_unit(dir.path(), "echo", ECHO_UNIT);
        let loader = Arc::new(loader_in(&dir, None));
        let resolver = resolver_for(&loader);

        let err = resolver
            .resolve("echo:", ChannelFlags::NONE, None)
            .unwrap_err();
        assert!(matches!(err, ChannelError::Module(_)));
        assert_eq!(loader.loaded_units(), 0);
        assert_eq!(loader.retained_units(), 0);
    }

    #[tokio::test]
    async fn test_unit_builds_retained_hubs() {
        let dir = tempdir().unwrap();
        write_unit(dir.path(), "echo", ECHO_UNIT);
        let loader = Arc::new(loader_in(&dir, None));
        let resolver = resolver_for(&loader);

        let hub = resolver.resolve("echo:first", ChannelFlags::NONE, None).unwrap();
        assert_eq!(hub.spec(), "echo:first");
        assert_eq!(loader.loaded_units(), 1);
        assert_eq!(loader.retained_units(), 1);

        let mut channel = hub.open(ChannelFlags::NONE).await.unwrap();
        assert_eq!(channel.write(b"ping").await.unwrap(), 4);
        channel.flush().await.unwrap();
        assert_eq!(channel.read(2).await.unwrap(), b"pi");
        channel.close().await;

        let second = resolver.resolve("echo:second", ChannelFlags::NONE, None).unwrap();
        assert_eq!(loader.loaded_units(), 1);

        drop(hub);
        drop(second);
        // still retained by the loader
        assert_eq!(loader.loaded_units(), 1);
    }

    #[test]
    fn test_candidate_list_never_loads_units() {
        let dir = tempdir().unwrap();
        write_unit(dir.path(), "echo", ECHO_UNIT);
        let loader = Arc::new(loader_in(&dir, None));
        let resolver = resolver_for(&loader);
        let candidates = vec![crate::backends::stub::StubClass::shared().as_class()];

        // the unit is on disk, but a candidate list closes the world
        let err = resolver
            .resolve("echo:x", ChannelFlags::NONE, Some(&candidates))
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
        assert_eq!(loader.loaded_units(), 0);
        assert_eq!(loader.retained_units(), 0);

        // without one the same name loads
        resolver.resolve("echo:x", ChannelFlags::NONE, None).unwrap();
        assert_eq!(loader.loaded_units(), 1);
    }

    #[tokio::test]
    async fn test_runaway_unit_runs_out_of_fuel() {
        let dir = tempdir().unwrap();
        write_unit(
            dir.path(),
            "echo",
            &ECHO_UNIT.replace(
                "(memory.copy (i32.const 256) (local.get $ptr) (local.get $len))",
                "(loop $spin (br $spin))",
            ),
        );
        let loader = Arc::new(loader_in(&dir, Some(100_000)));
        let resolver = resolver_for(&loader);

        let hub = resolver.resolve("echo:spin", ChannelFlags::NONE, None).unwrap();
        let mut channel = hub.open(ChannelFlags::NONE).await.unwrap();
        assert!(matches!(
            channel.write(b"x").await,
            Err(ChannelError::Module(_))
        ));
        channel.close().await;
    }
}
