// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A channel class provided by a loaded WASM unit.
//!
//! ## Unit ABI
//! - `memory`: the unit's linear memory
//! - `allocate(len: i32) -> ptr` and `deallocate(ptr: i32, len: i32)`
//! - `channel_<type>_class() -> i32`: capability mask (bit 0 `create_hub`, bit 1 `flush`)
//! - `channel_read(amount: i32, out_len_ptr: i32) -> ptr`: writes the byte
//!   count (negative on failure) to `out_len_ptr`
//! - `channel_write(ptr: i32, len: i32) -> i32`: bytes accepted, negative on failure
//! - optional `hub_init(ptr: i32, len: i32) -> i32`: receives the hub name
//! - optional `channel_flush() -> i32`
//!
//! Every hub gets its own instance. Every call runs on a fresh fuel budget.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use wasmtime::{Engine, Instance, Memory, Module, Store, TypedFunc};

use crate::backends::wasm::error::{WasmError, WasmResult};
use crate::backends::wasm::module_loader::UnitHandle;
use crate::core::{Channel, ChannelFlags, Hub, HubRef};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::hub::HubCreated;
use crate::observability::messages::StructuredLog;
use crate::registry::Resolver;
use crate::traits::{ChannelClass, ClassRef, Hooks};

const CAP_CREATE_HUB: i32 = 1 << 0;
const CAP_FLUSH: i32 = 1 << 1;

pub struct UnitClass {
    name: String,
    path: String,
    engine: Engine,
    module: Module,
    fuel: u64,
    capabilities: i32,
    _handle: UnitHandle,
}

impl UnitClass {
    /// Validate a compiled unit and read its capability mask.
    pub(crate) fn inspect(
        type_name: &str,
        path: String,
        engine: Engine,
        module: Module,
        fuel: u64,
        handle: UnitHandle,
    ) -> WasmResult<Self> {
        let symbol = format!("channel_{}_class", type_name);
        let mut runtime = UnitRuntime::instantiate(&engine, &module, fuel, &path)?;
        let class_fn = runtime
            .instance
            .get_typed_func::<(), i32>(&mut runtime.store, &symbol)
            .map_err(|_| WasmError::MissingExport {
                path: path.clone(),
                export: format!("'{}' with signature () -> i32", symbol),
            })?;
        let capabilities = class_fn.call(&mut runtime.store, ())?;

        Ok(Self {
            name: type_name.to_string(),
            path,
            engine,
            module,
            fuel,
            capabilities,
            _handle: handle,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn runtime(hub: &HubRef) -> ChannelResult<&Mutex<UnitRuntime>> {
        hub.hook::<Mutex<UnitRuntime>>()
            .ok_or_else(|| ChannelError::InvalidArgument("unit hub has no instance".to_string()))
    }
}

/// One instance of a unit and its data-plane exports.
pub(crate) struct UnitRuntime {
    store: Store<()>,
    instance: Instance,
    memory: Memory,
    allocate: TypedFunc<i32, i32>,
    deallocate: TypedFunc<(i32, i32), ()>,
    read: TypedFunc<(i32, i32), i32>,
    write: TypedFunc<(i32, i32), i32>,
    flush: Option<TypedFunc<(), i32>>,
    hub_init: Option<TypedFunc<(i32, i32), i32>>,
    fuel: u64,
}

impl UnitRuntime {
    fn instantiate(engine: &Engine, module: &Module, fuel: u64, path: &str) -> WasmResult<Self> {
        let mut store = Store::new(engine, ());
        store.set_fuel(fuel)?;

        let instance =
            Instance::new(&mut store, module, &[]).map_err(|e| WasmError::Unloadable {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let missing = |export: &str| WasmError::MissingExport {
            path: path.to_string(),
            export: export.to_string(),
        };

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| missing("'memory'"))?;
        let allocate = instance
            .get_typed_func::<i32, i32>(&mut store, "allocate")
            .map_err(|_| missing("'allocate' with signature (i32) -> i32"))?;
        let deallocate = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, "deallocate")
            .map_err(|_| missing("'deallocate' with signature (i32, i32) -> ()"))?;
        let read = instance
            .get_typed_func::<(i32, i32), i32>(&mut store, "channel_read")
            .map_err(|_| missing("'channel_read' with signature (i32, i32) -> i32"))?;
        let write = instance
            .get_typed_func::<(i32, i32), i32>(&mut store, "channel_write")
            .map_err(|_| missing("'channel_write' with signature (i32, i32) -> i32"))?;
        let flush = instance
            .get_typed_func::<(), i32>(&mut store, "channel_flush")
            .ok();
        let hub_init = instance
            .get_typed_func::<(i32, i32), i32>(&mut store, "hub_init")
            .ok();

        Ok(Self {
            store,
            instance,
            memory,
            allocate,
            deallocate,
            read,
            write,
            flush,
            hub_init,
            fuel,
        })
    }

    fn refuel(&mut self) -> WasmResult<()> {
        self.store.set_fuel(self.fuel)?;
        Ok(())
    }

    fn alloc(&mut self, len: usize) -> WasmResult<i32> {
        let ptr = self.allocate.call(&mut self.store, len as i32)?;
        if ptr == 0 {
            return Err(WasmError::MemoryError(format!(
                "allocation of {} bytes failed",
                len
            )));
        }
        Ok(ptr)
    }

    fn dealloc(&mut self, ptr: i32, len: usize) {
        // a unit that cannot free has already leaked; nothing to recover
        let _ = self.deallocate.call(&mut self.store, (ptr, len as i32));
    }

    /// Copy `bytes` into freshly allocated unit memory.
    fn put(&mut self, bytes: &[u8]) -> WasmResult<i32> {
        let ptr = self.alloc(bytes.len())?;
        if let Err(e) = self.memory.write(&mut self.store, ptr as usize, bytes) {
            self.dealloc(ptr, bytes.len());
            return Err(WasmError::MemoryError(format!(
                "failed to write input to unit memory: {}",
                e
            )));
        }
        Ok(ptr)
    }

    fn init(&mut self, name: &str) -> WasmResult<()> {
        let Some(hub_init) = self.hub_init.clone() else {
            return Ok(());
        };
        self.refuel()?;

        let status = if name.is_empty() {
            hub_init.call(&mut self.store, (0, 0))?
        } else {
            let ptr = self.put(name.as_bytes())?;
            let status = hub_init.call(&mut self.store, (ptr, name.len() as i32));
            self.dealloc(ptr, name.len());
            status?
        };

        if status < 0 {
            return Err(WasmError::CallFailed {
                call: "hub_init",
                status,
            });
        }
        Ok(())
    }

    fn read(&mut self, amount: usize) -> WasmResult<Vec<u8>> {
        self.refuel()?;
        let amount = amount.min(i32::MAX as usize);
        let len_ptr = self.alloc(4)?;

        let ptr = match self.read.call(&mut self.store, (amount as i32, len_ptr)) {
            Ok(ptr) => ptr,
            Err(e) => {
                self.dealloc(len_ptr, 4);
                return Err(e.into());
            }
        };

        let mut len_bytes = [0u8; 4];
        let len_read = self.memory.read(&self.store, len_ptr as usize, &mut len_bytes);
        self.dealloc(len_ptr, 4);
        len_read.map_err(|e| WasmError::MemoryError(format!("failed to read length: {}", e)))?;

        let status = i32::from_le_bytes(len_bytes);
        if status < 0 {
            return Err(WasmError::CallFailed {
                call: "channel_read",
                status,
            });
        }
        if status == 0 || ptr == 0 {
            if ptr != 0 {
                self.dealloc(ptr, 0);
            }
            return Ok(Vec::new());
        }

        let len = (status as usize).min(amount);
        let mut output = vec![0u8; len];
        let data_read = self.memory.read(&self.store, ptr as usize, &mut output);
        self.dealloc(ptr, status as usize);
        data_read.map_err(|e| WasmError::MemoryError(format!("failed to read output: {}", e)))?;
        Ok(output)
    }

    fn write(&mut self, buf: &[u8]) -> WasmResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.refuel()?;
        let len = buf.len().min(i32::MAX as usize);
        let ptr = self.put(&buf[..len])?;
        let status = self.write.call(&mut self.store, (ptr, len as i32));
        self.dealloc(ptr, len);

        let status = status?;
        if status < 0 {
            return Err(WasmError::CallFailed {
                call: "channel_write",
                status,
            });
        }
        Ok((status as usize).min(len))
    }

    fn flush(&mut self) -> WasmResult<()> {
        let Some(flush) = self.flush.clone() else {
            return Ok(());
        };
        self.refuel()?;
        let status = flush.call(&mut self.store, ())?;
        if status < 0 {
            return Err(WasmError::CallFailed {
                call: "channel_flush",
                status,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelClass for UnitClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self) -> Hooks {
        let mut hooks = Hooks::NONE;
        if self.capabilities & CAP_CREATE_HUB != 0 {
            hooks = hooks | Hooks::CREATE_HUB;
        }
        if self.capabilities & CAP_FLUSH != 0 {
            hooks = hooks | Hooks::FLUSH;
        }
        hooks
    }

    async fn read(&self, channel: &mut Channel, amount: usize) -> ChannelResult<Vec<u8>> {
        let hub = channel.hub()?;
        let result = Self::runtime(&hub)?.lock().read(amount);
        Ok(result?)
    }

    async fn write(&self, channel: &mut Channel, buf: &[u8]) -> ChannelResult<usize> {
        let hub = channel.hub()?;
        let result = Self::runtime(&hub)?.lock().write(buf);
        Ok(result?)
    }

    async fn flush(&self, channel: &mut Channel) -> ChannelResult<()> {
        let hub = channel.hub()?;
        let result = Self::runtime(&hub)?.lock().flush();
        Ok(result?)
    }

    fn create_hub(
        self: Arc<Self>,
        _resolver: &Resolver,
        name: &str,
        flags: ChannelFlags,
        _candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        let mut runtime = UnitRuntime::instantiate(&self.engine, &self.module, self.fuel, &self.path)?;
        runtime.init(name)?;

        let class = self.name.clone();
        let hub = Hub::alloc_with_hook(self, flags.generic(), Box::new(Mutex::new(runtime)))
            .named(name);
        HubCreated {
            class: &class,
            name,
            children: 0,
        }
        .log();
        Ok(hub)
    }
}
