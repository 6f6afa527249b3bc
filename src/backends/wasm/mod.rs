// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Channel classes provided by dynamically loaded WASM units.

mod error;
mod module_loader;
mod unit;

pub use error::{WasmError, WasmResult};
pub use module_loader::ModuleLoader;
pub use unit::UnitClass;
