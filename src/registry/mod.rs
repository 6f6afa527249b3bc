// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Class lookup and typed resolution of `[TYPE:]NAME` references.

mod class_registry;
mod resolver;

pub use class_registry::{export_registry, ClassRegistry};
pub use resolver::Resolver;
