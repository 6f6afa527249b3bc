// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Hub tree composition: the separator grammar, child construction and
//! flag propagation across a hub's children.

pub mod children;
pub mod flags;
pub mod naming;

pub use children::{create_hub_children, set_children};
pub use flags::{clear_child_flags, set_child_flags};
pub use naming::{children_name, CompositeName, SEPARATOR_CANDIDATES};
