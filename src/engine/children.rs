// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::core::{ChannelFlags, Hub, HubNode};
use crate::engine::naming::CompositeName;
use crate::errors::ChannelResult;
use crate::observability::messages::resolution::ChildResolutionFailed;
use crate::observability::messages::StructuredLog;
use crate::registry::Resolver;
use crate::traits::ClassRef;

/// Make `children` the hub's child list. Any previous children are freed.
pub fn set_children(hub: &HubNode, children: Vec<Hub>) {
    let previous = hub.replace_children(children);
    drop(previous);
}

/// Resolve every child named by the composite `name`.
///
/// Construction is all or nothing: if any child fails, the children built
/// so far are freed before the error is returned.
pub fn create_hub_children(
    resolver: &Resolver,
    name: &str,
    flags: ChannelFlags,
    candidates: Option<&[ClassRef]>,
) -> ChannelResult<Vec<Hub>> {
    let composite = CompositeName::parse(name)?;
    let mut built = Vec::with_capacity(composite.len());

    for (index, child_name) in composite.child_names().enumerate() {
        match resolver.resolve(&child_name, flags, candidates) {
            Ok(hub) => built.push(hub),
            Err(error) => {
                ChildResolutionFailed {
                    index,
                    fragment: &child_name,
                    built: built.len(),
                    error: &error,
                }
                .log();
                return Err(error);
            }
        }
    }

    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::StubClass;
    use crate::errors::ChannelError;

    #[test]
    fn test_children_resolve_in_order() {
        let stub = StubClass::new("s").into_shared();
        let candidates = vec![stub.as_class()];
        let resolver = Resolver::default().without_loader();

        let children =
            create_hub_children(&resolver, "s:|one|two|three", ChannelFlags::NONE, Some(&candidates))
                .unwrap();
        let names: Vec<String> = children.iter().map(|hub| hub.spec()).collect();
        assert_eq!(names, vec!["s:one", "s:two", "s:three"]);
    }

    #[test]
    fn test_failed_child_frees_built_siblings() {
        let stub = StubClass::new("s").into_shared();
        let candidates = vec![stub.as_class()];
        let resolver = Resolver::default().without_loader();

        let err = create_hub_children(
            &resolver,
            "|s:one|s:two|missing:three",
            ChannelFlags::NONE,
            Some(&candidates),
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
        assert_eq!(stub.stats().hubs_cleared(), 2);
    }

    #[test]
    fn test_set_children_frees_previous_list() {
        let stub = StubClass::shared();
        let parent = Hub::alloc(stub.clone(), ChannelFlags::NONE);
        set_children(&parent, vec![Hub::alloc(stub.clone(), ChannelFlags::NONE)]);
        set_children(
            &parent,
            vec![
                Hub::alloc(stub.clone(), ChannelFlags::NONE),
                Hub::alloc(stub.clone(), ChannelFlags::NONE),
            ],
        );
        assert_eq!(stub.stats().hubs_cleared(), 1);
        assert_eq!(parent.child_count(), 2);
    }
}
