// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The composite name grammar: `[TYPE:]SEP CHILD SEP CHILD ...`.

use crate::core::HubNode;
use crate::errors::{ChannelError, ChannelResult};

/// Separators tried by [`children_name`], in priority order.
pub const SEPARATOR_CANDIDATES: [char; 15] = [
    '@', '+', ',', ';', '|', '!', '#', '%', '&', '=', '^', '~', '*', '$', '?',
];

/// A parsed composite name. Borrows the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeName<'a> {
    prefix: &'a str,
    separator: Option<char>,
    fragments: Vec<&'a str>,
}

impl<'a> CompositeName<'a> {
    /// Split `name` into its shared prefix, separator and fragments.
    ///
    /// A leading alphanumeric character starts a `TYPE:` prefix that must be
    /// closed by a `:`. The character after the prefix is the separator.
    /// Nothing after the prefix means no children.
    pub fn parse(name: &'a str) -> ChannelResult<Self> {
        let starts_with_type = name
            .chars()
            .next()
            .is_some_and(|first| first.is_alphanumeric());

        let (prefix, rest) = if starts_with_type {
            match name.find(':') {
                Some(end) => name.split_at(end + 1),
                None => {
                    return Err(ChannelError::InvalidArgument(format!(
                        "composite name '{}' has a type prefix without ':'",
                        name
                    )))
                }
            }
        } else {
            ("", name)
        };

        let mut chars = rest.chars();
        let Some(separator) = chars.next() else {
            return Ok(Self {
                prefix,
                separator: None,
                fragments: Vec::new(),
            });
        };
        if separator.is_alphanumeric() {
            return Err(ChannelError::InvalidArgument(format!(
                "'{}' cannot separate children in '{}'",
                separator, name
            )));
        }

        Ok(Self {
            prefix,
            separator: Some(separator),
            fragments: chars.as_str().split(separator).collect(),
        })
    }

    /// Shared `TYPE:` prefix including its colon, or `""`.
    pub fn prefix(&self) -> &'a str {
        self.prefix
    }

    pub fn separator(&self) -> Option<char> {
        self.separator
    }

    pub fn fragments(&self) -> &[&'a str] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Full child names: the shared prefix joined to each fragment.
    pub fn child_names(&self) -> impl Iterator<Item = String> + '_ {
        self.fragments
            .iter()
            .map(move |fragment| format!("{}{}", self.prefix, fragment))
    }
}

/// Serialize a hub's children back into a composite name.
///
/// Uses the first candidate separator that appears in no child's spec.
pub fn children_name(hub: &HubNode) -> ChannelResult<String> {
    let specs: Vec<String> = hub.with_children(|children| {
        children.iter().map(|child| child.spec()).collect()
    });
    if specs.is_empty() {
        return Ok(String::new());
    }

    let separator = SEPARATOR_CANDIDATES
        .iter()
        .copied()
        .find(|candidate| specs.iter().all(|spec| !spec.contains(*candidate)))
        .ok_or(ChannelError::Unnameable)?;

    let mut name = String::new();
    for spec in &specs {
        name.push(separator);
        name.push_str(spec);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::StubClass;
    use crate::core::{ChannelFlags, Hub};
    use crate::engine::set_children;

    #[test]
    fn test_parse_table() {
        struct TestCase {
            name: &'static str,
            input: &'static str,
            expected_separator: Option<char>,
            expected_children: Vec<&'static str>,
        }

        let test_cases = vec![
            TestCase {
                name: "shared prefix",
                input: "file:@/a@/b@/c",
                expected_separator: Some('@'),
                expected_children: vec!["file:/a", "file:/b", "file:/c"],
            },
            TestCase {
                name: "no prefix",
                input: "@/a@/b",
                expected_separator: Some('@'),
                expected_children: vec!["/a", "/b"],
            },
            TestCase {
                name: "mixed types",
                input: "+file:/x+tee:@/y",
                expected_separator: Some('+'),
                expected_children: vec!["file:/x", "tee:@/y"],
            },
            TestCase {
                name: "prefix only",
                input: "file:",
                expected_separator: None,
                expected_children: vec![],
            },
            TestCase {
                name: "empty",
                input: "",
                expected_separator: None,
                expected_children: vec![],
            },
            TestCase {
                name: "empty fragment kept",
                input: ",a,,b",
                expected_separator: Some(','),
                expected_children: vec!["a", "", "b"],
            },
        ];

        for case in test_cases {
            let parsed = CompositeName::parse(case.input).unwrap();
            assert_eq!(parsed.separator(), case.expected_separator, "{}", case.name);
            let children: Vec<String> = parsed.child_names().collect();
            assert_eq!(children, case.expected_children, "{}", case.name);
        }
    }

    #[test]
    fn test_prefix_without_colon_is_invalid() {
        let err = CompositeName::parse("file@/a").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
    }

    #[test]
    fn test_alphanumeric_separator_is_invalid() {
        let err = CompositeName::parse("file:x/a").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
    }

    fn hub_with_children(names: &[&str]) -> Hub {
        let class = StubClass::shared();
        let parent = Hub::alloc(class.clone(), ChannelFlags::NONE);
        let children = names
            .iter()
            .map(|name| Hub::alloc(class.clone(), ChannelFlags::NONE).named(*name))
            .collect();
        set_children(&parent, children);
        parent
    }

    #[test]
    fn test_children_name_skips_colliding_separators() {
        let parent = hub_with_children(&["a@b", "c+d"]);
        assert_eq!(children_name(&parent).unwrap(), ",stub:a@b,stub:c+d");
    }

    #[test]
    fn test_children_name_of_leaf_is_empty() {
        let parent = hub_with_children(&[]);
        assert_eq!(children_name(&parent).unwrap(), "");
    }

    #[test]
    fn test_children_name_fails_when_every_separator_collides() {
        let all: String = SEPARATOR_CANDIDATES.iter().collect();
        let parent = hub_with_children(&[&all]);
        assert!(matches!(
            children_name(&parent),
            Err(ChannelError::Unnameable)
        ));
    }
}
