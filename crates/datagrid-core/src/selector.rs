//! Sparse field-selection selectors.
//!
//! A selector is a string of `@`-separated path components ending in a leaf
//! field name, `*` (any field one more unresolved level down) or `**` (any
//! field at any depth below this point). A [`SelectorSet`] compiles a list
//! of selectors into prefix trees and answers whether a given field path is
//! required in the output.
//!
//! The wildcard-depth rules are asymmetric on purpose: `*` accepts a leaf
//! within 2 unmatched levels in [`SelectorSet::is_data_required`], but only
//! an exact scope match counts in
//! [`SelectorSet::is_any_data_required_in_scope`].

use std::collections::BTreeMap;

/// One node of a compiled selector tree: terminal components plus nested
/// scopes.
#[derive(Debug, Clone, Default)]
struct SelectorNode {
    leaves: Vec<String>,
    scopes: BTreeMap<String, SelectorNode>,
}

impl SelectorNode {
    fn has_leaf(&self, name: &str) -> bool {
        self.leaves.iter().any(|l| l == name)
    }

    fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.scopes.is_empty()
    }
}

/// A compiled set of selectors.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    trees: Vec<SelectorNode>,
}

impl Default for SelectorSet {
    /// The default selector set requires everything (`**`).
    fn default() -> Self {
        Self::new(&["**".to_string()])
    }
}

impl SelectorSet {
    /// Compile a list of selector strings. Each selector keeps its own tree;
    /// a path is required as soon as any one tree accepts it.
    pub fn new(selectors: &[String]) -> Self {
        Self {
            trees: selectors.iter().map(|s| Self::compile(s)).collect(),
        }
    }

    /// Compile one selector, e.g. `adspace@country@**` into
    /// `adspace -> country -> { ** }`.
    fn compile(selector: &str) -> SelectorNode {
        let mut components: Vec<&str> = selector.split('@').collect();
        // split always yields at least one component
        let leaf = components.pop().unwrap_or_default();

        let mut root = SelectorNode::default();
        let mut node = &mut root;
        for component in components {
            node = node.scopes.entry(component.to_string()).or_default();
        }
        node.leaves.push(leaf.to_string());
        root
    }

    /// Walk a tree down the given scope components.
    fn descend<'a>(root: &'a SelectorNode, path: &[&str]) -> Option<&'a SelectorNode> {
        let mut node = root;
        for component in path {
            node = node.scopes.get(*component)?;
        }
        Some(node)
    }

    /// Whether the field at `path` (e.g. `user@address@city`, where `city`
    /// is a final field) is required by any selector.
    pub fn is_data_required(&self, path: &str) -> bool {
        let components: Vec<&str> = path.split('@').collect();

        for tree in &self.trees {
            let mut unmatched = 0usize;
            let mut current = components.clone();
            // the component the tree failed to resolve, initially the leaf
            let mut pending = *components.last().unwrap_or(&"");

            loop {
                match Self::descend(tree, &current) {
                    None => {
                        unmatched += 1;
                        pending = current.last().copied().unwrap_or_default();
                        current.pop();
                    }
                    Some(node) => {
                        if node.has_leaf("**") {
                            return true;
                        }
                        if node.has_leaf(pending) {
                            return true;
                        }
                        if node.has_leaf("*") && unmatched < 2 {
                            return true;
                        }
                        break;
                    }
                }
            }
        }

        false
    }

    /// Whether anything at all is required under the scope at `scope_path`
    /// (e.g. `user@address`, where `address` is a scope, not a final field).
    /// An empty scope path asks about the root.
    pub fn is_any_data_required_in_scope(&self, scope_path: &str) -> bool {
        let components: Vec<&str> = if scope_path.is_empty() {
            Vec::new()
        } else {
            scope_path.split('@').collect()
        };

        for tree in &self.trees {
            let mut unmatched = 0usize;
            let mut current = components.clone();

            loop {
                match Self::descend(tree, &current) {
                    None => {
                        unmatched += 1;
                        if current.is_empty() {
                            break;
                        }
                        current.pop();
                    }
                    Some(node) => {
                        if unmatched == 0 {
                            if !node.is_empty() {
                                return true;
                            }
                            break;
                        }
                        if node.has_leaf("**") {
                            return true;
                        }
                        break;
                    }
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(selectors: &[&str]) -> SelectorSet {
        SelectorSet::new(&selectors.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_leaf_and_deep_wildcard() {
        let selectors = set(&["user@name", "user@address@**"]);
        assert!(selectors.is_data_required("user@name"));
        assert!(!selectors.is_data_required("user@age"));
        assert!(selectors.is_data_required("user@address@city"));
        assert!(selectors.is_data_required("user@address@geo@lat"));
        assert!(!selectors.is_data_required("other@field"));
    }

    #[test]
    fn test_default_requires_everything() {
        let selectors = SelectorSet::default();
        assert!(selectors.is_data_required("anything"));
        assert!(selectors.is_data_required("deep@nested@path"));
        assert!(selectors.is_any_data_required_in_scope(""));
        assert!(selectors.is_any_data_required_in_scope("deep@nested"));
    }

    #[test]
    fn test_single_star_depth_limit() {
        let selectors = set(&["user@*"]);
        assert!(selectors.is_data_required("user@name"));
        // two unresolved levels is out of reach for `*`
        assert!(!selectors.is_data_required("user@address@city"));
    }

    #[test]
    fn test_scope_requires_exact_match_or_deep_wildcard() {
        let selectors = set(&["user@address@**", "user@name"]);
        assert!(selectors.is_any_data_required_in_scope("user"));
        assert!(selectors.is_any_data_required_in_scope("user@address"));
        assert!(selectors.is_any_data_required_in_scope("user@address@geo"));
        assert!(!selectors.is_any_data_required_in_scope("user@other"));
    }

    #[test]
    fn test_scope_star_does_not_extend() {
        let selectors = set(&["user@*"]);
        assert!(selectors.is_any_data_required_in_scope("user"));
        assert!(!selectors.is_any_data_required_in_scope("user@address"));
    }
}
