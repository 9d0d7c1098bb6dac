//! Rule lookup gating client writes and record payloads.
//!
//! The codec does not interpret validation rules. It only needs to know
//! *which paths* carry a rule: a record attribute is shipped to the client,
//! and accepted back from it, only when a rule exists for its path.
//!
//! Rule paths use `*` for "any index" (`author.posts.*.title`). Every other
//! rule segment matches literally, so `posts.0.title` covers the first post
//! only and an all-digit map key is never a wildcard.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::model::{Blueprint, Path, Segment};

/// Declared rules of a component: rule path to opaque rule text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rules {
    entries: IndexMap<String, String>,
}

impl Rules {
    /// Creates an empty rule table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a rule for `path`.
    pub fn insert(&mut self, path: impl Into<String>, rule: impl Into<String>) {
        self.entries.insert(path.into(), rule.into());
    }

    /// Returns the rule text for an exact rule path.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Iterates declared rule paths in declaration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the subtree of rules strictly below `prefix`.
    pub fn rules_for(&self, prefix: &Path) -> RuleSet {
        let mut set = RuleSet::default();
        for path in self.entries.keys() {
            let segments = split_rule(path);
            if segments.len() > prefix.len() && matches_path(&segments[..prefix.len()], prefix) {
                set.insert(&segments[prefix.len()..]);
            }
        }
        set
    }

    /// Returns true if a rule exists for exactly `path`.
    pub fn has_rule_for(&self, path: &Path) -> bool {
        self.entries.keys().any(|rule| {
            let segments = split_rule(rule);
            segments.len() == path.len() && matches_path(&segments, path)
        })
    }
}

fn split_rule(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').collect()
}

/// Rule segments against concrete segments of equal length: `*` stands for
/// any index, everything else must be spelled the same.
fn matches_path(rule: &[&str], path: &Path) -> bool {
    rule.iter().zip(path.segments()).all(|(rule, seg)| match seg {
        Segment::Index(_) if *rule == "*" => true,
        _ => *rule == seg.as_key(),
    })
}

/// The rules applying below one path, as a tree keyed by segment.
///
/// An empty set means "no rule applies": record data under that path is
/// neither emitted nor writable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    children: FxHashMap<String, RuleSet>,
}

impl RuleSet {
    /// Returns true if no rule applies.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true if a rule mentions `segment` directly below this node.
    pub fn contains(&self, segment: &str) -> bool {
        self.children.contains_key(segment)
    }

    /// Returns the subtree under `segment`.
    pub fn child(&self, segment: &str) -> Option<&RuleSet> {
        self.children.get(segment)
    }

    /// Returns the subtree under `*` (element rules of a collection).
    pub fn wildcard(&self) -> RuleSet {
        self.children.get("*").cloned().unwrap_or_default()
    }

    /// Returns true if a rule reaches into collection elements, through
    /// `*` or a concrete index.
    pub fn has_element_rules(&self) -> bool {
        self.children
            .keys()
            .any(|seg| seg == "*" || Segment::from(seg.clone()).as_index().is_some())
    }

    /// Returns the rules for element `index` of a collection: the `*`
    /// subtree merged with rules naming that index.
    pub fn element(&self, index: usize) -> RuleSet {
        let mut merged = self.wildcard();
        if let Some(exact) = self.children.get(index.to_string().as_str()) {
            merged.merge(exact);
        }
        merged
    }

    fn merge(&mut self, other: &RuleSet) {
        for (segment, subtree) in &other.children {
            self.children.entry(segment.clone()).or_default().merge(subtree);
        }
    }

    /// Returns the subtree under `segment`, or empty.
    pub fn scoped(&self, segment: &str) -> RuleSet {
        self.children.get(segment).cloned().unwrap_or_default()
    }

    /// Adds a rule path relative to this node.
    pub fn insert<S: AsRef<str>>(&mut self, segments: &[S]) {
        let mut node = self;
        for seg in segments {
            node = node.children.entry(seg.as_ref().to_string()).or_default();
        }
    }

    /// Segments directly below this node, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

/// Authorization collaborator consulted by the codec.
///
/// Both checks are pure, synchronous functions of the component and path.
pub trait Authorizer: Send + Sync {
    /// Rules applying strictly below `path`.
    fn rules_for(&self, component: &Blueprint, path: &Path) -> RuleSet;

    /// Whether a client write to exactly `path` is allowed.
    fn has_rule_for(&self, component: &Blueprint, path: &Path) -> bool;
}

/// Authorizer backed by the rules declared on the component's [`Blueprint`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredRules;

impl Authorizer for DeclaredRules {
    fn rules_for(&self, component: &Blueprint, path: &Path) -> RuleSet {
        component.rules().rules_for(path)
    }

    fn has_rule_for(&self, component: &Blueprint, path: &Path) -> bool {
        component.rules().has_rule_for(path)
    }
}
