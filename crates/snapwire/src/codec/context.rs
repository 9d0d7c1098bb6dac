//! Per-pass contexts handed to synths.
//!
//! A context lives for one synth invocation. It carries the current path,
//! the breadcrumb passed down by the parent, and an explicit accumulator for
//! metadata and child meta trees. Nothing in here outlives the pass.

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::debug;

use crate::codec::dehydrate::Dehydrator;
use crate::codec::envelope::{Meta, MetaTree};
use crate::codec::hydrate::Hydrator;
use crate::error::Error;
use crate::model::{Blueprint, Path, Segment, Value};
use crate::store::RecordLoader;
use crate::validate::{Authorizer, RuleSet};

/// Breadcrumbs a parent passes to the child it dehydrates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentHints {
    /// Rules already scoped to the child's path. `None` means the child has
    /// to ask the authorizer itself.
    pub rules: Option<RuleSet>,
}

impl ParentHints {
    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules: Some(rules) }
    }

    /// Narrows the hints to the child at `segment`. Index segments select
    /// the wildcard rules plus any rules naming that index.
    pub fn scoped(&self, segment: &Segment) -> Self {
        Self {
            rules: self.rules.as_ref().map(|rules| match segment.as_index() {
                Some(i) => rules.element(i),
                None => rules.scoped(&segment.as_key()),
            }),
        }
    }
}

// =============================================================================
// DEHYDRATION
// =============================================================================

/// Context for one [`Synth::dehydrate`](crate::synth::Synth::dehydrate) call.
pub struct DehydrateContext<'a> {
    walker: &'a Dehydrator<'a>,
    path: Path,
    hints: ParentHints,
    depth: usize,
    meta: Meta,
    children: IndexMap<String, MetaTree>,
}

impl<'a> DehydrateContext<'a> {
    pub(crate) fn new(walker: &'a Dehydrator<'a>, path: Path, hints: ParentHints, depth: usize) -> Self {
        Self {
            walker,
            path,
            hints,
            depth,
            meta: Meta::new(),
            children: IndexMap::new(),
        }
    }

    /// Path of the value being dehydrated.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hints passed down by the parent.
    pub fn hints(&self) -> &ParentHints {
        &self.hints
    }

    /// Records a metadata entry for this node.
    pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Rules applying below this node: the parent's scoped rules if it
    /// passed any, otherwise the authorizer's answer for this path.
    pub fn rules(&self) -> RuleSet {
        match &self.hints.rules {
            Some(rules) => rules.clone(),
            None => self.walker.authorizer.rules_for(self.walker.blueprint, &self.path),
        }
    }

    /// The persistence collaborator.
    pub fn loader(&self) -> &dyn RecordLoader {
        self.walker.loader
    }

    /// Dehydrates a nested value through the walker and records its meta.
    pub fn dehydrate_child(
        &mut self,
        segment: impl Into<Segment>,
        value: &Value,
        hints: ParentHints,
    ) -> Result<Json, Error> {
        let segment = segment.into();
        let key = segment.as_key().into_owned();
        let (data, meta) = self
            .walker
            .walk(value, self.path.child(segment), hints, self.depth + 1)?;
        if let Some(meta) = meta {
            self.children.insert(key, meta);
        }
        Ok(data)
    }

    pub(crate) fn finish(self, synth: &str) -> MetaTree {
        MetaTree {
            synth: Some(synth.to_string()),
            meta: self.meta,
            children: self.children,
        }
    }
}

// =============================================================================
// HYDRATION
// =============================================================================

/// Context for one [`Synth::hydrate`](crate::synth::Synth::hydrate) call.
pub struct HydrateContext<'a> {
    walker: &'a Hydrator<'a>,
    path: Path,
    children: &'a IndexMap<String, MetaTree>,
    from_parent: Option<Value>,
    depth: usize,
}

impl<'a> HydrateContext<'a> {
    pub(crate) fn new(
        walker: &'a Hydrator<'a>,
        path: Path,
        children: &'a IndexMap<String, MetaTree>,
        from_parent: Option<Value>,
        depth: usize,
    ) -> Self {
        Self {
            walker,
            path,
            children,
            from_parent,
            depth,
        }
    }

    /// Path of the value being hydrated.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes the live instance the parent already holds, if any.
    ///
    /// A synth that receives one must use it instead of reloading.
    pub fn take_from_parent(&mut self) -> Option<Value> {
        self.from_parent.take()
    }

    /// The persistence collaborator.
    pub fn loader(&self) -> &dyn RecordLoader {
        self.walker.loader
    }

    /// Meta recorded for the child at `segment`.
    pub fn child_meta(&self, segment: &str) -> Option<&MetaTree> {
        self.children.get(segment)
    }

    /// Hydrates a nested payload through the walker.
    ///
    /// `from_parent` is handed to the child synth as its pre-loaded instance.
    pub fn hydrate_child(
        &mut self,
        segment: impl Into<Segment>,
        data: Json,
        from_parent: Option<Value>,
    ) -> Result<Value, Error> {
        let segment = segment.into();
        let meta = self.children.get(segment.as_key().as_ref());
        self.walker
            .walk(data, meta, self.path.child(segment), from_parent, self.depth + 1)
    }
}

// =============================================================================
// MUTATION
// =============================================================================

/// Context for one [`Synth::set`](crate::synth::Synth::set) or
/// [`Synth::update`](crate::synth::Synth::update) call.
pub struct SetContext<'a> {
    /// Path of the synth-owned value being written into.
    pub path_thus_far: &'a Path,
    /// Full path of the write.
    pub full_path: &'a Path,
    blueprint: &'a Blueprint,
    authorizer: &'a dyn Authorizer,
}

impl<'a> SetContext<'a> {
    pub(crate) fn new(
        path_thus_far: &'a Path,
        full_path: &'a Path,
        blueprint: &'a Blueprint,
        authorizer: &'a dyn Authorizer,
    ) -> Self {
        Self {
            path_thus_far,
            full_path,
            blueprint,
            authorizer,
        }
    }

    /// Name of the component being written.
    pub fn component(&self) -> &str {
        self.blueprint.name()
    }

    /// Fails with [`Error::AuthorizationDenied`] unless a rule covers the
    /// full path.
    pub fn authorize(&self) -> Result<(), Error> {
        if self.authorizer.has_rule_for(self.blueprint, self.full_path) {
            return Ok(());
        }
        debug!(
            component = self.blueprint.name(),
            path = %self.full_path,
            "write denied: no rule for path"
        );
        Err(Error::AuthorizationDenied {
            path: self.full_path.to_string(),
            component: self.blueprint.name().to_string(),
        })
    }

    /// A [`Error::PropertyNotFound`] for the full path.
    pub fn not_found(&self) -> Error {
        Error::PropertyNotFound {
            path: self.full_path.to_string(),
            component: self.blueprint.name().to_string(),
        }
    }
}
