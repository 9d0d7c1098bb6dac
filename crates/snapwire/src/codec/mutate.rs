//! Path-addressed reads, writes and method calls on component state.
//!
//! At every step where the current node is synth-owned, the step is
//! delegated to that synth, so container policy such as record write
//! authorization applies at any nesting depth. A write only ever touches
//! the subtree under the synth that receives it.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::debug;

use crate::codec::context::SetContext;
use crate::error::Error;
use crate::model::{Blueprint, ComponentState, Path, Segment, Value};
use crate::synth::SynthRegistry;
use crate::validate::Authorizer;

/// Side effects recorded by synth method calls, for the calling layer to
/// forward to the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    entries: IndexMap<String, Json>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an effect, replacing an earlier one with the same key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Json)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All effects as one JSON object.
    pub fn to_json(&self) -> Json {
        Json::Object(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

pub(crate) struct Mutator<'a> {
    pub(crate) registry: &'a SynthRegistry,
    pub(crate) authorizer: &'a dyn Authorizer,
}

impl<'a> Mutator<'a> {
    /// Reads the value at `path`.
    pub(crate) fn get<'s>(&self, state: &'s mut ComponentState, path: &Path) -> Result<&'s Value, Error> {
        let (first, rest) = split(path)?;
        let blueprint = Arc::clone(state.blueprint());

        let mut node = state.property(&first.as_key())?;
        for segment in rest {
            node = self
                .child(node, segment)
                .ok_or_else(|| not_found_for(path, &blueprint))?;
        }
        Ok(node)
    }

    /// Writes `value` at `path`.
    pub(crate) fn set(&self, state: &mut ComponentState, path: &Path, value: Value) -> Result<(), Error> {
        let (first, rest) = split(path)?;
        let property = first.as_key();
        let blueprint = Arc::clone(state.blueprint());
        ensure_unlocked(&blueprint, &property)?;

        let Some((last, middle)) = rest.split_last() else {
            if !state.has(&property) {
                return Err(not_found_for(path, &blueprint));
            }
            debug!(component = blueprint.name(), path = %path, "set property");
            state.set(property.into_owned(), value);
            return Ok(());
        };

        let mut node = state.property_mut(&property)?;
        let mut walked = Path::root().child(first.clone());
        for segment in middle {
            node = self
                .child_mut(node, segment)
                .ok_or_else(|| not_found_for(path, &blueprint))?;
            walked.push(segment.clone());
        }

        let ctx = SetContext::new(&walked, path, &blueprint, self.authorizer);
        debug!(component = blueprint.name(), path = %path, "set nested");
        match self.registry.resolve(node) {
            Some((_, synth)) => synth.set(node, last, value, &ctx),
            None => raw_set(node, last, value, &ctx),
        }
    }

    /// Converts a raw client update at `path` and writes it.
    ///
    /// If the current value is synth-owned, the synth decides how the JSON
    /// becomes a value.
    pub(crate) fn update(&self, state: &mut ComponentState, path: &Path, data: Json) -> Result<(), Error> {
        let (first, _) = split(path)?;
        let blueprint = Arc::clone(state.blueprint());
        ensure_unlocked(&blueprint, &first.as_key())?;

        let walked = path.parent().unwrap_or_default();
        let ctx = SetContext::new(&walked, path, &blueprint, self.authorizer);
        let value = match self.get(state, path) {
            Ok(current) => match self.registry.resolve(current) {
                Some((_, synth)) => synth.update(current, data, &ctx)?,
                None => Value::from_json(data),
            },
            Err(Error::PropertyNotFound { .. }) => Value::from_json(data),
            Err(err) => return Err(err),
        };
        self.set(state, path, value)
    }

    /// Calls `method` on the synth-owned value at `path`.
    pub(crate) fn call(
        &self,
        state: &mut ComponentState,
        path: &Path,
        method: &str,
        params: Vec<Value>,
    ) -> Result<(Value, Effects), Error> {
        let (first, rest) = split(path)?;
        let blueprint = Arc::clone(state.blueprint());
        ensure_unlocked(&blueprint, &first.as_key())?;

        let mut node = state.property_mut(&first.as_key())?;
        for segment in rest {
            node = self
                .child_mut(node, segment)
                .ok_or_else(|| not_found_for(path, &blueprint))?;
        }

        let method_not_found = || Error::MethodNotFound {
            method: method.to_string(),
            path: path.to_string(),
        };
        let Some((_, synth)) = self.registry.resolve(node) else {
            return Err(method_not_found());
        };
        if !synth.methods(node).iter().any(|m| *m == method) {
            return Err(method_not_found());
        }

        debug!(component = blueprint.name(), path = %path, method, "call");
        let mut effects = Effects::new();
        // a path-less MethodNotFound is reported at the called path
        let result = synth
            .call(node, method, params, &mut effects)
            .map_err(|err| match err {
                Error::MethodNotFound { method, path: p } if p.is_empty() => Error::MethodNotFound {
                    method,
                    path: path.to_string(),
                },
                other => other,
            })?;
        Ok((result, effects))
    }

    fn child<'v>(&self, node: &'v Value, segment: &Segment) -> Option<&'v Value> {
        match self.registry.resolve(node) {
            Some((_, synth)) => synth.get(node, segment),
            None => match node {
                Value::Array(items) => segment.as_index().and_then(|i| items.get(i)),
                Value::Object(map) => map.get(segment.as_key().as_ref()),
                _ => None,
            },
        }
    }

    fn child_mut<'v>(&self, node: &'v mut Value, segment: &Segment) -> Option<&'v mut Value> {
        match self.registry.resolve(node) {
            Some((_, synth)) => synth.get_mut(node, segment),
            None => match node {
                Value::Array(items) => segment.as_index().and_then(|i| items.get_mut(i)),
                Value::Object(map) => map.get_mut(segment.as_key().as_ref()),
                _ => None,
            },
        }
    }
}

fn raw_set(node: &mut Value, segment: &Segment, value: Value, ctx: &SetContext<'_>) -> Result<(), Error> {
    match node {
        Value::Array(items) => {
            let index = segment.as_index().ok_or_else(|| ctx.not_found())?;
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return Err(ctx.not_found());
            }
            Ok(())
        }
        Value::Object(map) => {
            map.insert(segment.as_key().into_owned(), value);
            Ok(())
        }
        _ => Err(ctx.not_found()),
    }
}

fn split(path: &Path) -> Result<(&Segment, &[Segment]), Error> {
    path.split_first().ok_or_else(|| Error::InvalidPath {
        path: String::new(),
        reason: "empty path",
    })
}

fn ensure_unlocked(blueprint: &Blueprint, property: &str) -> Result<(), Error> {
    if blueprint.is_locked(property) {
        debug!(component = blueprint.name(), property, "write denied: locked");
        return Err(Error::LockedProperty {
            property: property.to_string(),
            component: blueprint.name().to_string(),
        });
    }
    Ok(())
}

fn not_found_for(path: &Path, blueprint: &Blueprint) -> Error {
    Error::PropertyNotFound {
        path: path.to_string(),
        component: blueprint.name().to_string(),
    }
}
