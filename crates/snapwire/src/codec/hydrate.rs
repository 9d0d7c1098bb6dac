//! Meta-driven hydration walker.
//!
//! Hydration starts from data alone, so the synth for a node is taken from
//! the meta tree rather than derived from a runtime value. Nodes without
//! meta are plain JSON.

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::trace;

use crate::codec::context::HydrateContext;
use crate::codec::envelope::MetaTree;
use crate::error::Error;
use crate::model::{Path, Segment, Value};
use crate::store::RecordLoader;
use crate::synth::SynthRegistry;

/// Turns `{data, meta}` back into live values.
pub(crate) struct Hydrator<'a> {
    pub(crate) registry: &'a SynthRegistry,
    pub(crate) loader: &'a dyn RecordLoader,
    pub(crate) max_depth: usize,
}

impl<'a> Hydrator<'a> {
    /// Hydrates `data` found at `path`, guided by `meta`.
    pub(crate) fn walk(
        &self,
        data: Json,
        meta: Option<&MetaTree>,
        path: Path,
        from_parent: Option<Value>,
        depth: usize,
    ) -> Result<Value, Error> {
        if depth > self.max_depth {
            return Err(Error::DepthExceeded {
                path: path.to_string(),
                max: self.max_depth,
            });
        }

        let Some(meta) = meta.filter(|m| !m.is_empty()) else {
            return Ok(Value::from_json(data));
        };

        let Some(key) = meta.synth.as_deref() else {
            return self.walk_container(data, &meta.children, path, depth);
        };

        let (inner, tag) = split_pair(data, &path)?;
        if tag != key {
            return Err(Error::malformed(&path, "type key does not match meta"));
        }
        let synth = self.registry.get(key).ok_or_else(|| Error::UnknownTypeKey {
            key: key.to_string(),
            path: path.to_string(),
        })?;
        trace!(path = %path, synth = key, "hydrate");

        let mut ctx = HydrateContext::new(self, path, &meta.children, from_parent, depth);
        synth.hydrate(inner, &meta.meta, &mut ctx)
    }

    fn walk_container(
        &self,
        data: Json,
        children: &IndexMap<String, MetaTree>,
        path: Path,
        depth: usize,
    ) -> Result<Value, Error> {
        match data {
            Json::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let meta = children.get(&i.to_string());
                    out.push(self.walk(item, meta, path.child(Segment::Index(i)), None, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            Json::Object(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    let meta = children.get(&key);
                    let value = self.walk(item, meta, path.child(Segment::Key(key.clone())), None, depth + 1)?;
                    out.insert(key, value);
                }
                Ok(Value::Object(out))
            }
            _ => Err(Error::malformed(&path, "child meta on a primitive value")),
        }
    }
}

/// Splits a synth node `[inner, typeKey]`.
fn split_pair(data: Json, path: &Path) -> Result<(Json, String), Error> {
    let Json::Array(mut pair) = data else {
        return Err(Error::malformed(path, "synth node is not a [data, key] pair"));
    };
    if pair.len() != 2 {
        return Err(Error::malformed(path, "synth node is not a [data, key] pair"));
    }
    let Json::String(tag) = pair.pop().unwrap_or(Json::Null) else {
        return Err(Error::malformed(path, "synth type key is not a string"));
    };
    let inner = pair.pop().unwrap_or(Json::Null);
    Ok((inner, tag))
}
