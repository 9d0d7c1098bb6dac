//! Depth-first dehydration walker.

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::trace;

use crate::codec::context::{DehydrateContext, ParentHints};
use crate::codec::envelope::MetaTree;
use crate::error::Error;
use crate::model::{Blueprint, Path, Segment, Value};
use crate::store::RecordLoader;
use crate::synth::SynthRegistry;
use crate::validate::Authorizer;

/// Turns live values into `{data, meta}`.
pub(crate) struct Dehydrator<'a> {
    pub(crate) registry: &'a SynthRegistry,
    pub(crate) authorizer: &'a dyn Authorizer,
    pub(crate) loader: &'a dyn RecordLoader,
    pub(crate) blueprint: &'a Blueprint,
    pub(crate) max_depth: usize,
}

impl<'a> Dehydrator<'a> {
    /// Dehydrates `value` found at `path`.
    ///
    /// Returns the wire data and, if any synth was involved at or below this
    /// node, the meta tree for it.
    pub(crate) fn walk(
        &self,
        value: &Value,
        path: Path,
        hints: ParentHints,
        depth: usize,
    ) -> Result<(Json, Option<MetaTree>), Error> {
        if depth > self.max_depth {
            return Err(Error::DepthExceeded {
                path: path.to_string(),
                max: self.max_depth,
            });
        }

        match value {
            Value::Null => Ok((Json::Null, None)),
            Value::Bool(b) => Ok((Json::Bool(*b), None)),
            Value::Int(i) => Ok((Json::from(*i), None)),
            Value::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Ok((Json::Number(n), None)),
                None => Err(Error::NonFiniteFloat {
                    path: path.to_string(),
                }),
            },
            Value::Str(s) => Ok((Json::String(s.clone()), None)),
            Value::Array(items) => {
                let mut data = Vec::with_capacity(items.len());
                let mut children = IndexMap::new();
                for (i, item) in items.iter().enumerate() {
                    let segment = Segment::Index(i);
                    let (child, meta) =
                        self.walk(item, path.child(segment.clone()), hints.scoped(&segment), depth + 1)?;
                    if let Some(meta) = meta {
                        children.insert(i.to_string(), meta);
                    }
                    data.push(child);
                }
                Ok((Json::Array(data), container_meta(children)))
            }
            Value::Object(map) => {
                let mut data = serde_json::Map::with_capacity(map.len());
                let mut children = IndexMap::new();
                for (key, item) in map {
                    let segment = Segment::Key(key.clone());
                    let (child, meta) =
                        self.walk(item, path.child(segment.clone()), hints.scoped(&segment), depth + 1)?;
                    if let Some(meta) = meta {
                        children.insert(key.clone(), meta);
                    }
                    data.insert(key.clone(), child);
                }
                Ok((Json::Object(data), container_meta(children)))
            }
            _ => {
                let Some((key, synth)) = self.registry.resolve(value) else {
                    let type_name = match value {
                        Value::Custom(custom) => (**custom).type_name(),
                        other => other.kind(),
                    };
                    return Err(Error::UnsupportedValue {
                        type_name: type_name.to_string(),
                        path: path.to_string(),
                    });
                };
                trace!(path = %path, synth = key, "dehydrate");

                let mut ctx = DehydrateContext::new(self, path, hints, depth);
                let inner = synth.dehydrate(value, &mut ctx)?;
                Ok((Json::Array(vec![inner, Json::from(key)]), Some(ctx.finish(key))))
            }
        }
    }
}

fn container_meta(children: IndexMap<String, MetaTree>) -> Option<MetaTree> {
    if children.is_empty() {
        return None;
    }
    Some(MetaTree {
        synth: None,
        meta: Default::default(),
        children,
    })
}
