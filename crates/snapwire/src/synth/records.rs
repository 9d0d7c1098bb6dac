//! Records and record collections backed by the persistence collaborator.
//!
//! Only identity travels as metadata: model, natural key(s), a non-default
//! connection and the eager-loaded relation paths. Record contents are
//! emitted only where a rule exists for the path, and are reloaded from the
//! store on the next request.
//!
//! When a parent already holds a loaded child (a record's eager-loaded
//! `posts`, a collection's elements), it hands the instance down through
//! [`HydrateContext::hydrate_child`] so the child never reloads it.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use tracing::warn;

use crate::codec::{DehydrateContext, HydrateContext, Meta, ParentHints, SetContext};
use crate::error::Error;
use crate::model::{Path, Record, RecordCollection, Scalar, Segment, Value};
use crate::store::RecordLoader;
use crate::synth::{meta_str, meta_strings, Synth};

// =============================================================================
// SHARED
// =============================================================================

/// Identity metadata common to both synths.
struct Identity {
    model: String,
    connection: Option<String>,
    relations: Vec<String>,
}

impl Identity {
    fn read(meta: &Meta, path: &Path) -> Result<Self, Error> {
        let connection = match meta.get("connection") {
            None => None,
            Some(Json::String(c)) => Some(c.clone()),
            Some(_) => return Err(Error::malformed(path, "connection is not a string")),
        };
        Ok(Self {
            model: meta_str(meta, "model", path)?.to_string(),
            connection,
            relations: meta_strings(meta, "relations", path)?,
        })
    }

    fn load(&self, loader: &dyn RecordLoader, keys: &[Scalar]) -> Result<Vec<Record>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        loader.load_by_keys(&self.model, keys, self.connection.as_deref(), &self.relations)
    }
}

/// Records the connection only when it is not the model's default.
fn add_connection(ctx: &mut DehydrateContext<'_>, model: &str, connection: Option<&str>) {
    let Some(connection) = connection else {
        return;
    };
    if ctx.loader().default_connection(model).as_deref() != Some(connection) {
        ctx.add_meta("connection", connection);
    }
}

fn add_relations(ctx: &mut DehydrateContext<'_>, relations: Vec<String>) {
    if !relations.is_empty() {
        ctx.add_meta("relations", relations);
    }
}

fn parse_key(json: &Json, path: &Path) -> Result<Scalar, Error> {
    Scalar::from_json(json).ok_or_else(|| Error::malformed(path, "record key is not an int or string"))
}

// =============================================================================
// SINGLE RECORD
// =============================================================================

/// Synth for [`Value::Record`].
///
/// Meta: `model`, `key` (absent for unsaved records), `connection`,
/// `relations`. Inner data is `null` when no rule applies below the record,
/// otherwise an object holding the rule-covered attributes and relations.
/// Writes require a rule for the full path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordSynth;

impl Synth for RecordSynth {
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Record(_))
    }

    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error> {
        let Value::Record(record) = value else {
            return Err(Error::InvalidValue {
                path: ctx.path().to_string(),
                expected: "record",
                found: value.kind(),
            });
        };

        ctx.add_meta("model", record.model.clone());
        if let Some(key) = &record.key {
            ctx.add_meta("key", key.to_json());
        }
        add_connection(ctx, &record.model, record.connection.as_deref());
        add_relations(ctx, record.relation_paths());

        let rules = ctx.rules();
        if rules.is_empty() {
            return Ok(Json::Null);
        }

        let mut data = serde_json::Map::new();
        for (name, child) in record.attributes.iter().chain(record.relations.iter()) {
            if !rules.contains(name) {
                continue;
            }
            let hints = ParentHints::with_rules(rules.scoped(name));
            let json = ctx.dehydrate_child(Segment::Key(name.clone()), child, hints)?;
            data.insert(name.clone(), json);
        }
        Ok(Json::Object(data))
    }

    fn hydrate(&self, data: Json, meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error> {
        let identity = Identity::read(meta, ctx.path())?;
        let key = meta.get("key").map(|k| parse_key(k, ctx.path())).transpose()?;

        let mut record = match (ctx.take_from_parent(), key) {
            (Some(Value::Record(record)), _) => *record,
            (_, Some(key)) => {
                let found = identity
                    .load(ctx.loader(), std::slice::from_ref(&key))?
                    .into_iter()
                    .find(|r| r.key.as_ref() == Some(&key));
                match found {
                    Some(record) => record,
                    None => {
                        warn!(
                            model = %identity.model,
                            key = %key,
                            path = %ctx.path(),
                            "record no longer exists; hydrating as null"
                        );
                        return Ok(Value::Null);
                    }
                }
            }
            (_, None) => Record {
                connection: identity.connection.clone(),
                ..Record::new(identity.model.clone())
            },
        };

        match data {
            Json::Null => {}
            Json::Object(fields) => {
                for (name, child) in fields {
                    let is_relation = record.relations.contains_key(&name)
                        || identity
                            .relations
                            .iter()
                            .any(|p| p.split('.').next() == Some(name.as_str()));
                    let from_parent = record
                        .relations
                        .get_mut(&name)
                        .map(|slot| std::mem::replace(slot, Value::Null));
                    let value = ctx.hydrate_child(Segment::Key(name.clone()), child, from_parent)?;
                    if is_relation {
                        record.relations.insert(name, value);
                    } else {
                        record.attributes.insert(name, value);
                    }
                }
            }
            _ => return Err(Error::malformed(ctx.path(), "record data is not an object")),
        }
        Ok(Value::from(record))
    }

    fn get<'v>(&self, target: &'v Value, key: &Segment) -> Option<&'v Value> {
        target.as_record().and_then(|r| r.get(key.as_key().as_ref()))
    }

    fn get_mut<'v>(&self, target: &'v mut Value, key: &Segment) -> Option<&'v mut Value> {
        target.as_record_mut().and_then(|r| r.get_mut(key.as_key().as_ref()))
    }

    fn set(&self, target: &mut Value, key: &Segment, value: Value, ctx: &SetContext<'_>) -> Result<(), Error> {
        ctx.authorize()?;
        let record = target.as_record_mut().ok_or_else(|| ctx.not_found())?;
        record.put(key.as_key().into_owned(), value);
        Ok(())
    }

    /// A record is never replaced wholesale by client JSON.
    fn update(&self, current: &Value, _data: Json, ctx: &SetContext<'_>) -> Result<Value, Error> {
        ctx.authorize()?;
        Err(Error::InvalidValue {
            path: ctx.full_path.to_string(),
            expected: "attribute path below the record",
            found: current.kind(),
        })
    }
}

// =============================================================================
// RECORD COLLECTION
// =============================================================================

/// Synth for [`Value::Records`].
///
/// Meta: `model`, `keys`, `connection` (only when not the model default),
/// `relations`. Inner data is `null` when no rule applies, an empty array
/// when rules exist but none covers the elements, otherwise one
/// [`RecordSynth`] node per element.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCollectionSynth;

impl Synth for RecordCollectionSynth {
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Records(_))
    }

    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error> {
        let Value::Records(collection) = value else {
            return Err(Error::InvalidValue {
                path: ctx.path().to_string(),
                expected: "record collection",
                found: value.kind(),
            });
        };
        // origin first: a mixed collection must fail before anything is emitted
        let connection = collection.connection()?;

        ctx.add_meta("model", collection.model.clone());
        ctx.add_meta(
            "keys",
            collection.keys().iter().map(Scalar::to_json).collect::<Vec<_>>(),
        );
        add_connection(ctx, &collection.model, connection);
        add_relations(ctx, collection.relation_paths());

        let rules = ctx.rules();
        if rules.is_empty() {
            return Ok(Json::Null);
        }
        if !rules.has_element_rules() {
            return Ok(Json::Array(Vec::new()));
        }

        let mut data = Vec::with_capacity(collection.len());
        for (i, item) in collection.items().iter().enumerate() {
            let hints = ParentHints::with_rules(rules.element(i));
            data.push(ctx.dehydrate_child(i, item, hints)?);
        }
        Ok(Json::Array(data))
    }

    fn hydrate(&self, data: Json, meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error> {
        let identity = Identity::read(meta, ctx.path())?;

        let mut collection = match ctx.take_from_parent() {
            Some(Value::Records(collection)) => collection,
            _ => {
                let keys = match meta.get("keys") {
                    Some(Json::Array(keys)) => keys
                        .iter()
                        .map(|k| parse_key(k, ctx.path()))
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => return Err(Error::malformed(ctx.path(), "record collection lacks keys")),
                };
                let loaded = identity.load(ctx.loader(), &keys)?;
                let found = reorder(&keys, loaded);
                if found.len() < keys.len() {
                    warn!(
                        model = %identity.model,
                        missing = keys.len() - found.len(),
                        path = %ctx.path(),
                        "records no longer exist; omitted from collection"
                    );
                }
                RecordCollection::from_records(identity.model.clone(), found)
            }
        };

        let items = match data {
            Json::Null => return Ok(Value::Records(collection)),
            Json::Array(items) if items.is_empty() => return Ok(Value::Records(collection)),
            Json::Array(items) => items,
            _ => return Err(Error::malformed(ctx.path(), "record collection data is not an array")),
        };

        // Thread each loaded element back to the child that describes it.
        // A key may repeat, so every key owns a queue in collection order.
        let mut loaded: FxHashMap<Scalar, VecDeque<Value>> = FxHashMap::default();
        for item in std::mem::take(collection.items_mut()) {
            if let Some(key) = item.as_record().and_then(|r| r.key.clone()) {
                loaded.entry(key).or_default().push_back(item);
            }
        }

        for (i, child) in items.into_iter().enumerate() {
            let child_key = ctx
                .child_meta(&i.to_string())
                .and_then(|m| m.meta.get("key"))
                .and_then(Scalar::from_json);
            let from_parent = match child_key {
                Some(key) => match loaded.get_mut(&key).and_then(VecDeque::pop_front) {
                    Some(instance) => Some(instance),
                    None => continue,
                },
                None => None,
            };
            match ctx.hydrate_child(i, child, from_parent)? {
                Value::Record(record) => collection.push(*record),
                Value::Null => {}
                other => {
                    return Err(Error::InvalidValue {
                        path: ctx.path().child(i).to_string(),
                        expected: "record",
                        found: other.kind(),
                    });
                }
            }
        }
        Ok(Value::Records(collection))
    }

    fn get<'v>(&self, target: &'v Value, key: &Segment) -> Option<&'v Value> {
        match target {
            Value::Records(collection) => key.as_index().and_then(|i| collection.items().get(i)),
            _ => None,
        }
    }

    fn get_mut<'v>(&self, target: &'v mut Value, key: &Segment) -> Option<&'v mut Value> {
        match target {
            Value::Records(collection) => key
                .as_index()
                .and_then(|i| collection.items_mut().get_mut(i)),
            _ => None,
        }
    }

    fn set(&self, target: &mut Value, key: &Segment, value: Value, ctx: &SetContext<'_>) -> Result<(), Error> {
        ctx.authorize()?;
        let Value::Records(collection) = target else {
            return Err(ctx.not_found());
        };
        if !matches!(value, Value::Record(_)) {
            return Err(Error::InvalidValue {
                path: ctx.full_path.to_string(),
                expected: "record",
                found: value.kind(),
            });
        }
        let index = key.as_index().ok_or_else(|| ctx.not_found())?;
        let items = collection.items_mut();
        match index {
            i if i < items.len() => items[i] = value,
            i if i == items.len() => items.push(value),
            _ => return Err(ctx.not_found()),
        }
        Ok(())
    }

    /// A collection is never replaced wholesale by client JSON.
    fn update(&self, current: &Value, _data: Json, ctx: &SetContext<'_>) -> Result<Value, Error> {
        ctx.authorize()?;
        Err(Error::InvalidValue {
            path: ctx.full_path.to_string(),
            expected: "element path below the collection",
            found: current.kind(),
        })
    }
}

/// Puts loaded records in key order. A repeated key yields one copy per
/// occurrence; keys that were not found are dropped.
fn reorder(keys: &[Scalar], loaded: Vec<Record>) -> Vec<Record> {
    let by_key: FxHashMap<Scalar, Record> = loaded
        .into_iter()
        .filter_map(|r| Some((r.key.clone()?, r)))
        .collect();
    keys.iter().filter_map(|k| by_key.get(k).cloned()).collect()
}
