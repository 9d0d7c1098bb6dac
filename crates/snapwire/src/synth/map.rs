//! Typed keyed maps, serialized as ordered `[key, value]` pairs so that key
//! order survives any JSON implementation on the client.

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::codec::{DehydrateContext, HydrateContext, Meta, SetContext};
use crate::error::Error;
use crate::model::{Segment, Value};
use crate::synth::Synth;

/// Synth for [`Value::Map`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MapSynth;

impl Synth for MapSynth {
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error> {
        let Value::Map(map) = value else {
            return Err(Error::InvalidValue {
                path: ctx.path().to_string(),
                expected: "map",
                found: value.kind(),
            });
        };
        let mut pairs = Vec::with_capacity(map.len());
        for (key, item) in map {
            let segment = Segment::Key(key.clone());
            let hints = ctx.hints().scoped(&segment);
            let child = ctx.dehydrate_child(segment, item, hints)?;
            pairs.push(Json::Array(vec![Json::String(key.clone()), child]));
        }
        Ok(Json::Array(pairs))
    }

    fn hydrate(&self, data: Json, _meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error> {
        let Json::Array(pairs) = data else {
            return Err(Error::malformed(ctx.path(), "map data is not an array of pairs"));
        };
        let mut out = IndexMap::with_capacity(pairs.len());
        for pair in pairs {
            let (key, item) = match pair {
                Json::Array(mut kv) if kv.len() == 2 => {
                    let item = kv.pop().unwrap_or(Json::Null);
                    match kv.pop() {
                        Some(Json::String(key)) => (key, item),
                        _ => return Err(Error::malformed(ctx.path(), "map key is not a string")),
                    }
                }
                _ => return Err(Error::malformed(ctx.path(), "map entry is not a [key, value] pair")),
            };
            let value = ctx.hydrate_child(Segment::Key(key.clone()), item, None)?;
            out.insert(key, value);
        }
        Ok(Value::Map(out))
    }

    fn get<'v>(&self, target: &'v Value, key: &Segment) -> Option<&'v Value> {
        match target {
            Value::Map(map) => map.get(key.as_key().as_ref()),
            _ => None,
        }
    }

    fn get_mut<'v>(&self, target: &'v mut Value, key: &Segment) -> Option<&'v mut Value> {
        match target {
            Value::Map(map) => map.get_mut(key.as_key().as_ref()),
            _ => None,
        }
    }

    fn set(&self, target: &mut Value, key: &Segment, value: Value, ctx: &SetContext<'_>) -> Result<(), Error> {
        let Value::Map(map) = target else {
            return Err(ctx.not_found());
        };
        map.insert(key.as_key().into_owned(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::{Codec, Envelope};
    use crate::model::{Blueprint, Path};
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_map_keeps_insertion_order() {
        let codec = Codec::new(Arc::new(MemoryStore::new("main")));
        let mut map = IndexMap::new();
        map.insert("zeta".to_string(), Value::Int(1));
        map.insert("alpha".to_string(), Value::Map(IndexMap::new()));
        let value = Value::Map(map);

        let envelope = codec
            .dehydrate_value(&value, &Blueprint::new("c"), &Path::root())
            .unwrap();
        assert_eq!(
            envelope.data,
            json!([[["zeta", 1], ["alpha", [[], "map"]]], "map"])
        );
        assert_eq!(codec.hydrate_value(&envelope).unwrap(), value);
    }

    #[test]
    fn test_numeric_looking_keys_stay_keys() {
        let codec = Codec::new(Arc::new(MemoryStore::new("main")));
        let envelope: Envelope = serde_json::from_value(json!({
            "data": [[["10", ["x", "enum"]]], "map"],
            "meta": {"s": "map", "c": {"10": {"s": "enum", "m": {"type": "Kind"}}}}
        }))
        .unwrap();

        let value = codec.hydrate_value(&envelope).unwrap();
        let Value::Map(map) = &value else {
            panic!("expected map");
        };
        assert!(matches!(map.get("10"), Some(Value::Enum(_))));
    }

    #[test]
    fn test_malformed_pairs() {
        let codec = Codec::new(Arc::new(MemoryStore::new("main")));
        for data in [json!([[["k"]], "map"]), json!([[[1, "v"]], "map"]), json!([{"k": 1}, "map"])] {
            let envelope = Envelope {
                data,
                meta: serde_json::from_value(json!({"s": "map"})).unwrap(),
            };
            assert!(matches!(
                codec.hydrate_value(&envelope),
                Err(Error::MalformedSnapshot { .. })
            ));
        }
    }
}
