//! Typed ordered collections.

use serde_json::Value as Json;

use crate::codec::{DehydrateContext, HydrateContext, Meta, SetContext};
use crate::error::Error;
use crate::model::{Segment, Value};
use crate::synth::Synth;

/// Synth for [`Value::Collection`]. Inner data is the array of child data.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionSynth;

impl Synth for CollectionSynth {
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Collection(_))
    }

    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error> {
        let Value::Collection(items) = value else {
            return Err(Error::InvalidValue {
                path: ctx.path().to_string(),
                expected: "collection",
                found: value.kind(),
            });
        };
        let mut data = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let segment = Segment::Index(i);
            let hints = ctx.hints().scoped(&segment);
            data.push(ctx.dehydrate_child(segment, item, hints)?);
        }
        Ok(Json::Array(data))
    }

    fn hydrate(&self, data: Json, _meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error> {
        let Json::Array(items) = data else {
            return Err(Error::malformed(ctx.path(), "collection data is not an array"));
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            out.push(ctx.hydrate_child(i, item, None)?);
        }
        Ok(Value::Collection(out))
    }

    fn get<'v>(&self, target: &'v Value, key: &Segment) -> Option<&'v Value> {
        match target {
            Value::Collection(items) => key.as_index().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    fn get_mut<'v>(&self, target: &'v mut Value, key: &Segment) -> Option<&'v mut Value> {
        match target {
            Value::Collection(items) => key.as_index().and_then(|i| items.get_mut(i)),
            _ => None,
        }
    }

    fn set(&self, target: &mut Value, key: &Segment, value: Value, ctx: &SetContext<'_>) -> Result<(), Error> {
        let Value::Collection(items) = target else {
            return Err(ctx.not_found());
        };
        let index = key.as_index().ok_or_else(|| ctx.not_found())?;
        match index {
            i if i < items.len() => items[i] = value,
            i if i == items.len() => items.push(value),
            _ => return Err(ctx.not_found()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::Codec;
    use crate::model::{Blueprint, Path};
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_collection_wire_shape() {
        let codec = Codec::new(Arc::new(MemoryStore::new("main")));
        let value = Value::Collection(vec![Value::Int(1), Value::Collection(vec![Value::from("a")])]);
        let envelope = codec
            .dehydrate_value(&value, &Blueprint::new("c"), &Path::root())
            .unwrap();

        assert_eq!(envelope.data, json!([[1, [["a"], "clctn"]], "clctn"]));
        assert_eq!(envelope.meta.synth.as_deref(), Some("clctn"));
        assert_eq!(envelope.meta.at("1").and_then(|m| m.synth.as_deref()), Some("clctn"));
        assert_eq!(codec.hydrate_value(&envelope).unwrap(), value);
    }

    #[test]
    fn test_set_appends_at_len() {
        let blueprint = Arc::new(Blueprint::new("list"));
        let mut state = blueprint.instantiate();
        state.set("items", Value::Collection(vec![Value::Int(1)]));

        let codec = Codec::new(Arc::new(MemoryStore::new("main")));
        codec
            .resolve_and_mutate(&mut state, &Path::parse("items.1").unwrap(), Value::Int(2))
            .unwrap();
        codec
            .resolve_and_mutate(&mut state, &Path::parse("items.0").unwrap(), Value::Int(0))
            .unwrap();
        assert_eq!(
            state.peek("items"),
            Some(&Value::Collection(vec![Value::Int(0), Value::Int(2)]))
        );

        let err = codec
            .resolve_and_mutate(&mut state, &Path::parse("items.5").unwrap(), Value::Int(5))
            .unwrap_err();
        assert!(matches!(err, Error::PropertyNotFound { .. }));
    }
}
