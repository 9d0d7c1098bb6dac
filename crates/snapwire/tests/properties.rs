//! Round-trip laws over generated value trees.

use std::sync::Arc;

use indexmap::IndexMap;
use proptest::prelude::*;
use snapwire::model::builder::RecordBuilder;
use snapwire::{
    Blueprint, Codec, EnumCase, Form, MemoryStore, Path, Record, RecordCollection, Scalar, Snapshot,
    TemporaryUpload, Value,
};

const STORED_POSTS: i64 = 5;

/// A post exactly as the seeded store returns it.
fn post(key: i64) -> Record {
    RecordBuilder::new("Post")
        .key(key)
        .connection("main")
        .attr("title", format!("Post {key}"))
        .build()
}

fn codec() -> Codec {
    let store = MemoryStore::new("main");
    for key in 1..=STORED_POSTS {
        store.insert(post(key)).unwrap();
    }
    Codec::new(Arc::new(store))
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        // quarters print exactly, so text round trips stay lossless
        (-4_000_000i32..4_000_000).prop_map(|n| Value::Float(f64::from(n) / 4.0)),
        ".{0,12}".prop_map(Value::Str),
        (name(), prop_oneof![
            any::<i64>().prop_map(Scalar::Int),
            name().prop_map(Scalar::Str),
        ])
            .prop_map(|(ty, v)| Value::Enum(EnumCase::new(ty, v))),
        ("[A-Za-z0-9_-]{1,16}", name(), any::<u64>()).prop_map(|(id, file, size)| {
            Value::Upload(TemporaryUpload::new(id, file, "application/octet-stream", size))
        }),
        records(),
    ]
}

/// Collections of stored posts; a key may repeat.
fn records() -> impl Strategy<Value = Value> {
    prop::collection::vec(1..=STORED_POSTS, 0..5).prop_map(|keys| {
        Value::from(RecordCollection::from_records("Post", keys.into_iter().map(post)))
    })
}

fn keyed(inner: BoxedStrategy<Value>) -> impl Strategy<Value = IndexMap<String, Value>> {
    prop::collection::vec((name(), inner), 0..4).prop_map(|pairs| pairs.into_iter().collect())
}

/// Arbitrary trees of every value kind, up to six levels deep.
fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(6, 64, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            keyed(inner.clone()).prop_map(Value::Object),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Collection),
            keyed(inner.clone()).prop_map(Value::Map),
            (name(), keyed(inner)).prop_map(|(form, fields)| Value::Form(Form { name: form, fields })),
        ]
    })
}

proptest! {
    #[test]
    fn test_hydrate_inverts_dehydrate(value in value()) {
        let codec = codec();
        let envelope = codec
            .dehydrate_value(&value, &Blueprint::new("c"), &Path::parse("p").unwrap())
            .unwrap();
        prop_assert_eq!(codec.hydrate_value(&envelope).unwrap(), value);
    }

    #[test]
    fn test_dehydrate_is_idempotent(value in value()) {
        let codec = codec();
        let blueprint = Blueprint::new("c");
        let path = Path::parse("p").unwrap();
        let first = codec.dehydrate_value(&value, &blueprint, &path).unwrap();
        let restored = codec.hydrate_value(&first).unwrap();
        let second = codec.dehydrate_value(&restored, &blueprint, &path).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_ruled_records_round_trip(value in records()) {
        let codec = codec();
        let blueprint = Blueprint::new("c").rule("p.*.title", "required");
        let path = Path::parse("p").unwrap();
        let first = codec.dehydrate_value(&value, &blueprint, &path).unwrap();
        let restored = codec.hydrate_value(&first).unwrap();
        prop_assert_eq!(&restored, &value);
        prop_assert_eq!(codec.dehydrate_value(&restored, &blueprint, &path).unwrap(), first);
    }

    #[test]
    fn test_snapshot_survives_wire_text(values in prop::collection::vec((name(), value()), 0..6)) {
        let codec = codec();
        let blueprint = Arc::new(Blueprint::new("c"));
        let mut state = blueprint.instantiate();
        for (name, value) in values {
            state.set(name, value);
        }
        let snapshot = codec.dehydrate(&mut state).unwrap();
        let received = Snapshot::from_json_str(&snapshot.to_json_string().unwrap()).unwrap();
        let restored = codec.hydrate(&received, &blueprint).unwrap();
        prop_assert_eq!(restored.properties(), state.properties());
    }
}

#[test]
fn test_deeply_mixed_nesting() {
    // map -> collection -> object -> form -> array -> enum
    let mut form = Form::new("Filter");
    form.fields.insert(
        "statuses".to_string(),
        Value::Array(vec![Value::Enum(EnumCase::new("Status", "open")), Value::Int(3)]),
    );
    let mut object = IndexMap::new();
    object.insert("filter".to_string(), Value::Form(form));
    let mut map = IndexMap::new();
    map.insert(
        "views".to_string(),
        Value::Collection(vec![Value::Object(object), Value::Null]),
    );
    let value = Value::Map(map);

    let codec = codec();
    let envelope = codec
        .dehydrate_value(&value, &Blueprint::new("c"), &Path::parse("state").unwrap())
        .unwrap();
    let enum_meta = envelope.meta.at("views.0.filter.statuses.0").unwrap();
    assert_eq!(enum_meta.synth.as_deref(), Some("enum"));
    // plain containers on the way down carry no synth of their own
    assert!(envelope.meta.at("views.0").unwrap().synth.is_none());
    assert!(envelope.meta.at("views.0.filter.statuses.1").is_none());

    assert_eq!(codec.hydrate_value(&envelope).unwrap(), value);
}
