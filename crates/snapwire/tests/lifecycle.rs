//! Component request cycle: mount, round-trip through JSON text, update,
//! re-dehydrate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use serde_json::json;
use snapwire::model::builder::FormBuilder;
use snapwire::{
    Blueprint, Codec, CodecOptions, EnumCase, Envelope, Error, ErrorCode, Fingerprint, MemoryStore,
    MetaTree, Path, Snapshot, TemporaryUpload, Value,
};

fn codec() -> Codec {
    Codec::new(Arc::new(MemoryStore::new("main")))
        .with_options(CodecOptions::new().checksum_key("app-secret"))
}

fn path(p: &str) -> Path {
    Path::parse(p).unwrap()
}

fn mounted(blueprint: &Arc<Blueprint>) -> snapwire::ComponentState {
    let mut state = blueprint.instantiate();
    state.set("count", 3i64);
    state.set("title", "Draft");
    state.set("ratio", 0.5);
    state.set("status", EnumCase::new("Status", "draft"));
    state.set(
        "form",
        FormBuilder::new("PostForm")
            .field("title", "")
            .field("tags", Value::Collection(vec!["a".into(), "b".into()]))
            .build(),
    );
    state.set("avatar", TemporaryUpload::new("f00d.png", "me.png", "image/png", 512));
    state.set("settings", Value::from_json(json!({"theme": "dark", "sizes": [1, 2]})));
    state
}

#[test]
fn test_full_request_cycle() {
    let codec = codec();
    let blueprint = Arc::new(Blueprint::new("post-editor"));
    let mut state = mounted(&blueprint);

    let snapshot = codec.dehydrate(&mut state).unwrap();
    assert_eq!(snapshot.fingerprint.name, "post-editor");
    assert_eq!(snapshot.fingerprint.id, state.id());
    assert_eq!(snapshot.data["count"], json!(3));
    assert_eq!(snapshot.data["status"], json!(["draft", "enum"]));
    assert_eq!(snapshot.data["avatar"], json!(["upload:f00d.png", "file"]));
    assert_eq!(
        snapshot.data["form"],
        json!([{"title": "", "tags": [["a", "b"], "clctn"]}, "form"])
    );
    // plain values carry no meta
    assert!(snapshot.meta.child("count").is_none());
    assert!(snapshot.meta.child("settings").is_none());
    assert_eq!(
        snapshot.meta.at("form.tags").and_then(|m| m.synth.as_deref()),
        Some("clctn")
    );

    let wire = snapshot.to_json_string().unwrap();
    let received = Snapshot::from_json_str(&wire).unwrap();
    let mut restored = codec.hydrate(&received, &blueprint).unwrap();
    assert_eq!(restored.id(), state.id());
    assert_eq!(restored.properties(), state.properties());

    codec
        .apply_updates(
            &mut restored,
            [
                ("count", json!(4)),
                ("form.title", json!("Hello")),
                ("form.tags.2", json!("c")),
                ("settings.theme", json!("light")),
                ("status", json!("published")),
            ],
        )
        .unwrap();

    let next = codec.dehydrate(&mut restored).unwrap();
    assert_eq!(next.data["count"], json!(4));
    assert_eq!(
        next.data["form"],
        json!([{"title": "Hello", "tags": [["a", "b", "c"], "clctn"]}, "form"])
    );
    assert_eq!(next.data["settings"], json!({"theme": "light", "sizes": [1, 2]}));
    assert_eq!(next.data["status"], json!(["published", "enum"]));
    assert_ne!(next.checksum, snapshot.checksum);
}

#[test]
fn test_redehydration_is_idempotent() {
    let codec = codec();
    let blueprint = Arc::new(Blueprint::new("post-editor"));
    let mut state = mounted(&blueprint);

    let first = codec.dehydrate(&mut state).unwrap();
    let mut restored = codec.hydrate(&first, &blueprint).unwrap();
    let second = codec.dehydrate(&mut restored).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_map_scenario() {
    let codec = codec();

    let envelope: Envelope = serde_json::from_value(json!({
        "data": [[["k1", "v1"]], "map"],
        "meta": {"s": "map"}
    }))
    .unwrap();
    let value = codec.hydrate_value(&envelope).unwrap();
    let mut expected = IndexMap::new();
    expected.insert("k1".to_string(), Value::from("v1"));
    assert_eq!(value, Value::Map(expected));

    let blueprint = Arc::new(Blueprint::new("tagger"));
    let mut meta = MetaTree::default();
    meta.children.insert("tags".to_string(), envelope.meta.clone());
    let mut snapshot = Snapshot {
        fingerprint: Fingerprint {
            id: "c0ffee".to_string(),
            name: "tagger".to_string(),
        },
        data: json!({"tags": envelope.data}),
        meta,
        checksum: String::new(),
    };
    snapshot.seal(b"app-secret").unwrap();

    let mut state = codec.hydrate(&snapshot, &blueprint).unwrap();
    codec
        .resolve_and_mutate(&mut state, &path("tags.k1"), Value::from("v2"))
        .unwrap();
    let next = codec.dehydrate(&mut state).unwrap();
    assert_eq!(next.data["tags"], json!([[["k1", "v2"]], "map"]));
}

#[test]
fn test_tampered_snapshot_rejected() {
    let codec = codec();
    let blueprint = Arc::new(Blueprint::new("counter"));
    let mut state = blueprint.instantiate();
    state.set("count", 1i64);

    let mut snapshot = codec.dehydrate(&mut state).unwrap();
    snapshot.data["count"] = json!(1000);
    let err = codec.hydrate(&snapshot, &blueprint).unwrap_err();
    assert_eq!(err, Error::ChecksumMismatch);
    assert_eq!(err.code(), ErrorCode::MalformedSnapshot);

    // a codec with another key cannot vouch for it either
    let mut snapshot = codec.dehydrate(&mut state).unwrap();
    let other = Codec::new(Arc::new(MemoryStore::new("main")));
    assert_eq!(other.hydrate(&snapshot, &blueprint).unwrap_err(), Error::ChecksumMismatch);

    // unless verification is off
    snapshot.data["count"] = json!(2);
    let lenient = other.with_options(CodecOptions::new().verify_checksum(false));
    let mut restored = lenient.hydrate(&snapshot, &blueprint).unwrap();
    assert_eq!(restored.get_i64("count").unwrap(), 2);
}

#[test]
fn test_locked_properties() {
    let codec = codec();
    let blueprint = Arc::new(Blueprint::new("account").lock("user_id").lock("limits"));
    let mut state = blueprint.instantiate();
    state.set("user_id", 7i64);
    state.set("limits", Value::from_json(json!({"max": 3})));
    state.set("nickname", "sam");

    let err = codec
        .resolve_and_mutate(&mut state, &path("user_id"), Value::Int(8))
        .unwrap_err();
    assert!(matches!(err, Error::LockedProperty { ref property, .. } if property == "user_id"));
    assert_eq!(err.code(), ErrorCode::AuthorizationDenied);

    let err = codec
        .apply_updates(&mut state, [("limits.max", json!(100))])
        .unwrap_err();
    assert!(matches!(err, Error::LockedProperty { .. }));

    assert_eq!(state.get_i64("user_id").unwrap(), 7);
    codec
        .resolve_and_mutate(&mut state, &path("nickname"), Value::from("max"))
        .unwrap();
    assert_eq!(state.get_str("nickname").unwrap(), "max");
}

#[test]
fn test_lazy_property_resolved_on_dehydrate() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let codec = codec();
    let blueprint = Arc::new(Blueprint::new("report"));
    let mut state = blueprint.instantiate();
    state.make_lazy("total", || {
        CALLS.fetch_add(1, Ordering::SeqCst);
        Value::Int(99)
    });
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);

    let snapshot = codec.dehydrate(&mut state).unwrap();
    assert_eq!(snapshot.data["total"], json!(99));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);

    // restored state holds the value itself
    let mut restored = codec.hydrate(&snapshot, &blueprint).unwrap();
    assert!(!restored.is_pending("total"));
    assert_eq!(restored.get_i64("total").unwrap(), 99);
}

#[test]
fn test_unknown_property_and_dead_ends() {
    let codec = codec();
    let blueprint = Arc::new(Blueprint::new("c"));
    let mut state = blueprint.instantiate();
    state.set("count", 1i64);

    assert!(matches!(
        codec.resolve_and_mutate(&mut state, &path("missing"), Value::Int(1)),
        Err(Error::PropertyNotFound { .. })
    ));
    assert!(matches!(
        codec.resolve_and_mutate(&mut state, &path("count.deeper"), Value::Int(1)),
        Err(Error::PropertyNotFound { .. })
    ));
    assert!(matches!(
        codec.get(&mut state, &path("count.0")),
        Err(Error::PropertyNotFound { .. })
    ));
    assert!(matches!(
        codec.apply_updates(&mut state, [("count..x", json!(1))]),
        Err(Error::InvalidPath { .. })
    ));
}

#[test]
fn test_fresh_ids_per_mount() {
    let codec = codec();
    let blueprint = Arc::new(Blueprint::new("c"));
    let a = codec.dehydrate(&mut blueprint.instantiate()).unwrap();
    let b = codec.dehydrate(&mut blueprint.instantiate()).unwrap();
    assert_ne!(a.fingerprint.id, b.fingerprint.id);
}
