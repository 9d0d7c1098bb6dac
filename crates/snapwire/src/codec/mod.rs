//! Dehydration, hydration and path-addressed mutation of component state.
//!
//! [`Codec`] is the entry point. It binds a synth registry, an authorizer
//! and a record loader, and exposes the whole request cycle:
//!
//! ```text
//! mount:    ComponentState ──dehydrate──▶ Snapshot ──▶ client
//! request:  client ──▶ Snapshot ──hydrate──▶ ComponentState
//!                      apply_updates / call / resolve_and_mutate
//!           ComponentState ──dehydrate──▶ Snapshot ──▶ client
//! ```

mod context;
mod dehydrate;
mod envelope;
mod hydrate;
mod mutate;

pub use context::{DehydrateContext, HydrateContext, ParentHints, SetContext};
pub use envelope::{Envelope, Fingerprint, Meta, MetaTree, Snapshot};
pub use mutate::Effects;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::Error;
use crate::limits::{DEFAULT_MAX_DEPTH, MAX_DEPTH};
use crate::model::{Blueprint, ComponentState, Path, Segment, Value};
use crate::store::RecordLoader;
use crate::synth::SynthRegistry;
use crate::validate::{Authorizer, DeclaredRules};

use dehydrate::Dehydrator;
use hydrate::Hydrator;
use mutate::Mutator;

/// Options for a [`Codec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// Maximum nesting depth for both walkers.
    ///
    /// Clamped to [`MAX_DEPTH`](crate::limits::MAX_DEPTH).
    pub max_depth: usize,
    /// Secret mixed into snapshot checksums.
    pub checksum_key: Vec<u8>,
    /// Reject snapshots whose checksum does not match on hydrate.
    pub verify_checksum: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            checksum_key: Vec::new(),
            verify_checksum: true,
        }
    }
}

impl CodecOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(MAX_DEPTH);
        self
    }

    pub fn checksum_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.checksum_key = key.into();
        self
    }

    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

/// The component state codec.
///
/// A `Codec` is immutable and cheap to clone; share one across requests.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use snapwire::{Blueprint, Codec, MemoryStore, Path, Value};
///
/// let codec = Codec::new(Arc::new(MemoryStore::new("main")));
/// let blueprint = Arc::new(Blueprint::new("counter"));
///
/// let mut state = blueprint.instantiate();
/// state.set("count", 1i64);
/// let snapshot = codec.dehydrate(&mut state).unwrap();
///
/// let mut state = codec.hydrate(&snapshot, &blueprint).unwrap();
/// codec.resolve_and_mutate(&mut state, &Path::parse("count").unwrap(), Value::Int(2)).unwrap();
/// assert_eq!(state.get_i64("count").unwrap(), 2);
/// ```
#[derive(Clone)]
pub struct Codec {
    registry: Arc<SynthRegistry>,
    authorizer: Arc<dyn Authorizer>,
    loader: Arc<dyn RecordLoader>,
    options: CodecOptions,
}

impl Codec {
    /// Creates a codec with the built-in synths and blueprint-declared rules.
    pub fn new(loader: Arc<dyn RecordLoader>) -> Self {
        Self {
            registry: SynthRegistry::shared(),
            authorizer: Arc::new(DeclaredRules),
            loader,
            options: CodecOptions::default(),
        }
    }

    /// Replaces the synth registry.
    pub fn with_registry(mut self, registry: Arc<SynthRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the authorizer.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = CodecOptions {
            max_depth: options.max_depth.min(MAX_DEPTH),
            ..options
        };
        self
    }

    pub fn registry(&self) -> &SynthRegistry {
        &self.registry
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Dehydrates every public property of `state` into a sealed snapshot.
    ///
    /// Pending lazy properties are resolved first.
    pub fn dehydrate(&self, state: &mut ComponentState) -> Result<Snapshot, Error> {
        state.resolve_all();
        debug!(
            component = state.name(),
            id = state.id(),
            properties = state.properties().len(),
            "dehydrating component"
        );

        let walker = self.dehydrator(state.blueprint());
        let mut data = serde_json::Map::with_capacity(state.properties().len());
        let mut meta = MetaTree::default();
        for (name, value) in state.properties() {
            let path = Path::root().child(Segment::Key(name.clone()));
            let (json, tree) = walker.walk(value, path, ParentHints::default(), 0)?;
            if let Some(tree) = tree {
                meta.children.insert(name.clone(), tree);
            }
            data.insert(name.clone(), json);
        }

        let mut snapshot = Snapshot {
            fingerprint: Fingerprint {
                id: state.id().to_string(),
                name: state.name().to_string(),
            },
            data: Json::Object(data),
            meta,
            checksum: String::new(),
        };
        snapshot.seal(&self.options.checksum_key)?;
        Ok(snapshot)
    }

    /// Rebuilds component state from a snapshot.
    ///
    /// `blueprint` must be the blueprint named in the snapshot fingerprint.
    pub fn hydrate(&self, snapshot: &Snapshot, blueprint: &Arc<Blueprint>) -> Result<ComponentState, Error> {
        if snapshot.fingerprint.name != blueprint.name() {
            return Err(Error::ComponentMismatch {
                expected: blueprint.name().to_string(),
                found: snapshot.fingerprint.name.clone(),
            });
        }
        if self.options.verify_checksum {
            snapshot.verify(&self.options.checksum_key)?;
        }
        let Json::Object(data) = &snapshot.data else {
            return Err(Error::malformed("", "snapshot data is not an object"));
        };
        debug!(
            component = blueprint.name(),
            id = %snapshot.fingerprint.id,
            properties = data.len(),
            "hydrating component"
        );

        let walker = self.hydrator();
        let mut properties = IndexMap::with_capacity(data.len());
        for (name, json) in data {
            let path = Path::root().child(Segment::Key(name.clone()));
            let value = walker.walk(json.clone(), snapshot.meta.child(name), path, None, 0)?;
            properties.insert(name.clone(), value);
        }

        Ok(ComponentState::restore(
            snapshot.fingerprint.id.clone(),
            Arc::clone(blueprint),
            properties,
        ))
    }

    // =========================================================================
    // SINGLE VALUES
    // =========================================================================

    /// Dehydrates one value as if it lived at `path` of a `blueprint` component.
    pub fn dehydrate_value(&self, value: &Value, blueprint: &Blueprint, path: &Path) -> Result<Envelope, Error> {
        let (data, meta) = self
            .dehydrator(blueprint)
            .walk(value, path.clone(), ParentHints::default(), 0)?;
        Ok(Envelope {
            data,
            meta: meta.unwrap_or_default(),
        })
    }

    /// Hydrates one value from its envelope.
    pub fn hydrate_value(&self, envelope: &Envelope) -> Result<Value, Error> {
        self.hydrator()
            .walk(envelope.data.clone(), Some(&envelope.meta), Path::root(), None, 0)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Reads the value at `path`.
    pub fn get<'s>(&self, state: &'s mut ComponentState, path: &Path) -> Result<&'s Value, Error> {
        self.mutator().get(state, path)
    }

    /// Writes `value` at `path`, delegating to synths along the way.
    pub fn resolve_and_mutate(&self, state: &mut ComponentState, path: &Path, value: Value) -> Result<(), Error> {
        self.mutator().set(state, path, value)
    }

    /// Calls a synth method on the value at `path`.
    pub fn call(
        &self,
        state: &mut ComponentState,
        path: &Path,
        method: &str,
        params: Vec<Value>,
    ) -> Result<(Value, Effects), Error> {
        self.mutator().call(state, path, method, params)
    }

    /// Applies client updates in order, stopping at the first failure.
    ///
    /// Updates before the failing one stay applied.
    pub fn apply_updates<I, P>(&self, state: &mut ComponentState, updates: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (P, Json)>,
        P: AsRef<str>,
    {
        let mutator = self.mutator();
        for (path, data) in updates {
            let path = Path::parse(path.as_ref())?;
            mutator.update(state, &path, data)?;
        }
        Ok(())
    }

    fn dehydrator<'a>(&'a self, blueprint: &'a Blueprint) -> Dehydrator<'a> {
        Dehydrator {
            registry: &self.registry,
            authorizer: self.authorizer.as_ref(),
            loader: self.loader.as_ref(),
            blueprint,
            max_depth: self.options.max_depth,
        }
    }

    fn hydrator(&self) -> Hydrator<'_> {
        Hydrator {
            registry: &self.registry,
            loader: self.loader.as_ref(),
            max_depth: self.options.max_depth,
        }
    }

    fn mutator(&self) -> Mutator<'_> {
        Mutator {
            registry: &self.registry,
            authorizer: self.authorizer.as_ref(),
        }
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnumCase;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn codec() -> Codec {
        Codec::new(Arc::new(MemoryStore::new("main")))
    }

    #[test]
    fn test_options_clamp_depth() {
        assert_eq!(CodecOptions::new().max_depth(10_000).max_depth, MAX_DEPTH);
        let codec = codec().with_options(CodecOptions {
            max_depth: 999_999,
            ..CodecOptions::default()
        });
        assert_eq!(codec.options().max_depth, MAX_DEPTH);
    }

    #[test]
    fn test_primitives_pass_through() {
        let codec = codec();
        let blueprint = Blueprint::new("c");
        let value = Value::from_json(json!({"a": [1, "two", null, true, 2.5]}));
        let envelope = codec.dehydrate_value(&value, &blueprint, &Path::root()).unwrap();
        assert_eq!(envelope.data, json!({"a": [1, "two", null, true, 2.5]}));
        assert!(envelope.meta.is_empty());
        assert_eq!(codec.hydrate_value(&envelope).unwrap(), value);
    }

    #[test]
    fn test_synth_node_inside_plain_container() {
        let codec = codec();
        let blueprint = Blueprint::new("c");
        let value = Value::Array(vec![Value::Int(1), EnumCase::new("Status", "draft").into()]);
        let envelope = codec.dehydrate_value(&value, &blueprint, &Path::root()).unwrap();

        assert_eq!(envelope.data, json!([1, ["draft", "enum"]]));
        assert_eq!(envelope.meta.synth, None);
        assert_eq!(envelope.meta.at("1").and_then(|m| m.synth.as_deref()), Some("enum"));
        assert_eq!(codec.hydrate_value(&envelope).unwrap(), value);
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let codec = codec();
        let err = codec
            .dehydrate_value(
                &Value::Array(vec![Value::Float(f64::INFINITY)]),
                &Blueprint::new("c"),
                &Path::parse("x").unwrap(),
            )
            .unwrap_err();
        assert_eq!(err, Error::NonFiniteFloat { path: "x.0".to_string() });
    }

    #[test]
    fn test_custom_value_without_synth() {
        let codec = codec();
        let err = codec
            .dehydrate_value(&Value::custom(7u32), &Blueprint::new("c"), &Path::root())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { type_name, .. } if type_name == "u32"));
    }

    #[test]
    fn test_depth_guard() {
        let codec = codec().with_options(CodecOptions::new().max_depth(3));
        let mut value = Value::Int(0);
        for _ in 0..5 {
            value = Value::Collection(vec![value]);
        }
        let err = codec
            .dehydrate_value(&value, &Blueprint::new("c"), &Path::root())
            .unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { max: 3, .. }));
    }

    #[test]
    fn test_unknown_type_key() {
        let codec = codec();
        let envelope: Envelope = serde_json::from_value(json!({
            "data": [[1, 2], "nope"],
            "meta": {"s": "nope"}
        }))
        .unwrap();
        let err = codec.hydrate_value(&envelope).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownTypeKey {
                key: "nope".to_string(),
                path: String::new(),
            }
        );
    }

    #[test]
    fn test_pair_must_match_meta() {
        let codec = codec();
        let envelope: Envelope = serde_json::from_value(json!({
            "data": [[], "map"],
            "meta": {"s": "clctn"}
        }))
        .unwrap();
        assert!(matches!(
            codec.hydrate_value(&envelope),
            Err(Error::MalformedSnapshot { .. })
        ));

        let envelope: Envelope = serde_json::from_value(json!({
            "data": {"not": "a pair"},
            "meta": {"s": "clctn"}
        }))
        .unwrap();
        assert!(matches!(
            codec.hydrate_value(&envelope),
            Err(Error::MalformedSnapshot { .. })
        ));
    }

    #[test]
    fn test_hydrate_rejects_other_component() {
        let codec = codec();
        let mut state = Arc::new(Blueprint::new("a")).instantiate();
        let snapshot = codec.dehydrate(&mut state).unwrap();
        let err = codec.hydrate(&snapshot, &Arc::new(Blueprint::new("b"))).unwrap_err();
        assert!(matches!(err, Error::ComponentMismatch { .. }));
    }
}
