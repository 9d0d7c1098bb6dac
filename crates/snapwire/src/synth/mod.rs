//! Synthesizers: per-type codecs plugged into the walkers.
//!
//! A synth owns one family of non-primitive values. It turns a live value
//! into wire data plus metadata, rebuilds the value from them, and mediates
//! path-addressed reads, writes and method calls on the value's children.
//!
//! Synths are kept in an ordered [`SynthRegistry`]; the first synth whose
//! [`Synth::matches`] accepts a value wins, so specific synths register
//! before general ones. Primitives and plain containers never reach a synth.

mod collection;
mod enums;
mod form;
mod map;
mod records;
mod upload;

pub use collection::CollectionSynth;
pub use enums::EnumSynth;
pub use form::FormSynth;
pub use map::MapSynth;
pub use records::{RecordCollectionSynth, RecordSynth};
pub use upload::UploadSynth;

use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use serde_json::Value as Json;

use crate::codec::{DehydrateContext, Effects, HydrateContext, Meta, SetContext};
use crate::error::Error;
use crate::limits::MAX_TYPE_KEY_LEN;
use crate::model::{Segment, Value};

// =============================================================================
// CONTRACT
// =============================================================================

/// The codec for one family of values.
///
/// Only `matches`, `dehydrate` and `hydrate` are required. The remaining
/// methods default to "no addressable children" and "no methods".
pub trait Synth: Send + Sync {
    /// Returns true if this synth owns `value`. Must be pure and total.
    fn matches(&self, value: &Value) -> bool;

    /// Produces the wire payload for `value`.
    ///
    /// Metadata goes through [`DehydrateContext::add_meta`]; nested values
    /// go through [`DehydrateContext::dehydrate_child`].
    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error>;

    /// Rebuilds a value from its payload and metadata.
    ///
    /// A parent that already holds the live instance hands it over through
    /// [`HydrateContext::take_from_parent`].
    fn hydrate(&self, data: Json, meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error>;

    /// Reads the child addressed by `key`.
    fn get<'v>(&self, _target: &'v Value, _key: &Segment) -> Option<&'v Value> {
        None
    }

    /// Mutable counterpart of [`Synth::get`], used to descend during writes.
    fn get_mut<'v>(&self, _target: &'v mut Value, _key: &Segment) -> Option<&'v mut Value> {
        None
    }

    /// Writes the child addressed by `key`.
    ///
    /// Synths that require an explicit grant call [`SetContext::authorize`]
    /// before touching `target`.
    fn set(&self, _target: &mut Value, _key: &Segment, _value: Value, ctx: &SetContext<'_>) -> Result<(), Error> {
        Err(ctx.not_found())
    }

    /// Converts a raw client update for a value this synth owns.
    ///
    /// The default accepts the JSON as a plain value.
    fn update(&self, _current: &Value, data: Json, _ctx: &SetContext<'_>) -> Result<Value, Error> {
        Ok(Value::from_json(data))
    }

    /// Names of the methods the client may call on `target`.
    fn methods(&self, _target: &Value) -> &'static [&'static str] {
        &[]
    }

    /// Invokes `method`. Only called for names listed by [`Synth::methods`].
    ///
    /// A [`Error::MethodNotFound`] returned with an empty path is reported
    /// at the path of the called value.
    fn call(
        &self,
        _target: &mut Value,
        method: &str,
        _params: Vec<Value>,
        _effects: &mut Effects,
    ) -> Result<Value, Error> {
        Err(Error::MethodNotFound {
            method: method.to_string(),
            path: String::new(),
        })
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

lazy_static! {
    static ref SHARED: Arc<SynthRegistry> = Arc::new(SynthRegistry::builtin());
}

/// Ordered table of `(type key, synth)` bindings.
///
/// Populated at startup and read-only afterwards; share it behind an
/// [`Arc`] across requests.
#[derive(Default)]
pub struct SynthRegistry {
    synths: Vec<(String, Box<dyn Synth>)>,
    index: FxHashMap<String, usize>,
}

impl SynthRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in synths in specificity order:
    /// `refs`, `rec`, `enum`, `form`, `file`, `clctn`, `map`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.push("refs", Box::new(RecordCollectionSynth));
        registry.push("rec", Box::new(RecordSynth));
        registry.push("enum", Box::new(EnumSynth::new()));
        registry.push("form", Box::new(FormSynth));
        registry.push("file", Box::new(UploadSynth));
        registry.push("clctn", Box::new(CollectionSynth));
        registry.push("map", Box::new(MapSynth));
        registry
    }

    /// The process-wide built-in registry.
    pub fn shared() -> Arc<SynthRegistry> {
        Arc::clone(&SHARED)
    }

    /// Appends a binding.
    ///
    /// Fails if `key` is already bound or longer than
    /// [`MAX_TYPE_KEY_LEN`](crate::limits::MAX_TYPE_KEY_LEN).
    pub fn register(&mut self, key: impl Into<String>, synth: impl Synth + 'static) -> Result<(), Error> {
        let key = key.into();
        if key.len() > MAX_TYPE_KEY_LEN {
            return Err(Error::LengthExceedsLimit {
                field: "type key",
                len: key.len(),
                max: MAX_TYPE_KEY_LEN,
            });
        }
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateTypeKey { key });
        }
        self.push(key, Box::new(synth));
        Ok(())
    }

    fn push(&mut self, key: impl Into<String>, synth: Box<dyn Synth>) {
        let key = key.into();
        self.index.insert(key.clone(), self.synths.len());
        self.synths.push((key, synth));
    }

    /// Returns the first synth that matches `value`, with its type key.
    ///
    /// `None` is the expected outcome for primitives and plain containers.
    pub fn resolve(&self, value: &Value) -> Option<(&str, &dyn Synth)> {
        if is_plain(value) {
            return None;
        }
        self.synths
            .iter()
            .find(|(_, synth)| synth.matches(value))
            .map(|(key, synth)| (key.as_str(), synth.as_ref()))
    }

    /// Looks up a synth by type key.
    pub fn get(&self, key: &str) -> Option<&dyn Synth> {
        self.index.get(key).map(|&i| self.synths[i].1.as_ref())
    }

    /// Registered type keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.synths.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.synths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synths.is_empty()
    }
}

impl fmt::Debug for SynthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthRegistry")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn is_plain(value: &Value) -> bool {
    value.is_primitive() || matches!(value, Value::Array(_) | Value::Object(_))
}

// =============================================================================
// HELPERS FOR SYNTH IMPLEMENTATIONS
// =============================================================================

/// Reads a required string entry from `meta`.
pub(crate) fn meta_str<'m>(meta: &'m Meta, key: &str, path: &crate::model::Path) -> Result<&'m str, Error> {
    meta.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::malformed(path, "missing or invalid meta entry"))
}

/// Reads an optional list of strings from `meta`.
pub(crate) fn meta_strings(meta: &Meta, key: &str, path: &crate::model::Path) -> Result<Vec<String>, Error> {
    match meta.get(key) {
        None => Ok(Vec::new()),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::malformed(path, "meta list holds a non-string"))
            })
            .collect(),
        Some(_) => Err(Error::malformed(path, "meta entry is not a list")),
    }
}
