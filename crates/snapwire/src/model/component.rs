//! Component blueprints and per-request component state.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use uuid::Uuid;

use crate::error::Error;
use crate::model::Value;
use crate::validate::Rules;

/// Class-level declarations shared by every instance of a component.
///
/// A blueprint is built once at startup and shared behind an [`Arc`]; it is
/// never part of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    name: String,
    rules: Rules,
    locked: FxHashSet<String>,
}

impl Blueprint {
    /// Creates a blueprint with no rules and no locked properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declares a validation rule. Only the path matters to the codec.
    pub fn rule(mut self, path: impl Into<String>, rule: impl Into<String>) -> Self {
        self.rules.insert(path, rule);
        self
    }

    /// Locks a property against client writes.
    pub fn lock(mut self, property: impl Into<String>) -> Self {
        self.locked.insert(property.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Returns true if `property` is locked.
    pub fn is_locked(&self, property: &str) -> bool {
        self.locked.contains(property)
    }

    /// Creates a fresh instance with a new random id.
    pub fn instantiate(self: &Arc<Self>) -> ComponentState {
        ComponentState::restore(new_component_id(), Arc::clone(self), IndexMap::new())
    }
}

/// Generates a component id (32 lowercase hex characters).
pub fn new_component_id() -> String {
    Uuid::new_v4().simple().to_string()
}

type Initializer = Box<dyn FnOnce() -> Value + Send>;

/// The public state of one component instance for the span of a request.
///
/// Properties live in an explicit ordered store. Lazy properties sit in a
/// separate deferral map until their first read.
pub struct ComponentState {
    id: String,
    blueprint: Arc<Blueprint>,
    properties: IndexMap<String, Value>,
    pending: IndexMap<String, Initializer>,
}

impl ComponentState {
    pub(crate) fn restore(
        id: String,
        blueprint: Arc<Blueprint>,
        properties: IndexMap<String, Value>,
    ) -> Self {
        Self {
            id,
            blueprint,
            properties,
            pending: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.blueprint.name()
    }

    pub fn blueprint(&self) -> &Arc<Blueprint> {
        &self.blueprint
    }

    /// Assigns a property, discarding any pending initializer for it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.pending.shift_remove(&name);
        self.properties.insert(name, value.into());
    }

    /// Defers a property until it is first read.
    pub fn make_lazy<F>(&mut self, name: impl Into<String>, init: F)
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        let name = name.into();
        self.properties.shift_remove(&name);
        self.pending.insert(name, Box::new(init));
    }

    /// Returns true if the property exists, resolved or pending.
    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name) || self.pending.contains_key(name)
    }

    /// Returns true if the property is still waiting for its first read.
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Property names: resolved first, then pending.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .keys()
            .chain(self.pending.keys())
            .map(String::as_str)
    }

    /// Resolved properties in order.
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Reads a resolved property without triggering lazy initialization.
    pub fn peek(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Reads a property, running its initializer on first access.
    pub fn property(&mut self, name: &str) -> Result<&Value, Error> {
        self.resolve(name);
        match self.properties.get(name) {
            Some(value) => Ok(value),
            None => Err(self.not_found(name)),
        }
    }

    /// Mutable counterpart of [`ComponentState::property`].
    pub fn property_mut(&mut self, name: &str) -> Result<&mut Value, Error> {
        self.resolve(name);
        let err = self.not_found(name);
        self.properties.get_mut(name).ok_or(err)
    }

    /// Runs every pending initializer.
    pub fn resolve_all(&mut self) {
        for (name, init) in std::mem::take(&mut self.pending) {
            self.properties.insert(name, init());
        }
    }

    pub fn get_str(&mut self, name: &str) -> Result<&str, Error> {
        let value = self.property(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "string", value))
    }

    pub fn get_i64(&mut self, name: &str) -> Result<i64, Error> {
        let value = self.property(name)?;
        value.as_i64().ok_or_else(|| mismatch(name, "int", value))
    }

    pub fn get_f64(&mut self, name: &str) -> Result<f64, Error> {
        let value = self.property(name)?;
        value.as_f64().ok_or_else(|| mismatch(name, "float", value))
    }

    pub fn get_bool(&mut self, name: &str) -> Result<bool, Error> {
        let value = self.property(name)?;
        value.as_bool().ok_or_else(|| mismatch(name, "bool", value))
    }

    fn resolve(&mut self, name: &str) {
        if let Some(init) = self.pending.shift_remove(name) {
            self.properties.insert(name.to_string(), init());
        }
    }

    fn not_found(&self, name: &str) -> Error {
        Error::PropertyNotFound {
            path: name.to_string(),
            component: self.blueprint.name().to_string(),
        }
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> Error {
    Error::InvalidValue {
        path: path.to_string(),
        expected,
        found: found.kind(),
    }
}

impl fmt::Debug for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentState")
            .field("id", &self.id)
            .field("name", &self.blueprint.name())
            .field("properties", &self.properties)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish()
    }
}
