//! Records backed by an external persistence store.
//!
//! Only identity (model, natural key, connection) and eager-loaded relation
//! names cross the wire; attribute payloads are emitted only where a rule
//! allows client binding.

use indexmap::{IndexMap, IndexSet};

use crate::error::Error;
use crate::model::{Scalar, Value};

/// A single record loaded from (or destined for) the persistence store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Element type identifier (e.g. `"Post"`).
    pub model: String,
    /// Natural key, or `None` for a record that has not been persisted.
    pub key: Option<Scalar>,
    /// Originating connection, or `None` for a record that has not been persisted.
    pub connection: Option<String>,
    /// Column values.
    pub attributes: IndexMap<String, Value>,
    /// Eager-loaded relations: a [`Value::Record`], [`Value::Records`] or [`Value::Null`].
    pub relations: IndexMap<String, Value>,
}

impl Record {
    /// Creates an unsaved record of the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            key: None,
            connection: None,
            attributes: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    /// Creates a record with a natural key.
    pub fn with_key(model: impl Into<String>, key: impl Into<Scalar>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(model)
        }
    }

    /// Looks up an attribute or, failing that, a loaded relation.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).or_else(|| self.relations.get(name))
    }

    /// Mutable counterpart of [`Record::get`].
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self.attributes.get_mut(name) {
            Some(v) => Some(v),
            None => self.relations.get_mut(name),
        }
    }

    /// Writes `name`, replacing a loaded relation if one has that name.
    pub fn put(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.relations.get_mut(&name) {
            *slot = value;
        } else {
            self.attributes.insert(name, value);
        }
    }

    /// Returns true if `name` is a loaded relation.
    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Dotted eager-load paths of every loaded relation, depth first.
    ///
    /// A record with `posts` loaded, whose posts have `comments` loaded,
    /// yields `["posts", "posts.comments"]`.
    pub fn relation_paths(&self) -> Vec<String> {
        let mut paths = IndexSet::new();
        collect_relation_paths(&self.relations, "", &mut paths);
        paths.into_iter().collect()
    }
}

fn collect_relation_paths(
    relations: &IndexMap<String, Value>,
    prefix: &str,
    out: &mut IndexSet<String>,
) {
    for (name, related) in relations {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        out.insert(path.clone());
        match related {
            Value::Record(record) => collect_relation_paths(&record.relations, &path, out),
            Value::Records(collection) => {
                for record in collection.records() {
                    collect_relation_paths(&record.relations, &path, out);
                }
            }
            _ => {}
        }
    }
}

/// An ordered group of records of one model from one connection.
///
/// Elements are stored as [`Value::Record`] so the mutation engine can hand
/// out `&mut Value` children; every constructor and the owning synth keep
/// that invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordCollection {
    /// Element type identifier, kept even when the collection is empty.
    pub model: String,
    items: Vec<Value>,
}

impl RecordCollection {
    /// Creates an empty collection of `model` records.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            items: Vec::new(),
        }
    }

    /// Creates a collection from records.
    pub fn from_records(model: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            model: model.into(),
            items: records.into_iter().map(Value::from).collect(),
        }
    }

    /// Appends a record.
    pub fn push(&mut self, record: Record) {
        self.items.push(Value::from(record));
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the collection has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates the records in order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.items.iter().filter_map(Value::as_record)
    }

    /// Returns the record at `index`.
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.items.get(index).and_then(Value::as_record)
    }

    /// Natural keys of the persisted elements, in order.
    pub fn keys(&self) -> Vec<Scalar> {
        self.records().filter_map(|r| r.key.clone()).collect()
    }

    /// Union of the elements' eager-load paths, in first-seen order.
    pub fn relation_paths(&self) -> Vec<String> {
        let mut paths = IndexSet::new();
        for record in self.records() {
            paths.extend(record.relation_paths());
        }
        paths.into_iter().collect()
    }

    /// The connection every persisted element originates from.
    ///
    /// Unsaved elements (no connection) are ignored. Returns `Ok(None)` when
    /// no element carries a connection.
    pub fn connection(&self) -> Result<Option<&str>, Error> {
        let mut expected: Option<&str> = None;
        for record in self.records() {
            let Some(found) = record.connection.as_deref() else {
                continue;
            };
            match expected {
                None => expected = Some(found),
                Some(e) if e != found => {
                    return Err(Error::HeterogeneousOrigin {
                        model: self.model.clone(),
                        expected: e.to_string(),
                        found: found.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(expected)
    }

    pub(crate) fn items(&self) -> &[Value] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Value> {
        &mut self.items
    }
}
