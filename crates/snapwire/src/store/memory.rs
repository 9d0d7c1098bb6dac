//! In-memory [`RecordLoader`] with declared relations and eager loading.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::Error;
use crate::model::{Record, RecordCollection, Scalar, Value};
use crate::store::RecordLoader;

#[derive(Debug, Clone)]
enum RelationKind {
    /// Related rows carry `foreign_key` pointing back at the parent key.
    HasMany { foreign_key: String },
    /// The parent carries `foreign_key` pointing at the related key.
    BelongsTo { foreign_key: String },
}

#[derive(Debug, Clone)]
struct RelationDef {
    related: String,
    kind: RelationKind,
}

type Table = IndexMap<Scalar, Record>;

/// A record store held in memory, keyed by (connection, model).
///
/// Rows are stored without relations; relations are declared up front and
/// materialized on load from the dotted eager-load paths.
///
/// # Example
///
/// ```rust
/// use snapwire::model::builder::RecordBuilder;
/// use snapwire::store::{MemoryStore, RecordLoader};
/// use snapwire::Scalar;
///
/// let store = MemoryStore::new("main").has_many("Author", "posts", "Post", "author_id");
/// store.insert(RecordBuilder::new("Author").key(1).attr("name", "Bob").build()).unwrap();
/// store.insert(RecordBuilder::new("Post").key(10).attr("author_id", 1).build()).unwrap();
///
/// let authors = store
///     .load_by_keys("Author", &[Scalar::Int(1)], None, &["posts".to_string()])
///     .unwrap();
/// assert_eq!(authors[0].relations["posts"].as_records().unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    default_connection: String,
    model_connections: FxHashMap<String, String>,
    relations: FxHashMap<(String, String), RelationDef>,
    tables: RwLock<FxHashMap<(String, String), Table>>,
    loads: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store whose models default to `default_connection`.
    pub fn new(default_connection: impl Into<String>) -> Self {
        Self {
            default_connection: default_connection.into(),
            model_connections: FxHashMap::default(),
            relations: FxHashMap::default(),
            tables: RwLock::new(FxHashMap::default()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Overrides the default connection of one model.
    pub fn model_connection(mut self, model: impl Into<String>, connection: impl Into<String>) -> Self {
        self.model_connections.insert(model.into(), connection.into());
        self
    }

    /// Declares a to-many relation: `related` rows whose `foreign_key`
    /// equals the parent's key.
    pub fn has_many(
        mut self,
        model: impl Into<String>,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relations.insert(
            (model.into(), name.into()),
            RelationDef {
                related: related.into(),
                kind: RelationKind::HasMany {
                    foreign_key: foreign_key.into(),
                },
            },
        );
        self
    }

    /// Declares a to-one relation: the `related` row whose key equals the
    /// parent's `foreign_key` attribute.
    pub fn belongs_to(
        mut self,
        model: impl Into<String>,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relations.insert(
            (model.into(), name.into()),
            RelationDef {
                related: related.into(),
                kind: RelationKind::BelongsTo {
                    foreign_key: foreign_key.into(),
                },
            },
        );
        self
    }

    /// Stores a row, replacing any row with the same key.
    ///
    /// The row's connection defaults to the model's connection. Loaded
    /// relations on `record` are not stored.
    pub fn insert(&self, mut record: Record) -> Result<(), Error> {
        let Some(key) = record.key.clone() else {
            return Err(Error::Store {
                model: record.model,
                reason: "cannot store a record without a key".to_string(),
            });
        };
        let connection = match record.connection.take() {
            Some(c) => c,
            None => self.connection_for(&record.model),
        };
        record.connection = Some(connection.clone());
        record.relations.clear();

        let mut tables = self.write(&record.model)?;
        tables
            .entry((connection, record.model.clone()))
            .or_default()
            .insert(key, record);
        Ok(())
    }

    /// Deletes a row. Returns the removed row, if any.
    pub fn remove(
        &self,
        model: &str,
        key: &Scalar,
        connection: Option<&str>,
    ) -> Result<Option<Record>, Error> {
        let connection = connection.map_or_else(|| self.connection_for(model), str::to_string);
        let mut tables = self.write(model)?;
        Ok(tables
            .get_mut(&(connection, model.to_string()))
            .and_then(|table| table.shift_remove(key)))
    }

    /// Number of [`RecordLoader::load_by_keys`] calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Resets the load counter.
    pub fn reset_load_count(&self) {
        self.loads.store(0, Ordering::SeqCst);
    }

    fn connection_for(&self, model: &str) -> String {
        self.model_connections
            .get(model)
            .cloned()
            .unwrap_or_else(|| self.default_connection.clone())
    }

    fn write(
        &self,
        model: &str,
    ) -> Result<std::sync::RwLockWriteGuard<'_, FxHashMap<(String, String), Table>>, Error> {
        self.tables.write().map_err(|_| poisoned(model))
    }

    fn eager_load(
        &self,
        tables: &FxHashMap<(String, String), Table>,
        connection: &str,
        records: &mut [Record],
        paths: &[String],
    ) -> Result<(), Error> {
        for (name, nested) in group_paths(paths) {
            for record in records.iter_mut() {
                let def = self
                    .relations
                    .get(&(record.model.clone(), name.clone()))
                    .ok_or_else(|| Error::Store {
                        model: record.model.clone(),
                        reason: format!("undefined relation {name:?}"),
                    })?;
                let table = tables.get(&(connection.to_string(), def.related.clone()));

                let related = match &def.kind {
                    RelationKind::HasMany { foreign_key } => {
                        let mut rows: Vec<Record> = table
                            .into_iter()
                            .flat_map(|t| t.values())
                            .filter(|row| {
                                record.key.is_some()
                                    && row.attributes.get(foreign_key).and_then(to_scalar) == record.key
                            })
                            .cloned()
                            .collect();
                        self.eager_load(tables, connection, &mut rows, &nested)?;
                        Value::Records(RecordCollection::from_records(def.related.clone(), rows))
                    }
                    RelationKind::BelongsTo { foreign_key } => {
                        let row = record
                            .attributes
                            .get(foreign_key)
                            .and_then(to_scalar)
                            .and_then(|key| table.and_then(|t| t.get(&key)))
                            .cloned();
                        match row {
                            Some(row) => {
                                let mut rows = [row];
                                self.eager_load(tables, connection, &mut rows, &nested)?;
                                let [row] = rows;
                                Value::from(row)
                            }
                            None => Value::Null,
                        }
                    }
                };
                record.relations.insert(name.clone(), related);
            }
        }
        Ok(())
    }
}

impl RecordLoader for MemoryStore {
    fn load_by_keys(
        &self,
        model: &str,
        keys: &[Scalar],
        connection: Option<&str>,
        relations: &[String],
    ) -> Result<Vec<Record>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let connection = connection.map_or_else(|| self.connection_for(model), str::to_string);
        trace!(model, connection = %connection, keys = keys.len(), "loading records");

        let tables = self.tables.read().map_err(|_| poisoned(model))?;
        let mut records: Vec<Record> = match tables.get(&(connection.clone(), model.to_string())) {
            Some(table) => keys.iter().filter_map(|k| table.get(k)).cloned().collect(),
            None => Vec::new(),
        };
        self.eager_load(&tables, &connection, &mut records, relations)?;
        Ok(records)
    }

    fn default_connection(&self, model: &str) -> Option<String> {
        Some(self.connection_for(model))
    }
}

/// Splits dotted paths into first segment and remainders, in first-seen order.
fn group_paths(paths: &[String]) -> IndexMap<String, Vec<String>> {
    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    for path in paths {
        match path.split_once('.') {
            Some((head, rest)) => groups.entry(head.to_string()).or_default().push(rest.to_string()),
            None => {
                groups.entry(path.clone()).or_default();
            }
        }
    }
    groups
}

fn to_scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::Int(i) => Some(Scalar::Int(*i)),
        Value::Str(s) => Some(Scalar::Str(s.clone())),
        _ => None,
    }
}

fn poisoned(model: &str) -> Error {
    Error::Store {
        model: model.to_string(),
        reason: "store lock poisoned".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builder::RecordBuilder;

    fn blog() -> MemoryStore {
        let store = MemoryStore::new("main")
            .has_many("Author", "posts", "Post", "author_id")
            .has_many("Post", "comments", "Comment", "post_id")
            .belongs_to("Comment", "author", "Author", "author_id");

        store.insert(RecordBuilder::new("Author").key(1).attr("name", "Bob").build()).unwrap();
        store.insert(RecordBuilder::new("Author").key(2).attr("name", "Alice").build()).unwrap();
        for (id, author) in [(1, 1), (2, 1), (3, 2)] {
            store
                .insert(
                    RecordBuilder::new("Post")
                        .key(id)
                        .attr("title", format!("Post {id}"))
                        .attr("author_id", author)
                        .build(),
                )
                .unwrap();
        }
        store
            .insert(
                RecordBuilder::new("Comment")
                    .key(1)
                    .attr("comment", "Nice")
                    .attr("post_id", 1)
                    .attr("author_id", 2)
                    .build(),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_load_by_keys_drops_missing() {
        let store = blog();
        let posts = store
            .load_by_keys("Post", &[Scalar::Int(3), Scalar::Int(99), Scalar::Int(1)], None, &[])
            .unwrap();
        let keys: Vec<_> = posts.iter().map(|p| p.key.clone().unwrap()).collect();
        assert_eq!(keys, vec![Scalar::Int(3), Scalar::Int(1)]);
        assert_eq!(posts[0].connection.as_deref(), Some("main"));
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn test_nested_eager_loading() {
        let store = blog();
        let authors = store
            .load_by_keys(
                "Author",
                &[Scalar::Int(1)],
                None,
                &["posts".to_string(), "posts.comments".to_string(), "posts.comments.author".to_string()],
            )
            .unwrap();

        let posts = authors[0].relations["posts"].as_records().unwrap();
        assert_eq!(posts.len(), 2);
        let comments = posts.get(0).unwrap().relations["comments"].as_records().unwrap();
        assert_eq!(comments.len(), 1);
        let commenter = comments.get(0).unwrap().relations["author"].as_record().unwrap();
        assert_eq!(commenter.get("name"), Some(&Value::from("Alice")));
        assert!(posts.get(1).unwrap().relations["comments"].as_records().unwrap().is_empty());
    }

    #[test]
    fn test_undefined_relation_is_an_error() {
        let store = blog();
        let err = store
            .load_by_keys("Post", &[Scalar::Int(1)], None, &["tags".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
    }

    #[test]
    fn test_connections_are_separate() {
        let store = MemoryStore::new("main").model_connection("Audit", "archive");
        store.insert(RecordBuilder::new("Audit").key(1).build()).unwrap();
        store
            .insert(RecordBuilder::new("Audit").key(2).connection("main").build())
            .unwrap();

        assert_eq!(store.default_connection("Audit").as_deref(), Some("archive"));
        let found = store.load_by_keys("Audit", &[Scalar::Int(1), Scalar::Int(2)], None, &[]).unwrap();
        assert_eq!(found.len(), 1);
        let found = store
            .load_by_keys("Audit", &[Scalar::Int(1), Scalar::Int(2)], Some("main"), &[])
            .unwrap();
        assert_eq!(found[0].key, Some(Scalar::Int(2)));
    }

    #[test]
    fn test_remove_and_unkeyed_insert() {
        let store = blog();
        assert!(store.remove("Post", &Scalar::Int(2), None).unwrap().is_some());
        assert!(store.remove("Post", &Scalar::Int(2), None).unwrap().is_none());
        assert!(matches!(
            store.insert(Record::new("Post")),
            Err(Error::Store { .. })
        ));
    }
}
