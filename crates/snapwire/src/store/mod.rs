//! Persistence collaborator consulted when reference types are rehydrated.
//!
//! The codec never ships record contents it cannot justify; on the next
//! request it reloads records by natural key through a [`RecordLoader`].

mod memory;

pub use memory::MemoryStore;

use crate::error::Error;
use crate::model::{Record, Scalar};

/// Loads records by natural key.
///
/// Implementations must be safe to share across concurrent requests. Loads
/// are synchronous; the codec neither caches nor batches them.
pub trait RecordLoader: Send + Sync {
    /// Loads the records of `model` whose keys appear in `keys`.
    ///
    /// Keys with no matching record are dropped silently. The result may come
    /// back in any order; callers reorder by key. `relations` are dotted
    /// eager-load paths (`posts`, `posts.comments`). `connection` of `None`
    /// means the model's default connection.
    fn load_by_keys(
        &self,
        model: &str,
        keys: &[Scalar],
        connection: Option<&str>,
        relations: &[String],
    ) -> Result<Vec<Record>, Error>;

    /// The connection records of `model` come from when none is recorded.
    fn default_connection(&self, model: &str) -> Option<String>;
}
