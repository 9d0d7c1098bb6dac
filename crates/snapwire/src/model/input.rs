//! Enum cases, form objects and temporary uploads.

use indexmap::IndexMap;

use crate::model::{Scalar, Value};

/// A case of a backed enum, identified by its backing value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumCase {
    /// Enum type identifier (e.g. `"Status"`).
    pub enum_type: String,
    /// Backing value of the case.
    pub value: Scalar,
}

impl EnumCase {
    pub fn new(enum_type: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            enum_type: enum_type.into(),
            value: value.into(),
        }
    }
}

/// A form object: a named bag of input fields bound as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    /// Form type identifier (e.g. `"PostForm"`).
    pub name: String,
    /// Field values in declaration order.
    pub fields: IndexMap<String, Value>,
}

impl Form {
    /// Creates a form with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Returns a field value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A file uploaded by the client and parked in temporary storage.
///
/// Only the storage identifier and descriptive metadata travel in the
/// snapshot; the file contents never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemporaryUpload {
    /// Temporary storage identifier.
    pub id: String,
    /// File name as supplied by the client.
    pub original_name: String,
    /// MIME type as detected on upload.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

impl TemporaryUpload {
    pub fn new(
        id: impl Into<String>,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}
