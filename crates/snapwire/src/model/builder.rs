//! Builder API for ergonomic record and form construction.
//!
//! # Example
//!
//! ```rust
//! use snapwire::model::builder::RecordBuilder;
//! use snapwire::RecordCollection;
//!
//! let author = RecordBuilder::new("Author")
//!     .key(1)
//!     .connection("mysql")
//!     .attr("name", "Bob")
//!     .has_many("posts", RecordCollection::from_records("Post", [
//!         RecordBuilder::new("Post").key(1).attr("title", "Post 1").build(),
//!     ]))
//!     .build();
//!
//! assert_eq!(author.relation_paths(), vec!["posts"]);
//! ```

use crate::model::{Form, Record, RecordCollection, Scalar, Value};

/// Builder for a [`Record`].
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Starts an unsaved record of `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            record: Record::new(model),
        }
    }

    /// Sets the natural key.
    pub fn key(mut self, key: impl Into<Scalar>) -> Self {
        self.record.key = Some(key.into());
        self
    }

    /// Sets the originating connection.
    pub fn connection(mut self, connection: impl Into<String>) -> Self {
        self.record.connection = Some(connection.into());
        self
    }

    /// Sets an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.record.attributes.insert(name.into(), value.into());
        self
    }

    /// Attaches a loaded to-one relation.
    pub fn belongs_to(mut self, name: impl Into<String>, related: Record) -> Self {
        self.record.relations.insert(name.into(), related.into());
        self
    }

    /// Attaches a loaded to-many relation.
    pub fn has_many(mut self, name: impl Into<String>, related: RecordCollection) -> Self {
        self.record.relations.insert(name.into(), related.into());
        self
    }

    /// Finishes the record.
    pub fn build(self) -> Record {
        self.record
    }
}

/// Builder for a [`Form`].
#[derive(Debug, Clone)]
pub struct FormBuilder {
    form: Form,
}

impl FormBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            form: Form::new(name),
        }
    }

    /// Declares a field with its initial value.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.form.fields.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Form {
        self.form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new("Post")
            .key("p-1")
            .connection("sqlite")
            .attr("title", "Hello")
            .attr("views", 10i64)
            .belongs_to("author", RecordBuilder::new("Author").key(1).build())
            .build();

        assert_eq!(record.key, Some(Scalar::from("p-1")));
        assert_eq!(record.connection.as_deref(), Some("sqlite"));
        assert_eq!(record.get("views"), Some(&Value::Int(10)));
        assert!(record.has_relation("author"));
    }

    #[test]
    fn test_form_builder_keeps_field_order() {
        let form = FormBuilder::new("PostForm")
            .field("title", "")
            .field("body", "")
            .field("published", false)
            .build();
        let names: Vec<_> = form.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["title", "body", "published"]);
    }
}
