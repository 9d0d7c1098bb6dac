//! Live object model for component state.
//!
//! This module contains the in-memory side of the codec:
//! - Values (primitives, plain containers, synth-owned types)
//! - Records and record collections backed by the persistence store
//! - Enum cases, forms and temporary uploads
//! - Property paths
//! - Component blueprints and per-request state
//! - Builders (ergonomic construction)

pub mod builder;
pub mod component;
pub mod input;
pub mod path;
pub mod record;
pub mod value;

pub use builder::{FormBuilder, RecordBuilder};
pub use component::{new_component_id, Blueprint, ComponentState};
pub use input::{EnumCase, Form, TemporaryUpload};
pub use path::{Path, Segment};
pub use record::{Record, RecordCollection};
pub use value::{CustomValue, Scalar, Value};
