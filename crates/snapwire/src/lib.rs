//! snapwire: a snapshot codec for server-driven UI components.
//!
//! A component lives on the server only for the span of a request. Between
//! requests its public state travels to the client as a snapshot and comes
//! back with the next request. This crate dehydrates live state into that
//! snapshot and hydrates it back, for arbitrarily nested values including
//! records from a persistence store, enums, form objects and uploads.
//!
//! # Overview
//!
//! - **Extensible**: every non-primitive type is handled by a [`Synth`]
//!   registered under a type key; new types plug in without touching the core
//! - **Reference-preserving**: records travel as identity metadata and are
//!   reloaded by key, never shipped wholesale
//! - **Rule-gated**: record data is emitted, and accepted back, only at paths
//!   covered by a declared rule
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use snapwire::{Blueprint, Codec, EnumCase, MemoryStore, Path, Value};
//!
//! let codec = Codec::new(Arc::new(MemoryStore::new("main")));
//! let blueprint = Arc::new(Blueprint::new("post-editor"));
//!
//! // Mount: build state and send the snapshot to the client
//! let mut state = blueprint.instantiate();
//! state.set("title", "Hello");
//! state.set("status", EnumCase::new("Status", "draft"));
//! let snapshot = codec.dehydrate(&mut state).unwrap();
//! let wire = snapshot.to_json_string().unwrap();
//!
//! // Next request: restore, apply an update, send back
//! let snapshot = snapwire::Snapshot::from_json_str(&wire).unwrap();
//! let mut state = codec.hydrate(&snapshot, &blueprint).unwrap();
//! codec
//!     .resolve_and_mutate(&mut state, &Path::parse("title").unwrap(), Value::from("Bye"))
//!     .unwrap();
//! assert_eq!(state.get_str("title").unwrap(), "Bye");
//! ```
//!
//! # Modules
//!
//! - [`model`]: Live values, records, paths, component state
//! - [`synth`]: The synth contract, registry and built-in synths
//! - [`codec`]: Snapshot wire types, walkers, mutation engine
//! - [`validate`]: Rule lookup and the authorizer collaborator
//! - [`store`]: The record loader collaborator
//! - [`error`]: Error types
//! - [`limits`]: Security limits
//!
//! # Security
//!
//! Snapshots are untrusted input:
//! - Snapshots are sealed with a keyed SHA-256 checksum and verified on hydrate
//! - Nesting depth, path length and snapshot size are bounded
//! - Writes below records require a rule for the exact path
//! - Locked properties reject every write

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod store;
pub mod synth;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{Codec, CodecOptions, Effects, Envelope, Fingerprint, Meta, MetaTree, Snapshot};
pub use error::{Error, ErrorCode};
pub use model::{
    Blueprint, ComponentState, CustomValue, EnumCase, Form, Path, Record, RecordCollection, Scalar,
    Segment, TemporaryUpload, Value,
};
pub use store::{MemoryStore, RecordLoader};
pub use synth::{Synth, SynthRegistry};
pub use validate::{Authorizer, DeclaredRules, RuleSet, Rules};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
