//! Security limits applied while walking untrusted snapshots and paths.
//!
//! Snapshots come back from the client on every request, so every recursive
//! or size-dependent step is bounded.

/// Default maximum nesting depth for dehydration and hydration.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Upper bound accepted for [`CodecOptions::max_depth`](crate::codec::CodecOptions).
pub const MAX_DEPTH: usize = 256;

/// Maximum number of segments in a property path.
pub const MAX_PATH_SEGMENTS: usize = 64;

/// Maximum length in bytes of a textual property path.
pub const MAX_PATH_LEN: usize = 1024;

/// Maximum size in bytes of a serialized snapshot accepted by
/// [`Snapshot::from_json_str`](crate::codec::Snapshot::from_json_str).
pub const MAX_SNAPSHOT_BYTES: usize = 8 * 1024 * 1024;

/// Maximum length of a synth type key.
pub const MAX_TYPE_KEY_LEN: usize = 32;

/// Maximum length of a temporary upload identifier.
pub const MAX_UPLOAD_ID_LEN: usize = 128;
