//! Error types for snapshot dehydration, hydration and mutation.

use thiserror::Error;

/// Error classes, stable across releases.
///
/// Callers that need to render a failure state (for example a "stale page"
/// prompt on [`ErrorCode::UnknownTypeKey`]) should branch on the class rather
/// than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// S001: Path resolution reached a dead end
    PropertyNotFound,
    /// S002: Write attempted without a matching rule, or on a locked property
    AuthorizationDenied,
    /// S003: Reference collection mixes backing-store connections
    HeterogeneousOrigin,
    /// S004: Snapshot references a type key this process does not know
    UnknownTypeKey,
    /// S005: Snapshot structure or checksum is invalid
    MalformedSnapshot,
    /// S006: A value has the wrong shape for its destination
    InvalidValue,
    /// S007: A security limit was exceeded
    Limits,
    /// S008: Synth registry misuse
    Registry,
    /// S009: Persistence collaborator failure
    Store,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "S001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::PropertyNotFound => "S001",
            ErrorCode::AuthorizationDenied => "S002",
            ErrorCode::HeterogeneousOrigin => "S003",
            ErrorCode::UnknownTypeKey => "S004",
            ErrorCode::MalformedSnapshot => "S005",
            ErrorCode::InvalidValue => "S006",
            ErrorCode::Limits => "S007",
            ErrorCode::Registry => "S008",
            ErrorCode::Store => "S009",
        }
    }
}

/// Error raised by the codec, the mutation engine or a synth.
///
/// Errors propagate synchronously to the caller of the walker; the codec
/// never catches its own errors and never retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // === S001: Property not found ===
    #[error("[S001] property [{path}] not found on component [{component}]")]
    PropertyNotFound { path: String, component: String },

    #[error("[S001] method {method:?} not available at [{path}]")]
    MethodNotFound { method: String, path: String },

    // === S002: Authorization ===
    #[error("[S002] cannot bind to [{path}] on component [{component}] without a validation rule")]
    AuthorizationDenied { path: String, component: String },

    #[error("[S002] property [{property}] on component [{component}] is locked")]
    LockedProperty { property: String, component: String },

    // === S003: Heterogeneous origin ===
    #[error("[S003] collection of {model} mixes connections {expected:?} and {found:?}")]
    HeterogeneousOrigin {
        model: String,
        expected: String,
        found: String,
    },

    // === S004: Unknown type key ===
    #[error("[S004] unknown synth type key {key:?} at [{path}]")]
    UnknownTypeKey { key: String, path: String },

    // === S005: Malformed snapshot ===
    #[error("[S005] malformed snapshot at [{path}]: {reason}")]
    MalformedSnapshot { path: String, reason: &'static str },

    #[error("[S005] snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("[S005] snapshot belongs to component {found:?}, expected {expected:?}")]
    ComponentMismatch { expected: String, found: String },

    #[error("[S005] invalid JSON: {0}")]
    Json(String),

    // === S006: Invalid value ===
    #[error("[S006] invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("[S006] no synth handles value of type {type_name} at [{path}]")]
    UnsupportedValue { type_name: String, path: String },

    #[error("[S006] expected {expected} at [{path}], found {found}")]
    InvalidValue {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("[S006] float at [{path}] is NaN or infinite")]
    NonFiniteFloat { path: String },

    #[error("[S006] {value} is not a valid case of enum {enum_type}")]
    InvalidEnumCase { enum_type: String, value: String },

    // === S007: Limits ===
    #[error("[S007] nesting depth at [{path}] exceeds maximum {max}")]
    DepthExceeded { path: String, max: usize },

    #[error("[S007] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    // === S008: Registry ===
    #[error("[S008] synth type key {key:?} is already registered")]
    DuplicateTypeKey { key: String },

    // === S009: Store ===
    #[error("[S009] loading {model} failed: {reason}")]
    Store { model: String, reason: String },
}

impl Error {
    /// Returns the error class for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::PropertyNotFound { .. } | Error::MethodNotFound { .. } => {
                ErrorCode::PropertyNotFound
            }
            Error::AuthorizationDenied { .. } | Error::LockedProperty { .. } => {
                ErrorCode::AuthorizationDenied
            }
            Error::HeterogeneousOrigin { .. } => ErrorCode::HeterogeneousOrigin,
            Error::UnknownTypeKey { .. } => ErrorCode::UnknownTypeKey,
            Error::MalformedSnapshot { .. }
            | Error::ChecksumMismatch
            | Error::ComponentMismatch { .. }
            | Error::Json(_) => ErrorCode::MalformedSnapshot,
            Error::InvalidPath { .. }
            | Error::UnsupportedValue { .. }
            | Error::InvalidValue { .. }
            | Error::NonFiniteFloat { .. }
            | Error::InvalidEnumCase { .. } => ErrorCode::InvalidValue,
            Error::DepthExceeded { .. } | Error::LengthExceedsLimit { .. } => ErrorCode::Limits,
            Error::DuplicateTypeKey { .. } => ErrorCode::Registry,
            Error::Store { .. } => ErrorCode::Store,
        }
    }

    /// Shorthand for a [`Error::MalformedSnapshot`] at `path`.
    pub fn malformed(path: impl ToString, reason: &'static str) -> Self {
        Error::MalformedSnapshot {
            path: path.to_string(),
            reason,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = Error::UnknownTypeKey {
            key: "xyz".to_string(),
            path: "items".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::UnknownTypeKey);
        assert_eq!(err.code().code(), "S004");
        assert!(err.to_string().starts_with("[S004]"));
    }

    #[test]
    fn test_locked_is_an_authorization_failure() {
        let err = Error::LockedProperty {
            property: "foo".to_string(),
            component: "counter".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::AuthorizationDenied);
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(err.code(), ErrorCode::MalformedSnapshot);
    }
}
