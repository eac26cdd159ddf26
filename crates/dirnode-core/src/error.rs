//! Error types for the record codec.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Record codec error kinds. Maps 1:1 onto the `InvalidArgument` /
/// `Internal` gRPC status families at the API-server boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload is not valid JSON, or structurally malformed for any variant.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// `schema_version` is missing or not one of the recognized variants.
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(String),

    /// A required field was absent for the detected variant.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Serialization/deserialization failure via serde_json.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
