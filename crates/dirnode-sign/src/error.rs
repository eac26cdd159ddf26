//! Errors for the sign controller (§4.9, §7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SignError>;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid private key material: {0}")]
    InvalidKey(String),

    #[error("OIDC/keyless signing is not available: {0}")]
    OidcUnavailable(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] dirnode_store::StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] dirnode_core::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("outbound call timed out after {0:?}")]
    Timeout(std::time::Duration),
}
