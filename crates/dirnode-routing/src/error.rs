//! Errors for routing (§4.4-§4.7, §7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RoutingError>;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("empty queries")]
    EmptyQueries,

    #[error("unknown query type: {0}")]
    BadQueryType(String),

    #[error("record not found in store: {0}")]
    RefNotFound(String),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("codec error: {0}")]
    Codec(#[from] dirnode_core::Error),

    #[error("store error: {0}")]
    Store(#[from] dirnode_store::StoreError),

    #[error("overlay error: {0}")]
    Overlay(String),

    #[error("outbound call timed out after {0:?}")]
    Timeout(std::time::Duration),
}
