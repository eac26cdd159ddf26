//! Errors for the sync engine (§4.8, §7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown sync_id: {0}")]
    NotFound(String),

    #[error("remote connector error: {0}")]
    Remote(String),

    #[error("record {cid} failed integrity verification: expected hash did not match pulled bytes")]
    IntegrityMismatch { cid: String },

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("codec error: {0}")]
    Codec(#[from] dirnode_core::Error),

    #[error("store error: {0}")]
    Store(#[from] dirnode_store::StoreError),

    #[error("search index error: {0}")]
    Search(#[from] dirnode_search::SearchError),

    #[error("routing error: {0}")]
    Routing(#[from] dirnode_routing::RoutingError),

    #[error("outbound call timed out after {0:?}")]
    Timeout(std::time::Duration),
}
