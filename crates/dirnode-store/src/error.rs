//! Errors for the blob store (§4.2, §7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("parent object not found: {0}")]
    ParentNotFound(String),

    #[error("record payload of {size} bytes exceeds the 4 MiB limit")]
    TooLarge { size: usize },

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("codec error: {0}")]
    Codec(#[from] dirnode_core::Error),

    #[error("oci backend error: {0}")]
    Oci(String),

    #[error("corrupt metadata: {0}")]
    CorruptMeta(String),
}
