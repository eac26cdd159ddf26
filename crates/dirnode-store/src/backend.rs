//! The backend-agnostic storage contract (§4.2). Addressing and the 4 MiB
//! size limit live above this trait, in [`crate::BlobStore`]; a
//! `BlobBackend` impl only has to move bytes and referrers under a CID it's
//! given.

use crate::error::Result;
use crate::types::Referrer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dirnode_core::Cid;

/// A content-addressed object+referrer backend. The store holds no label
/// semantics; it is responsible only for addressing, chunking where
/// needed, and surfacing backend errors (§4.2).
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn put_object(&self, cid: &Cid, bytes: &[u8]) -> Result<()>;
    async fn get_object(&self, cid: &Cid) -> Result<Option<Vec<u8>>>;
    async fn delete_object(&self, cid: &Cid) -> Result<bool>;
    async fn object_exists(&self, cid: &Cid) -> Result<bool>;

    /// When the object was first written, if the backend tracks it.
    /// `None` means the backend has no durable creation-time record for
    /// this object (e.g. it was never written, or the backend doesn't
    /// persist one); `Head` (§4.2) falls back to the current time in that
    /// case rather than failing the call.
    async fn created_at(&self, cid: &Cid) -> Result<Option<DateTime<Utc>>>;

    async fn push_referrer(&self, cid: &Cid, referrer: Referrer) -> Result<()>;
    async fn list_referrers(&self, cid: &Cid, type_filter: Option<&str>) -> Result<Vec<Referrer>>;
    async fn delete_referrers(&self, cid: &Cid) -> Result<()>;
}
