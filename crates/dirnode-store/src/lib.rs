//! dirnode-store: content-addressed object + referrer storage (C2, §4.2).
//!
//! [`BlobStore`] owns CID derivation and the 4 MiB size limit; a
//! [`BlobBackend`] implementation below it only has to move already-CID-
//! keyed bytes and referrers.

pub mod backend;
pub mod error;
pub mod oci_backend;
pub mod sled_backend;
pub mod types;

pub use backend::BlobBackend;
pub use error::{Result, StoreError};
pub use oci_backend::OciBackend;
pub use sled_backend::SledBackend;
pub use types::{Meta, Referrer, RecordRef, REFERRER_TYPE_PUBLIC_KEY, REFERRER_TYPE_SIGNATURE};

use dirnode_core::{Cid, Record};
use std::sync::Arc;

/// Record payloads larger than this are rejected with `StoreError::TooLarge`
/// (§4.2).
pub const MAX_RECORD_BYTES: usize = 4 * 1024 * 1024;

/// The C2 blob store contract (§4.2), generic over any [`BlobBackend`].
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
}

impl BlobStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        BlobStore { backend }
    }

    /// Computes the CID from canonical bytes, stores under it, and returns
    /// a [`RecordRef`]. Idempotent: re-putting the same bytes returns the
    /// same ref without allocating storage twice (P3).
    pub async fn put(&self, bytes: &[u8]) -> Result<RecordRef> {
        if bytes.len() > MAX_RECORD_BYTES {
            return Err(StoreError::TooLarge { size: bytes.len() });
        }
        let record = dirnode_core::codec::unmarshal(bytes)?;
        let canonical = dirnode_core::codec::marshal(&record)?;
        if canonical.len() > MAX_RECORD_BYTES {
            return Err(StoreError::TooLarge { size: canonical.len() });
        }
        let cid = Cid::of(&canonical);
        if !self.backend.object_exists(&cid).await? {
            self.backend.put_object(&cid, &canonical).await?;
        }
        Ok(RecordRef { cid })
    }

    pub async fn get(&self, record_ref: &RecordRef) -> Result<Vec<u8>> {
        self.backend
            .get_object(&record_ref.cid)
            .await?
            .ok_or_else(|| StoreError::NotFound(record_ref.cid.to_string()))
    }

    /// Parse the stored bytes back into a [`Record`], for callers that need
    /// the typed form rather than raw canonical bytes.
    pub async fn get_record(&self, record_ref: &RecordRef) -> Result<Record> {
        let bytes = self.get(record_ref).await?;
        Ok(dirnode_core::codec::unmarshal(&bytes)?)
    }

    pub async fn head(&self, record_ref: &RecordRef) -> Result<Meta> {
        let bytes = self.get(record_ref).await?;
        let referrers = self.backend.list_referrers(&record_ref.cid, None).await?;
        let created_at = self.backend.created_at(&record_ref.cid).await?.unwrap_or_else(chrono::Utc::now);
        Ok(Meta {
            cid: record_ref.cid,
            size: bytes.len(),
            created_at,
            referrer_types: referrers.into_iter().map(|r| r.type_).collect(),
        })
    }

    /// Removes the object and all of its referrers.
    pub async fn delete(&self, record_ref: &RecordRef) -> Result<()> {
        let removed = self.backend.delete_object(&record_ref.cid).await?;
        if !removed {
            return Err(StoreError::NotFound(record_ref.cid.to_string()));
        }
        self.backend.delete_referrers(&record_ref.cid).await?;
        Ok(())
    }

    pub async fn push_referrer(&self, record_ref: &RecordRef, referrer: Referrer) -> Result<()> {
        if !self.backend.object_exists(&record_ref.cid).await? {
            return Err(StoreError::ParentNotFound(record_ref.cid.to_string()));
        }
        self.backend.push_referrer(&record_ref.cid, referrer).await
    }

    pub async fn pull_referrer(
        &self,
        record_ref: &RecordRef,
        type_filter: Option<&str>,
    ) -> Result<Vec<Referrer>> {
        self.backend.list_referrers(&record_ref.cid, type_filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (BlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(SledBackend::open(dir.path()).unwrap());
        (BlobStore::new(backend), dir)
    }

    const SAMPLE: &[u8] = br#"{"schema_version":"v0.5.0","name":"x","version":"1.0.0"}"#;

    #[tokio::test]
    async fn test_put_returns_baf_prefixed_ref() {
        let (store, _dir) = store();
        let record_ref = store.put(SAMPLE).await.unwrap();
        assert!(record_ref.cid.to_string().starts_with("baf"));
    }

    #[tokio::test]
    async fn test_put_is_idempotent_p3() {
        let (store, _dir) = store();
        let a = store.put(SAMPLE).await.unwrap();
        let b = store.put(SAMPLE).await.unwrap();
        assert_eq!(a.cid.to_string(), b.cid.to_string());
    }

    #[tokio::test]
    async fn test_get_round_trips_canonical_bytes() {
        let (store, _dir) = store();
        let record_ref = store.put(SAMPLE).await.unwrap();
        let bytes = store.get(&record_ref).await.unwrap();
        let canon = dirnode_core::canonical::canonicalize_bytes(SAMPLE).unwrap();
        assert_eq!(bytes, canon);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (store, _dir) = store();
        let record_ref = RecordRef { cid: dirnode_core::Cid::of(b"nope") };
        assert!(matches!(store.get(&record_ref).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let (store, _dir) = store();
        let big = vec![b'a'; MAX_RECORD_BYTES + 1];
        assert!(matches!(
            store.put(&big).await,
            Err(StoreError::TooLarge { .. }) | Err(StoreError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_referrers() {
        let (store, _dir) = store();
        let record_ref = store.put(SAMPLE).await.unwrap();
        store
            .push_referrer(
                &record_ref,
                Referrer {
                    type_: REFERRER_TYPE_SIGNATURE.into(),
                    data: vec![1, 2, 3],
                    media_type: "m".into(),
                },
            )
            .await
            .unwrap();
        store.delete(&record_ref).await.unwrap();
        assert!(matches!(store.get(&record_ref).await, Err(StoreError::NotFound(_))));
        assert!(store.pull_referrer(&record_ref, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_referrer_requires_existing_parent() {
        let (store, _dir) = store();
        let record_ref = RecordRef { cid: dirnode_core::Cid::of(b"missing") };
        let err = store
            .push_referrer(
                &record_ref,
                Referrer {
                    type_: REFERRER_TYPE_PUBLIC_KEY.into(),
                    data: vec![],
                    media_type: "m".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ParentNotFound(_)));
    }

    #[tokio::test]
    async fn test_head_created_at_is_stable_across_calls() {
        let (store, _dir) = store();
        let record_ref = store.put(SAMPLE).await.unwrap();
        let first = store.head(&record_ref).await.unwrap();
        let second = store.head(&record_ref).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(first.size, second.size);
    }
}
