//! Default local `BlobBackend`, one sled tree per concern, following
//! `gossipd::storage::Storage`'s layout.

use crate::backend::BlobBackend;
use crate::error::{Result, StoreError};
use crate::types::Referrer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dirnode_core::Cid;
use sled::Db;
use std::path::Path;

pub struct SledBackend {
    db: Db,
    objects: sled::Tree,
    /// Referrer rows: key is `cid_string || 0x00 || type || 0x00 || seq`.
    referrers: sled::Tree,
    /// `cid -> RFC3339 creation timestamp`, written once on first
    /// `put_object` (records are immutable, §3, so this never changes
    /// again for a given cid).
    meta: sled::Tree,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let objects = db.open_tree("objects")?;
        let referrers = db.open_tree("referrers")?;
        let meta = db.open_tree("meta")?;
        Ok(SledBackend {
            db,
            objects,
            referrers,
            meta,
        })
    }

    fn referrer_prefix(cid: &Cid) -> Vec<u8> {
        let mut key = cid.to_string().into_bytes();
        key.push(0);
        key
    }
}

#[async_trait]
impl BlobBackend for SledBackend {
    async fn put_object(&self, cid: &Cid, bytes: &[u8]) -> Result<()> {
        self.objects.insert(cid.to_string(), bytes)?;
        let key = cid.to_string();
        if !self.meta.contains_key(&key)? {
            self.meta.insert(key, Utc::now().to_rfc3339().as_bytes())?;
        }
        Ok(())
    }

    async fn get_object(&self, cid: &Cid) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.get(cid.to_string())?.map(|v| v.to_vec()))
    }

    async fn delete_object(&self, cid: &Cid) -> Result<bool> {
        let removed = self.objects.remove(cid.to_string())?.is_some();
        self.meta.remove(cid.to_string())?;
        Ok(removed)
    }

    async fn object_exists(&self, cid: &Cid) -> Result<bool> {
        Ok(self.objects.contains_key(cid.to_string())?)
    }

    async fn created_at(&self, cid: &Cid) -> Result<Option<DateTime<Utc>>> {
        match self.meta.get(cid.to_string())? {
            Some(v) => {
                let s = std::str::from_utf8(&v).map_err(|e| StoreError::CorruptMeta(e.to_string()))?;
                let ts = DateTime::parse_from_rfc3339(s)
                    .map_err(|e| StoreError::CorruptMeta(e.to_string()))?
                    .with_timezone(&Utc);
                Ok(Some(ts))
            }
            None => Ok(None),
        }
    }

    async fn push_referrer(&self, cid: &Cid, referrer: Referrer) -> Result<()> {
        // `generate_id` is a db-wide atomic counter (monotonic, persisted),
        // not a scan-then-insert count, so two concurrent pushes for the
        // same cid can never collide on the same key and silently overwrite
        // one another.
        let seq = self.db.generate_id()?;
        let mut key = Self::referrer_prefix(cid);
        key.extend_from_slice(referrer.type_.as_bytes());
        key.push(0);
        key.extend_from_slice(&seq.to_be_bytes());
        let value = postcard::to_allocvec(&referrer)?;
        self.referrers.insert(key, value)?;
        Ok(())
    }

    async fn list_referrers(&self, cid: &Cid, type_filter: Option<&str>) -> Result<Vec<Referrer>> {
        let prefix = Self::referrer_prefix(cid);
        let mut out = Vec::new();
        for entry in self.referrers.scan_prefix(&prefix) {
            let (_, value) = entry?;
            let referrer: Referrer = postcard::from_bytes(&value)?;
            if type_filter.map_or(true, |t| t.eq_ignore_ascii_case(&referrer.type_)) {
                out.push(referrer);
            }
        }
        Ok(out)
    }

    async fn delete_referrers(&self, cid: &Cid) -> Result<()> {
        let prefix = Self::referrer_prefix(cid);
        let keys: Vec<_> = self
            .referrers
            .scan_prefix(&prefix)
            .keys()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;
        for key in keys {
            self.referrers.remove(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{REFERRER_TYPE_PUBLIC_KEY, REFERRER_TYPE_SIGNATURE};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn cid_of(bytes: &[u8]) -> Cid {
        Cid::of(bytes)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        let cid = cid_of(b"hello");
        backend.put_object(&cid, b"hello").await.unwrap();
        assert_eq!(backend.get_object(&cid).await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_object() {
        let dir = tempdir().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        let cid = cid_of(b"hello");
        backend.put_object(&cid, b"hello").await.unwrap();
        assert!(backend.delete_object(&cid).await.unwrap());
        assert_eq!(backend.get_object(&cid).await.unwrap(), None);
        assert!(!backend.delete_object(&cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_referrers_filtered_by_type() {
        let dir = tempdir().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        let cid = cid_of(b"hello");
        backend
            .push_referrer(
                &cid,
                Referrer {
                    type_: REFERRER_TYPE_SIGNATURE.into(),
                    data: vec![1, 2, 3],
                    media_type: "application/vnd.dev.sigstore.bundle".into(),
                },
            )
            .await
            .unwrap();
        backend
            .push_referrer(
                &cid,
                Referrer {
                    type_: REFERRER_TYPE_PUBLIC_KEY.into(),
                    data: vec![4, 5, 6],
                    media_type: "application/vnd.dev.cosign.pub".into(),
                },
            )
            .await
            .unwrap();

        let all = backend.list_referrers(&cid, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let sigs = backend
            .list_referrers(&cid, Some(REFERRER_TYPE_SIGNATURE))
            .await
            .unwrap();
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_referrers_clears_all() {
        let dir = tempdir().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        let cid = cid_of(b"hello");
        backend
            .push_referrer(
                &cid,
                Referrer {
                    type_: REFERRER_TYPE_SIGNATURE.into(),
                    data: vec![1],
                    media_type: "m".into(),
                },
            )
            .await
            .unwrap();
        backend.delete_referrers(&cid).await.unwrap();
        assert!(backend.list_referrers(&cid, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_pushes_of_same_type_both_survive() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(SledBackend::open(dir.path()).unwrap());
        let cid = cid_of(b"hello");

        let a = {
            let backend = backend.clone();
            let cid = cid.clone();
            tokio::spawn(async move {
                backend
                    .push_referrer(
                        &cid,
                        Referrer { type_: REFERRER_TYPE_SIGNATURE.into(), data: vec![1], media_type: "m".into() },
                    )
                    .await
            })
        };
        let b = {
            let backend = backend.clone();
            let cid = cid.clone();
            tokio::spawn(async move {
                backend
                    .push_referrer(
                        &cid,
                        Referrer { type_: REFERRER_TYPE_SIGNATURE.into(), data: vec![2], media_type: "m".into() },
                    )
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let sigs = backend.list_referrers(&cid, Some(REFERRER_TYPE_SIGNATURE)).await.unwrap();
        assert_eq!(sigs.len(), 2);
    }
}
