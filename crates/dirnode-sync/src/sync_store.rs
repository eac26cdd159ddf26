//! Persistence for [`SyncObject`]s and their per-sync progress cursor
//! (§3 "the set of remote CIDs already transferred is persisted per sync
//! as an opaque progress cursor"). Backed by sled, following the rest of
//! the workspace's preference for it over a second database for anything
//! that isn't the relational search index.

use crate::error::Result;
use crate::types::SyncObject;
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

pub struct SyncStore {
    syncs: sled::Tree,
    cursors: sled::Tree,
}

impl SyncStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(SyncStore { syncs: db.open_tree("syncs")?, cursors: db.open_tree("sync_cursors")? })
    }

    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(SyncStore { syncs: db.open_tree("syncs")?, cursors: db.open_tree("sync_cursors")? })
    }

    pub fn put(&self, sync: &SyncObject) -> Result<()> {
        self.syncs.insert(sync.sync_id.as_bytes(), postcard::to_allocvec(sync)?)?;
        Ok(())
    }

    pub fn get(&self, sync_id: Uuid) -> Result<Option<SyncObject>> {
        match self.syncs.get(sync_id.as_bytes())? {
            Some(v) => Ok(Some(postcard::from_bytes(&v)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<SyncObject>> {
        let mut out = Vec::new();
        for entry in self.syncs.iter() {
            let (_, v) = entry?;
            out.push(postcard::from_bytes(&v)?);
        }
        out.sort_by_key(|s: &SyncObject| s.created_at);
        Ok(out)
    }

    /// Remove the row entirely (§4.8 "eventually reaps the row").
    pub fn reap(&self, sync_id: Uuid) -> Result<()> {
        self.syncs.remove(sync_id.as_bytes())?;
        self.cursors.remove(sync_id.as_bytes())?;
        Ok(())
    }

    pub fn load_cursor(&self, sync_id: Uuid) -> Result<BTreeSet<String>> {
        match self.cursors.get(sync_id.as_bytes())? {
            Some(v) => Ok(postcard::from_bytes(&v)?),
            None => Ok(BTreeSet::new()),
        }
    }

    /// One persistent write for the whole batch of newly-transferred CIDs
    /// (§4.8 "one persistent write per batch").
    pub fn extend_cursor(&self, sync_id: Uuid, transferred: impl IntoIterator<Item = String>) -> Result<()> {
        let mut cursor = self.load_cursor(sync_id)?;
        cursor.extend(transferred);
        self.cursors.insert(sync_id.as_bytes(), postcard::to_allocvec(&cursor)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncState;

    fn sample(sync_id: Uuid) -> SyncObject {
        let now = chrono::Utc::now();
        SyncObject {
            sync_id,
            remote_url: "https://remote.example/".into(),
            cid_filter: vec![],
            state: SyncState::Pending,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    #[test]
    fn test_put_get_round_trip() {
        let store = SyncStore::open_temporary().unwrap();
        let id = Uuid::new_v4();
        store.put(&sample(id)).unwrap();
        let back = store.get(id).unwrap().unwrap();
        assert_eq!(back.sync_id, id);
    }

    #[test]
    fn test_get_unknown_returns_none() {
        let store = SyncStore::open_temporary().unwrap();
        assert!(store.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_cursor_extends_and_persists() {
        let store = SyncStore::open_temporary().unwrap();
        let id = Uuid::new_v4();
        store.extend_cursor(id, vec!["baf1".to_string()]).unwrap();
        store.extend_cursor(id, vec!["baf2".to_string()]).unwrap();
        let cursor = store.load_cursor(id).unwrap();
        assert_eq!(cursor, ["baf1".to_string(), "baf2".to_string()].into_iter().collect());
    }

    #[test]
    fn test_reap_removes_sync_and_cursor() {
        let store = SyncStore::open_temporary().unwrap();
        let id = Uuid::new_v4();
        store.put(&sample(id)).unwrap();
        store.extend_cursor(id, vec!["baf1".to_string()]).unwrap();
        store.reap(id).unwrap();
        assert!(store.get(id).unwrap().is_none());
        assert!(store.load_cursor(id).unwrap().is_empty());
    }

    #[test]
    fn test_list_all_syncs() {
        let store = SyncStore::open_temporary().unwrap();
        store.put(&sample(Uuid::new_v4())).unwrap();
        store.put(&sample(Uuid::new_v4())).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }
}
