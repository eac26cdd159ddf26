//! C4 local label index (§4.4): per-node persistent `label → set<cid>` and
//! reverse `cid → set<label>`.
//!
//! Writes are synchronous with `routing publish`/`unpublish`, backed by
//! sled for durability across restarts (hard state, per §3 "Lifecycles").
//! Per §5's shared-resource policy ("C4 uses a single writer lock; readers
//! are lock-free via a snapshot"), all writes take the `parking_lot::Mutex`
//! below while reads work off an in-memory snapshot rebuilt after each
//! write — a reader never blocks on a concurrent writer.

use crate::error::Result;
use dirnode_core::Cid;
use parking_lot::{Mutex, RwLock};
use sled::Db;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Default)]
struct Snapshot {
    /// Keyed by lowercased label (§6 "labels are case-preserving but
    /// equality is case-insensitive"); values are cid strings, which carry
    /// no case-sensitivity concern of their own.
    label_to_cids: HashMap<String, BTreeSet<String>>,
    /// Keyed by cid; values are the original, case-preserving labels a
    /// record was actually published under.
    cid_to_labels: HashMap<String, BTreeSet<String>>,
}

/// The case-insensitive key a label is compared/stored under (§6).
fn label_key(label: &str) -> String {
    label.to_lowercase()
}

pub struct LocalLabelIndex {
    db: Db,
    forward: sled::Tree, // label -> postcard(BTreeSet<cid string>)
    reverse: sled::Tree, // cid -> postcard(BTreeSet<label string>)
    write_lock: Mutex<()>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl LocalLabelIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let forward = db.open_tree("label_forward")?;
        let reverse = db.open_tree("label_reverse")?;
        let snapshot = Self::load_snapshot(&forward, &reverse)?;
        Ok(LocalLabelIndex {
            db,
            forward,
            reverse,
            write_lock: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    fn load_snapshot(forward: &sled::Tree, reverse: &sled::Tree) -> Result<Snapshot> {
        let mut label_to_cids = HashMap::new();
        for entry in forward.iter() {
            let (k, v) = entry?;
            // Keys are written as `label_key(label)` below, already lowercased.
            let label = String::from_utf8_lossy(&k).to_string();
            let cids: BTreeSet<String> = postcard::from_bytes(&v)?;
            label_to_cids.insert(label, cids);
        }
        let mut cid_to_labels = HashMap::new();
        for entry in reverse.iter() {
            let (k, v) = entry?;
            let cid = String::from_utf8_lossy(&k).to_string();
            let labels: BTreeSet<String> = postcard::from_bytes(&v)?;
            cid_to_labels.insert(cid, labels);
        }
        Ok(Snapshot { label_to_cids, cid_to_labels })
    }

    /// Insert `cid` under every label in `labels`, in both directions, and
    /// publish a fresh read snapshot.
    pub fn publish(&self, cid: &Cid, labels: &BTreeSet<String>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let cid_s = cid.to_string();

        let mut snapshot = (**self.snapshot.read()).clone();

        for label in labels {
            let key = label_key(label);
            let set = snapshot.label_to_cids.entry(key.clone()).or_default();
            set.insert(cid_s.clone());
            self.forward.insert(key.as_bytes(), postcard::to_allocvec(set)?)?;
        }
        snapshot.cid_to_labels.insert(cid_s.clone(), labels.clone());
        self.reverse.insert(cid_s.as_bytes(), postcard::to_allocvec(labels)?)?;

        *self.snapshot.write() = Arc::new(snapshot);
        Ok(())
    }

    /// Remove `cid` from every label it was published under (inverse of
    /// [`Self::publish`]).
    pub fn unpublish(&self, cid: &Cid) -> Result<()> {
        let _guard = self.write_lock.lock();
        let cid_s = cid.to_string();

        let mut snapshot = (**self.snapshot.read()).clone();
        if let Some(labels) = snapshot.cid_to_labels.remove(&cid_s) {
            for label in &labels {
                let key = label_key(label);
                if let Some(set) = snapshot.label_to_cids.get_mut(&key) {
                    set.remove(&cid_s);
                    if set.is_empty() {
                        snapshot.label_to_cids.remove(&key);
                        self.forward.remove(key.as_bytes())?;
                    } else {
                        self.forward.insert(key.as_bytes(), postcard::to_allocvec(set)?)?;
                    }
                }
            }
        }
        self.reverse.remove(cid_s.as_bytes())?;

        *self.snapshot.write() = Arc::new(snapshot);
        Ok(())
    }

    /// `AND` of label predicates; an empty `labels` matches every locally
    /// published CID. Matching is case-insensitive (§6); `labels` may carry
    /// whatever case the caller used.
    pub fn list_local(&self, labels: &[String]) -> Vec<String> {
        let snapshot = self.snapshot.read();
        if labels.is_empty() {
            return snapshot.cid_to_labels.keys().cloned().collect();
        }
        let mut iter = labels.iter().map(|l| label_key(l));
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut result: BTreeSet<String> =
            snapshot.label_to_cids.get(&first).cloned().unwrap_or_default();
        for key in iter {
            let set = snapshot.label_to_cids.get(&key).cloned().unwrap_or_default();
            result = result.intersection(&set).cloned().collect();
        }
        result.into_iter().collect()
    }

    /// Exact CID lookup, distinguishing "not found locally" from "found
    /// with no labels" (§4.4).
    pub fn lookup_cid(&self, cid: &str) -> Option<BTreeSet<String>> {
        self.snapshot.read().cid_to_labels.get(cid).cloned()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
