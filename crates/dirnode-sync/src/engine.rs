//! The C8 sync engine (§4.8): a scheduler that wakes on interval or on
//! new-sync events and drives each active sync's state machine, following
//! `gossipd::server::Server::spawn_sync_task`'s one-task-per-concern shape.

use crate::error::{Result, SyncError};
use crate::sync_store::SyncStore;
use crate::types::{RemoteConnector, SyncObject, SyncState};
use dirnode_core::Cid;
use dirnode_routing::LocalLabelIndex;
use dirnode_search::SearchIndex;
use dirnode_store::BlobStore;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default per-sync pull concurrency (§4.8).
pub const DEFAULT_MAX_CONCURRENT_PULLS: usize = 4;
/// Scheduler sweep interval.
const SCHEDULER_TICK: Duration = Duration::from_secs(5);
/// Exponential backoff bounds for transient whole-sync failures (§4.8).
const BACKOFF_MIN: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);
/// Consecutive whole-sync failures before transitioning to `FAILED`.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;
const REMOTE_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Signal {
    Run,
    Delete,
}

/// Orchestrates every active [`SyncObject`]; one background task per sync,
/// coordinated through a `watch` channel so [`SyncEngine::delete_sync`] can
/// tell a running task to drain and stop without the scheduler polling a
/// shared queue.
pub struct SyncEngine {
    store: Arc<BlobStore>,
    search: Arc<SearchIndex>,
    label_index: Arc<LocalLabelIndex>,
    sync_store: Arc<SyncStore>,
    connector: Arc<dyn RemoteConnector>,
    max_concurrent_pulls: usize,
    signals: parking_lot::Mutex<HashMap<Uuid, watch::Sender<Signal>>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<BlobStore>,
        search: Arc<SearchIndex>,
        label_index: Arc<LocalLabelIndex>,
        sync_store: Arc<SyncStore>,
        connector: Arc<dyn RemoteConnector>,
    ) -> Arc<Self> {
        Arc::new(SyncEngine {
            store,
            search,
            label_index,
            sync_store,
            connector,
            max_concurrent_pulls: DEFAULT_MAX_CONCURRENT_PULLS,
            signals: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Resume every sync left in an active state from a prior run (e.g.
    /// after a restart) by spawning its task.
    pub fn resume_all(self: &Arc<Self>) -> Result<()> {
        for sync in self.sync_store.list()? {
            if sync.state.is_active() {
                self.spawn_task(sync.sync_id);
            }
        }
        Ok(())
    }

    /// `CreateSync({remote_url, cids[]?})` (§6).
    pub fn create_sync(self: &Arc<Self>, remote_url: impl Into<String>, cid_filter: Vec<String>) -> Result<Uuid> {
        let sync_id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let sync = SyncObject {
            sync_id,
            remote_url: remote_url.into(),
            cid_filter,
            state: SyncState::Pending,
            created_at: now,
            updated_at: now,
            error: None,
        };
        self.sync_store.put(&sync)?;
        self.spawn_task(sync_id);
        Ok(sync_id)
    }

    pub fn get_sync(&self, sync_id: Uuid) -> Result<SyncObject> {
        self.sync_store.get(sync_id)?.ok_or_else(|| SyncError::NotFound(sync_id.to_string()))
    }

    pub fn list_syncs(&self) -> Result<Vec<SyncObject>> {
        self.sync_store.list()
    }

    /// `DeleteSync({sync_id})` (§6, §4.8): marks `DELETE_PENDING` and signals
    /// the running task, if any, to drain and finish.
    pub fn delete_sync(&self, sync_id: Uuid) -> Result<()> {
        let mut sync = self.get_sync(sync_id)?;
        sync.state = SyncState::DeletePending;
        sync.updated_at = chrono::Utc::now();
        self.sync_store.put(&sync)?;

        let signals = self.signals.lock();
        if let Some(tx) = signals.get(&sync_id) {
            let _ = tx.send(Signal::Delete);
        }
        Ok(())
    }

    fn spawn_task(self: &Arc<Self>, sync_id: Uuid) {
        let (tx, rx) = watch::channel(Signal::Run);
        self.signals.lock().insert(sync_id, tx);
        let engine = self.clone();
        tokio::spawn(async move { engine.run_sync_task(sync_id, rx).await });
    }

    async fn run_sync_task(self: Arc<Self>, sync_id: Uuid, mut signal: watch::Receiver<Signal>) {
        let mut consecutive_failures: u32 = 0;
        loop {
            if *signal.borrow() == Signal::Delete {
                self.finish_delete(sync_id);
                return;
            }

            match self.run_pass(sync_id).await {
                Ok(()) => {
                    consecutive_failures = 0;
                }
                Err(SyncError::NotFound(_)) => {
                    // Sync was reaped out from under us.
                    return;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(%sync_id, error = %e, consecutive_failures, "sync pass failed");
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        self.mark_failed(sync_id, &e.to_string());
                        return;
                    }
                    let backoff = backoff_for(consecutive_failures);
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = signal.changed() => {}
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(SCHEDULER_TICK) => {}
                _ = signal.changed() => {}
            }
        }
    }

    fn finish_delete(&self, sync_id: Uuid) {
        if let Ok(mut sync) = self.get_sync(sync_id) {
            sync.state = SyncState::Deleted;
            sync.updated_at = chrono::Utc::now();
            let _ = self.sync_store.put(&sync);
        }
        self.signals.lock().remove(&sync_id);
        info!(%sync_id, "sync deleted");
    }

    fn mark_failed(&self, sync_id: Uuid, error: &str) {
        if let Ok(mut sync) = self.get_sync(sync_id) {
            sync.state = SyncState::Failed;
            sync.error = Some(error.to_string());
            sync.updated_at = chrono::Utc::now();
            let _ = self.sync_store.put(&sync);
        }
        self.signals.lock().remove(&sync_id);
        error!(%sync_id, error, "sync transitioned to FAILED after repeated whole-sync errors");
    }

    /// One scheduler pass over a single sync (§4.8 "Algorithm").
    async fn run_pass(&self, sync_id: Uuid) -> Result<()> {
        let mut sync = self.get_sync(sync_id)?;
        if !sync.state.is_active() || sync.state == SyncState::DeletePending {
            return Ok(());
        }
        if sync.state == SyncState::Pending {
            sync.state = SyncState::InProgress;
            sync.updated_at = chrono::Utc::now();
            self.sync_store.put(&sync)?;
        }

        let remote = tokio::time::timeout(REMOTE_CALL_TIMEOUT, self.connector.connect(&sync.remote_url))
            .await
            .map_err(|_| SyncError::Timeout(REMOTE_CALL_TIMEOUT))?
            .map_err(SyncError::Remote)?;

        // Step 1: resolve the effective remote CID set.
        let effective: BTreeSet<String> = if sync.cid_filter.is_empty() {
            tokio::time::timeout(REMOTE_CALL_TIMEOUT, remote.list_cids(&[]))
                .await
                .map_err(|_| SyncError::Timeout(REMOTE_CALL_TIMEOUT))?
                .map_err(SyncError::Remote)?
                .into_iter()
                .collect()
        } else {
            sync.cid_filter.iter().cloned().collect()
        };

        // Step 2: subtract the progress cursor.
        let cursor = self.sync_store.load_cursor(sync_id)?;
        let mut todo: Vec<String> = effective.difference(&cursor).cloned().collect();
        todo.sort(); // CID-lex order for determinism (§4.8 "Ordering & concurrency").

        if todo.is_empty() {
            return Ok(());
        }

        // Step 3/4: pull, verify, put; bounded concurrency, one cursor
        // write for the whole batch.
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_pulls));
        let mut handles = Vec::with_capacity(todo.len());
        for cid_str in todo {
            let semaphore = semaphore.clone();
            let remote = remote.clone_handle();
            let store = self.store.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                pull_one(remote, store, cid_str).await
            }));
        }

        let mut transferred = Vec::new();
        let mut records_for_index = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok((cid_str, bytes))) => {
                    transferred.push(cid_str);
                    records_for_index.push(bytes);
                }
                Ok(Err((cid_str, e))) => {
                    debug!(%sync_id, cid = %cid_str, error = %e, "per-item pull/verify failure, will retry next pass");
                }
                Err(join_err) => {
                    warn!(%sync_id, error = %join_err, "pull task panicked");
                }
            }
        }

        for bytes in &records_for_index {
            if let Err(e) = self.index_locally(bytes).await {
                warn!(%sync_id, error = %e, "failed to update search/label index for synced record");
            }
        }

        if !transferred.is_empty() {
            self.sync_store.extend_cursor(sync_id, transferred)?;
        }

        let mut sync = self.get_sync(sync_id)?;
        sync.updated_at = chrono::Utc::now();
        self.sync_store.put(&sync)?;
        Ok(())
    }

    /// Streams a freshly-pulled record into C3 and C4, per the data-flow
    /// note in §2 ("sync ... streams records into C2/C3/C4"). C2 has
    /// already been written by [`pull_one`] at this point.
    async fn index_locally(&self, canonical_bytes: &[u8]) -> Result<()> {
        let record = dirnode_core::codec::unmarshal(canonical_bytes)?;
        let cid = dirnode_core::codec::canonical_hash(&record)?;
        let normalized = record.normalize();
        self.search.index_record(&cid, &normalized, &chrono::Utc::now().to_rfc3339())?;
        let labels: std::collections::BTreeSet<String> = dirnode_core::codec::extract_record_labels(&record)
            .into_iter()
            .map(|l| l.as_str().to_string())
            .collect();
        self.label_index.publish(&cid, &labels)?;
        Ok(())
    }
}

/// Pull one CID, verify it hashes to itself (P7), and write it to the
/// local blob store. Returns the canonical bytes on success so the caller
/// can index them without re-reading from the store.
async fn pull_one(
    remote: Arc<dyn crate::types::RemoteDirectory>,
    store: Arc<BlobStore>,
    cid_str: String,
) -> std::result::Result<(String, Vec<u8>), (String, String)> {
    let bytes = tokio::time::timeout(REMOTE_CALL_TIMEOUT, remote.pull(&cid_str))
        .await
        .map_err(|_| (cid_str.clone(), "timed out".to_string()))?
        .map_err(|e| (cid_str.clone(), e))?;

    let expected = Cid::parse(&cid_str).map_err(|e| (cid_str.clone(), e.to_string()))?;
    let record = dirnode_core::codec::unmarshal(&bytes).map_err(|e| (cid_str.clone(), e.to_string()))?;
    let actual = dirnode_core::codec::canonical_hash(&record).map_err(|e| (cid_str.clone(), e.to_string()))?;
    if actual != expected {
        return Err((cid_str.clone(), format!("hash mismatch: expected {expected} got {actual}")));
    }

    let canonical = dirnode_core::codec::marshal(&record).map_err(|e| (cid_str.clone(), e.to_string()))?;
    store.put(&canonical).await.map_err(|e| (cid_str.clone(), e.to_string()))?;
    Ok((cid_str, canonical))
}

fn backoff_for(attempt: u32) -> Duration {
    let exp = BACKOFF_MIN.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
    let capped = exp.min(BACKOFF_MAX.as_millis() as u64);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
    Duration::from_millis(capped + jitter)
}

/// Extension so a `dyn RemoteDirectory` can be cheaply reused across
/// concurrent pulls within one pass without requiring `Clone` on the trait
/// object itself.
trait CloneHandle {
    fn clone_handle(&self) -> Arc<dyn crate::types::RemoteDirectory>;
}

impl CloneHandle for Arc<dyn crate::types::RemoteDirectory> {
    fn clone_handle(&self) -> Arc<dyn crate::types::RemoteDirectory> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RemoteDirectory;
    use async_trait::async_trait;
    use dirnode_store::SledBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeRemote {
        records: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl RemoteDirectory for FakeRemote {
        async fn list_cids(&self, _filter: &[String]) -> std::result::Result<Vec<String>, String> {
            Ok(self.records.keys().cloned().collect())
        }
        async fn pull(&self, cid: &str) -> std::result::Result<Vec<u8>, String> {
            self.records.get(cid).cloned().ok_or_else(|| "not found".to_string())
        }
    }

    struct FakeConnector {
        remote: Arc<dyn RemoteDirectory>,
        connect_calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteConnector for FakeConnector {
        async fn connect(&self, _remote_url: &str) -> std::result::Result<Arc<dyn RemoteDirectory>, String> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.remote.clone())
        }
    }

    fn sample_record() -> (String, Vec<u8>) {
        let bytes = br#"{"schema_version":"v0.5.0","name":"r","version":"1.0.0"}"#.to_vec();
        let record = dirnode_core::codec::unmarshal(&bytes).unwrap();
        let cid = dirnode_core::codec::canonical_hash(&record).unwrap();
        let canonical = dirnode_core::codec::marshal(&record).unwrap();
        (cid.to_string(), canonical)
    }

    async fn harness(remote_records: HashMap<String, Vec<u8>>) -> (Arc<SyncEngine>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(BlobStore::new(Arc::new(SledBackend::open(dir.path().join("blobs")).unwrap())));
        let search = Arc::new(SearchIndex::open_in_memory().unwrap());
        let label_index = Arc::new(LocalLabelIndex::open(dir.path().join("labels")).unwrap());
        let sync_store = Arc::new(SyncStore::open(dir.path().join("syncs")).unwrap());
        let connector = Arc::new(FakeConnector {
            remote: Arc::new(FakeRemote { records: remote_records }),
            connect_calls: AtomicUsize::new(0),
        });
        (SyncEngine::new(store, search, label_index, sync_store, connector), dir)
    }

    #[tokio::test]
    async fn test_sync_converges_p7() {
        let (cid, bytes) = sample_record();
        let (engine, _dir) = harness(HashMap::from([(cid.clone(), bytes.clone())])).await;

        let sync_id = engine.create_sync("https://a.example/", vec![cid.clone()]).unwrap();

        for _ in 0..50 {
            if engine.get_sync(sync_id).unwrap().state == SyncState::InProgress {
                let cursor = engine.sync_store.load_cursor(sync_id).unwrap();
                if cursor.contains(&cid) {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let cursor = engine.sync_store.load_cursor(sync_id).unwrap();
        assert!(cursor.contains(&cid));

        let pulled = engine.store.get_record(&dirnode_store::RecordRef { cid: Cid::parse(&cid).unwrap() }).await;
        assert!(pulled.is_ok());
    }

    #[tokio::test]
    async fn test_create_then_delete_sync_transitions_to_deleted() {
        let (engine, _dir) = harness(HashMap::new()).await;
        let sync_id = engine.create_sync("https://a.example/", vec![]).unwrap();
        engine.delete_sync(sync_id).unwrap();

        for _ in 0..50 {
            if engine.get_sync(sync_id).unwrap().state == SyncState::Deleted {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(engine.get_sync(sync_id).unwrap().state, SyncState::Deleted);
    }

    #[tokio::test]
    async fn test_backoff_grows_and_caps() {
        let a1 = backoff_for(1);
        let a5 = backoff_for(5);
        assert!(a1 >= BACKOFF_MIN);
        assert!(a5 <= BACKOFF_MAX + Duration::from_millis(BACKOFF_MAX.as_millis() as u64 / 4 + 1));
    }
}
