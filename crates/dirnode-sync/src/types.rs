//! Sync object types (§3 "Sync object") and the remote-directory contract
//! a sync pulls from.
//!
//! The client library for the gRPC API is explicitly out of scope (§1);
//! [`RemoteDirectory`]/[`RemoteConnector`] are the seam the sync engine
//! consumes it through — whatever implements them in `dirnoded` is free to
//! be a real network client, while tests use an in-memory stand-in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// `{sync_id, remote_url, cid_filter[], state, created_at, updated_at, error?}`
/// (§3 "Sync object").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SyncObject {
    pub sync_id: Uuid,
    pub remote_url: String,
    pub cid_filter: Vec<String>,
    pub state: SyncState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
}

/// §4.8 state machine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncState {
    Pending,
    InProgress,
    DeletePending,
    Deleted,
    Failed,
}

impl SyncState {
    /// States that the scheduler still actively drives. `Deleted` and
    /// `Failed` are terminal; `DeletePending` is driven only long enough to
    /// drain in-flight pulls.
    pub fn is_active(self) -> bool {
        matches!(self, SyncState::Pending | SyncState::InProgress | SyncState::DeletePending)
    }
}

/// What the sync engine needs from a remote directory node: enumerate its
/// CID set (optionally expanded by a routing-search query, §4.8 step 1)
/// and pull individual records by CID.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Enumerate CIDs on the remote. An empty `filter` means "all";
    /// otherwise the remote is expected to intersect its set with `filter`.
    async fn list_cids(&self, filter: &[String]) -> std::result::Result<Vec<String>, String>;

    /// Stream-pull a single record's canonical bytes by CID.
    async fn pull(&self, cid: &str) -> std::result::Result<Vec<u8>, String>;
}

/// Resolves a `remote_url` (§6 `CreateSync`) into a live [`RemoteDirectory`]
/// handle.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, remote_url: &str) -> std::result::Result<Arc<dyn RemoteDirectory>, String>;
}
