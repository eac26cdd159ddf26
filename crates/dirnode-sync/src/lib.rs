//! dirnode-sync: the C8 sync engine (§4.8) — pulls a filtered CID set from
//! a remote directory node into the local store, incrementally and
//! resumably.
//!
//! # Modules
//!
//! - [`types`]: `SyncObject`/`SyncState` and the `RemoteDirectory`/
//!   `RemoteConnector` seam sync pulls through.
//! - [`sync_store`]: sled-backed persistence for sync rows and their
//!   progress cursor.
//! - [`engine`]: the scheduler state machine.

pub mod engine;
pub mod error;
pub mod sync_store;
pub mod types;

pub use engine::{SyncEngine, DEFAULT_MAX_CONCURRENT_PULLS};
pub use error::{Result, SyncError};
pub use sync_store::SyncStore;
pub use types::{RemoteConnector, RemoteDirectory, SyncObject, SyncState};
