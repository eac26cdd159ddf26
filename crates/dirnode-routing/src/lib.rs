//! dirnode-routing: C4 local label index, C5 DHT provider layer, C6
//! GossipSub channel, and the C7 routing controller that orchestrates them
//! (§4.4-§4.7).
//!
//! # Modules
//!
//! - [`label_index`]: C4, the per-node persistent `label → set<cid>` index.
//! - [`swarm`]: the libp2p Kademlia + GossipSub overlay, driven by a single
//!   background task.
//! - [`provider_layer`]: C5, TTL-bounded provider announcements on top of
//!   the swarm's Kademlia behaviour.
//! - [`announcement`]: C6's compact gossip wire message.
//! - [`remote_cache`]: the striped, LRU-bounded cache of remote-provider
//!   observations shared by C5 and C6.
//! - [`controller`]: C7, `Publish`/`Unpublish`/`List`/`Search`.

pub mod announcement;
pub mod controller;
pub mod error;
pub mod label_index;
pub mod provider_layer;
pub mod remote_cache;
pub mod swarm;

pub use announcement::{Announcement, AnnouncementOp};
pub use controller::{Facet, ListEntry, RefOutcome, RoutingController, RoutingQuery, SearchHit};
pub use error::{Result, RoutingError};
pub use label_index::LocalLabelIndex;
pub use provider_layer::{ProviderLayer, DHT_LOOKUP_TIMEOUT, PROVIDER_TTL};
pub use remote_cache::{RemoteCache, RemoteCacheEntry, Source};
