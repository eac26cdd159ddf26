//! C5 DHT provider layer (§4.5): announces this node as a provider of every
//! label behind a locally-published CID, re-announcing at ~TTL/2 while the
//! publication stays live, and answers `FindProviders` lookups coalesced
//! with the [`crate::remote_cache::RemoteCache`].
//!
//! The swarm itself is driven by [`crate::swarm::run`]; this module only
//! ever talks to it through the `mpsc` command channel, per §5's
//! "no per-connection thread" / single-task-owns-the-swarm model.

use crate::error::{Result, RoutingError};
use crate::remote_cache::{RemoteCache, Source};
use crate::swarm::SwarmCommand;
use libp2p::kad::RecordKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Provider record TTL (§3 "Provider record (DHT)"): ~1 hour.
pub const PROVIDER_TTL: Duration = Duration::from_secs(3600);

/// Default deadline for a DHT lookup (§5 "Timeouts").
pub const DHT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracks which labels this node currently provides, so the re-announce
/// loop knows what to keep alive. Re-announcing stops the moment a label
/// is unpublished; per §4.5 this is the only action taken on unpublish —
/// no attempt is made to actively evict the record from remote DHT peers
/// (eventual expiry).
pub struct ProviderLayer {
    commands: mpsc::Sender<SwarmCommand>,
    published: Mutex<HashMap<String, Instant>>,
    remote_cache: Arc<RemoteCache>,
}

impl ProviderLayer {
    pub fn new(commands: mpsc::Sender<SwarmCommand>, remote_cache: Arc<RemoteCache>) -> Self {
        ProviderLayer {
            commands,
            published: Mutex::new(HashMap::new()),
            remote_cache,
        }
    }

    fn key_for(label: &str) -> RecordKey {
        RecordKey::new(&label.as_bytes())
    }

    /// Start (re-)providing `label` and remember it for the re-announce
    /// sweep.
    pub async fn announce(&self, label: &str) -> Result<()> {
        self.published.lock().insert(label.to_string(), Instant::now());
        self.commands
            .send(SwarmCommand::StartProviding(Self::key_for(label)))
            .await
            .map_err(|_| RoutingError::Overlay("swarm command channel closed".into()))
    }

    /// Stop providing `label`. Does not force remote expiry (§4.5).
    pub async fn withdraw(&self, label: &str) -> Result<()> {
        self.published.lock().remove(label);
        self.commands
            .send(SwarmCommand::StopProviding(Self::key_for(label)))
            .await
            .map_err(|_| RoutingError::Overlay("swarm command channel closed".into()))
    }

    /// `FindProviders(label, limit)` (§4.5): queries the DHT and merges the
    /// result with fresh locally-cached observations for the same label,
    /// deduplicated by peer-id.
    pub async fn find_providers(&self, label: &str, limit: usize) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SwarmCommand::GetProviders { key: Self::key_for(label), reply: reply_tx })
            .await
            .map_err(|_| RoutingError::Overlay("swarm command channel closed".into()))?;

        let dht_peers = match tokio::time::timeout(DHT_LOOKUP_TIMEOUT, reply_rx).await {
            Ok(Ok(peers)) => peers.into_iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            Ok(Err(_)) => {
                warn!(%label, "DHT lookup reply channel dropped");
                Vec::new()
            }
            Err(_) => return Err(RoutingError::Timeout(DHT_LOOKUP_TIMEOUT)),
        };

        for peer in &dht_peers {
            self.remote_cache.observe(peer, None, vec![label.to_string()], Source::Dht);
        }

        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut out = Vec::new();
        for peer in dht_peers {
            if seen.insert(peer.clone()) {
                out.push(peer);
            }
        }
        for entry in self.remote_cache.fresh_entries() {
            if entry.labels.iter().any(|l| l == label) && seen.insert(entry.peer_id.clone()) {
                out.push(entry.peer_id);
            }
        }
        out.truncate(limit.max(1));
        Ok(out)
    }

    /// Re-announce every still-published label at ~TTL/2 (§4.5). Intended
    /// to be driven by a `tokio::time::interval` in the owning task; one
    /// call performs one sweep.
    pub async fn reannounce_sweep(&self) {
        let labels: Vec<String> = {
            let published = self.published.lock();
            published.keys().cloned().collect()
        };
        for label in labels {
            if let Err(e) = self
                .commands
                .send(SwarmCommand::StartProviding(Self::key_for(&label)))
                .await
            {
                debug!("re-announce send failed, swarm task likely gone: {e}");
                break;
            }
        }
    }

    pub fn published_label_count(&self) -> usize {
        self.published.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::SwarmCommand;

    fn layer() -> (ProviderLayer, mpsc::Receiver<SwarmCommand>) {
        let (tx, rx) = mpsc::channel(16);
        let cache = Arc::new(RemoteCache::new(8, PROVIDER_TTL));
        (ProviderLayer::new(tx, cache), rx)
    }

    #[tokio::test]
    async fn test_announce_tracks_label_and_sends_command() {
        let (layer, mut rx) = layer();
        layer.announce("/skills/nlp").await.unwrap();
        assert_eq!(layer.published_label_count(), 1);
        assert!(matches!(rx.recv().await, Some(SwarmCommand::StartProviding(_))));
    }

    #[tokio::test]
    async fn test_withdraw_stops_tracking() {
        let (layer, mut rx) = layer();
        layer.announce("/skills/nlp").await.unwrap();
        let _ = rx.recv().await;
        layer.withdraw("/skills/nlp").await.unwrap();
        assert_eq!(layer.published_label_count(), 0);
        assert!(matches!(rx.recv().await, Some(SwarmCommand::StopProviding(_))));
    }

    #[tokio::test]
    async fn test_reannounce_sweep_resends_start_providing_per_label() {
        let (layer, mut rx) = layer();
        layer.announce("/skills/nlp").await.unwrap();
        let _ = rx.recv().await; // drain the initial announce command
        layer.reannounce_sweep().await;
        assert!(matches!(rx.recv().await, Some(SwarmCommand::StartProviding(_))));
    }

    #[tokio::test]
    async fn test_find_providers_times_out_when_swarm_never_replies() {
        let (tx, _rx) = mpsc::channel(16);
        let cache = Arc::new(RemoteCache::new(8, PROVIDER_TTL));
        let layer = ProviderLayer::new(tx, cache);
        // _rx is held but never drained/replied to, forcing the await in
        // find_providers to time out rather than hang forever; we can't
        // wait 30s in a unit test, so this only asserts the call doesn't
        // panic when the channel closes instead: drop `_rx` to simulate a
        // dead swarm task.
        drop(_rx);
        let err = layer.find_providers("/skills/nlp", 10).await;
        assert!(err.is_err());
    }
}
