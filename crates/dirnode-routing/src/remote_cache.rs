//! Remote-provider cache shared by C5 (DHT lookups) and C6 (gossip
//! observations) (§4.5, §4.6).
//!
//! Bounded and LRU-evicting, striped by peer-id so lookups/inserts for
//! different peers never contend on the same lock (§5 "C5's remote-cache
//! uses a striped lock keyed on peer-id"). Each stripe's LRU is itself
//! keyed by `(peer_id, cid)` (§3 "Remote-cache entry", §4.5 "also keyed by
//! CID"), so a peer observed providing several distinct CIDs keeps one
//! entry per CID instead of the latest overwriting the rest. Entries with
//! no cid (a DHT `FindProviders` hit only says a peer provides a *label*,
//! not which cid) share one peer-level slot keyed by an empty cid.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

const STRIPES: usize = 16;

/// How the entry was learned (§3 "Remote-cache entry").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Dht,
    Gossip,
}

#[derive(Clone, Debug)]
pub struct RemoteCacheEntry {
    pub peer_id: String,
    pub cid: Option<String>,
    pub labels: Vec<String>,
    pub observed_at: Instant,
    pub source: Source,
}

impl RemoteCacheEntry {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.observed_at.elapsed() < ttl
    }
}

/// `(peer_id, cid)`; cid is an empty string for peer-level (cid-less)
/// observations.
type EntryKey = (String, String);

struct Stripe {
    by_key: LruCache<EntryKey, RemoteCacheEntry>,
}

/// A striped, TTL-bounded cache of remote-provider observations.
pub struct RemoteCache {
    stripes: Vec<Mutex<Stripe>>,
    ttl: Duration,
}

impl RemoteCache {
    pub fn new(capacity_per_stripe: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity_per_stripe.max(1)).unwrap();
        let stripes = (0..STRIPES)
            .map(|_| Mutex::new(Stripe { by_key: LruCache::new(cap) }))
            .collect();
        RemoteCache { stripes, ttl }
    }

    fn stripe_for(&self, peer_id: &str) -> &Mutex<Stripe> {
        let idx = (seahash(peer_id) as usize) % self.stripes.len();
        &self.stripes[idx]
    }

    /// Record an observed `(peer, cid?, labels)`, tracked by source (§4.5,
    /// §4.6). A later observation for the same `(peer, cid)` overwrites the
    /// previous one in that stripe's LRU slot; distinct CIDs from the same
    /// peer occupy distinct slots and coexist.
    pub fn observe(&self, peer_id: &str, cid: Option<String>, labels: Vec<String>, source: Source) {
        let mut stripe = self.stripe_for(peer_id).lock();
        let key = (peer_id.to_string(), cid.clone().unwrap_or_default());
        stripe.by_key.put(
            key,
            RemoteCacheEntry {
                peer_id: peer_id.to_string(),
                cid,
                labels,
                observed_at: Instant::now(),
                source,
            },
        );
    }

    /// Drop a `(peer, cid)` observation immediately rather than waiting for
    /// its TTL to lapse (§4.6 "withdrawals mark entries stale, evicted on
    /// next sweep") — a withdrawal is not itself a fresh observation, so it
    /// must not refresh `observed_at` the way [`Self::observe`] does.
    pub fn mark_stale(&self, peer_id: &str, cid: Option<String>) {
        let mut stripe = self.stripe_for(peer_id).lock();
        let key = (peer_id.to_string(), cid.unwrap_or_default());
        stripe.by_key.pop(&key);
    }

    /// All fresh entries across every stripe (§9 open question (a): a
    /// gossip-fresh entry whose DHT TTL just lapsed is still included).
    pub fn fresh_entries(&self) -> Vec<RemoteCacheEntry> {
        let mut out = Vec::new();
        for stripe in &self.stripes {
            let mut s = stripe.lock();
            for (_, entry) in s.by_key.iter() {
                if entry.is_fresh(self.ttl) {
                    out.push(entry.clone());
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.stripes.iter().map(|s| s.lock().by_key.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A small non-cryptographic string hash, good enough to spread peer-ids
/// across cache stripes.
fn seahash(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_fresh_entries() {
        let cache = RemoteCache::new(8, Duration::from_secs(3600));
        cache.observe("peer-a", Some("cid-1".into()), vec!["/skills/nlp".into()], Source::Dht);
        let entries = cache.fresh_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].peer_id, "peer-a");
    }

    #[test]
    fn test_distinct_cids_from_same_peer_coexist() {
        let cache = RemoteCache::new(8, Duration::from_secs(3600));
        cache.observe("peer-a", Some("cid-1".into()), vec!["/skills/nlp".into()], Source::Gossip);
        cache.observe("peer-a", Some("cid-2".into()), vec!["/skills/vision".into()], Source::Gossip);
        let mut cids: Vec<Option<String>> = cache.fresh_entries().into_iter().map(|e| e.cid).collect();
        cids.sort();
        assert_eq!(cids, vec![Some("cid-1".to_string()), Some("cid-2".to_string())]);
    }

    #[test]
    fn test_same_peer_cid_pair_overwrites_in_place() {
        let cache = RemoteCache::new(8, Duration::from_secs(3600));
        cache.observe("peer-a", Some("cid-1".into()), vec!["/skills/nlp".into()], Source::Dht);
        cache.observe("peer-a", Some("cid-1".into()), vec!["/skills/nlp/v2".into()], Source::Gossip);
        let entries = cache.fresh_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].labels, vec!["/skills/nlp/v2".to_string()]);
    }

    #[test]
    fn test_mark_stale_evicts_immediately() {
        let cache = RemoteCache::new(8, Duration::from_secs(3600));
        cache.observe("peer-a", Some("cid-1".into()), vec!["/skills/nlp".into()], Source::Gossip);
        assert_eq!(cache.fresh_entries().len(), 1);
        cache.mark_stale("peer-a", Some("cid-1".into()));
        assert!(cache.fresh_entries().is_empty());
    }

    #[test]
    fn test_stale_entries_excluded() {
        let cache = RemoteCache::new(8, Duration::from_millis(1));
        cache.observe("peer-a", None, vec![], Source::Gossip);
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.fresh_entries().is_empty());
    }

    #[test]
    fn test_lru_eviction_bounds_cache_size() {
        let cache = RemoteCache::new(1, Duration::from_secs(3600));
        // Force everything into one stripe by using the same peer-id
        // prefix pattern is not guaranteed; instead verify global bound
        // holds for a single stripe's worth of distinct keys.
        for i in 0..1000 {
            cache.observe(&format!("peer-{i}"), None, vec![], Source::Dht);
        }
        assert!(cache.len() <= 16); // capacity_per_stripe(1) * STRIPES(16)
    }
}
