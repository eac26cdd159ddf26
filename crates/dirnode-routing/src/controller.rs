//! C7 routing controller (§4.7): orchestrates C4 (local label index), C5
//! (DHT provider layer), and C6 (GossipSub channel), and serves the
//! `Publish`/`Unpublish`/`List`/`Search` operations described there.

use crate::announcement::{Announcement, AnnouncementOp};
use crate::error::{Result, RoutingError};
use crate::label_index::LocalLabelIndex;
use crate::provider_layer::ProviderLayer;
use crate::remote_cache::RemoteCache;
use crate::swarm::SwarmCommand;
use dirnode_core::Cid;
use dirnode_store::{BlobStore, RecordRef};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A routing query type, `queries[]` entries for `List`/`Search` (§6
/// `RoutingService`). `Feature` is accepted as an input alias for `Module`
/// (§3 label.rs note: the extension/module facet is always emitted as
/// `/modules/...`, never `/features/...`, so matching against it is the
/// only sensible behavior for a `FEATURE` query).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facet {
    Skill,
    Locator,
    Module,
    Domain,
    Feature,
}

impl Facet {
    fn path(self) -> &'static str {
        match self {
            Facet::Skill => "skills",
            Facet::Locator => "locators",
            Facet::Module | Facet::Feature => "modules",
            Facet::Domain => "domains",
        }
    }
}

/// One `(facet, value)` routing predicate.
#[derive(Clone, Debug)]
pub struct RoutingQuery {
    pub facet: Facet,
    pub value: String,
}

impl RoutingQuery {
    pub fn new(facet: Facet, value: impl Into<String>) -> RoutingQuery {
        RoutingQuery { facet, value: value.into() }
    }

    fn label(&self) -> String {
        format!("/{}/{}", self.facet.path(), self.value)
    }
}

/// Result of `List`: `{record_ref, labels[]}` (§6 `ListResponse`).
#[derive(Clone, Debug)]
pub struct ListEntry {
    pub cid: String,
    pub labels: Vec<String>,
}

/// Result of `Search`: `{record_ref, peer, labels[], matched_queries[], score}`.
#[derive(Clone, Debug)]
pub struct SearchHit {
    pub peer: String,
    pub cid: Option<String>,
    pub labels: Vec<String>,
    pub matched_queries: Vec<String>,
    pub score: usize,
}

/// Per-ref outcome of a batch `Publish`/`Unpublish` call — failures are
/// surfaced per item, never abort the whole batch (§4.7).
#[derive(Debug)]
pub struct RefOutcome {
    pub cid: String,
    pub result: std::result::Result<(), String>,
}

pub struct RoutingController {
    store: Arc<BlobStore>,
    label_index: Arc<LocalLabelIndex>,
    provider_layer: Arc<ProviderLayer>,
    remote_cache: Arc<RemoteCache>,
    swarm_commands: mpsc::Sender<SwarmCommand>,
    local_peer_id: String,
}

impl RoutingController {
    pub fn new(
        store: Arc<BlobStore>,
        label_index: Arc<LocalLabelIndex>,
        provider_layer: Arc<ProviderLayer>,
        remote_cache: Arc<RemoteCache>,
        swarm_commands: mpsc::Sender<SwarmCommand>,
        local_peer_id: impl Into<String>,
    ) -> Self {
        RoutingController {
            store,
            label_index,
            provider_layer,
            remote_cache,
            swarm_commands,
            local_peer_id: local_peer_id.into(),
        }
    }

    /// `Publish(record_refs[])` (§4.7): reads each record via C2, computes
    /// labels, writes C4, fans out provider announcements to C5, and
    /// broadcasts an `ANNOUNCE` over C6.
    pub async fn publish(&self, record_refs: &[RecordRef]) -> Vec<RefOutcome> {
        let mut out = Vec::with_capacity(record_refs.len());
        for record_ref in record_refs {
            let cid_s = record_ref.cid.to_string();
            let result = self.publish_one(record_ref).await;
            out.push(RefOutcome { cid: cid_s, result: result.map_err(|e| e.to_string()) });
        }
        out
    }

    async fn publish_one(&self, record_ref: &RecordRef) -> Result<()> {
        let record = self
            .store
            .get_record(record_ref)
            .await
            .map_err(|_| RoutingError::RefNotFound(record_ref.cid.to_string()))?;
        let labels = dirnode_core::codec::extract_record_labels(&record);
        let label_strs: std::collections::BTreeSet<String> =
            labels.iter().map(|l| l.as_str().to_string()).collect();

        self.label_index.publish(&record_ref.cid, &label_strs)?;

        for label in &label_strs {
            self.provider_layer.announce(label).await?;
        }

        self.broadcast(AnnouncementOp::Announce, &record_ref.cid, &label_strs).await;
        Ok(())
    }

    /// `Unpublish(record_refs[])` (§4.7): mirror of `Publish`.
    pub async fn unpublish(&self, record_refs: &[RecordRef]) -> Vec<RefOutcome> {
        let mut out = Vec::with_capacity(record_refs.len());
        for record_ref in record_refs {
            let cid_s = record_ref.cid.to_string();
            let result = self.unpublish_one(record_ref).await;
            out.push(RefOutcome { cid: cid_s, result: result.map_err(|e| e.to_string()) });
        }
        out
    }

    async fn unpublish_one(&self, record_ref: &RecordRef) -> Result<()> {
        let cid_s = record_ref.cid.to_string();
        let labels = self.label_index.lookup_cid(&cid_s).unwrap_or_default();
        self.label_index.unpublish(&record_ref.cid)?;
        for label in &labels {
            self.provider_layer.withdraw(label).await?;
        }
        self.broadcast(AnnouncementOp::Withdraw, &record_ref.cid, &labels).await;
        Ok(())
    }

    async fn broadcast(&self, op: AnnouncementOp, cid: &Cid, labels: &std::collections::BTreeSet<String>) {
        let announcement = Announcement {
            peer_id: self.local_peer_id.clone(),
            op,
            cid: cid.to_string(),
            labels: labels.iter().cloned().collect(),
            record_count_hint: 1,
            ts: chrono::Utc::now().timestamp(),
        };
        match announcement.encode() {
            Ok(bytes) => {
                if self.swarm_commands.send(SwarmCommand::Publish(bytes)).await.is_err() {
                    warn!("swarm command channel closed, announcement dropped");
                }
            }
            Err(e) => debug!("failed to encode announcement: {e}"),
        }
    }

    /// `List(queries[], cid?, limit?)` (§4.7): local-only `AND` of
    /// per-facet predicates, or an exact CID lookup distinguishing "found"
    /// from "not found locally" (§4.4).
    pub fn list(&self, queries: &[RoutingQuery], cid: Option<&str>, limit: Option<usize>) -> Result<Vec<ListEntry>> {
        if let Some(cid) = cid {
            return Ok(match self.label_index.lookup_cid(cid) {
                Some(labels) => vec![ListEntry { cid: cid.to_string(), labels: labels.into_iter().collect() }],
                None => Vec::new(),
            });
        }

        let label_strs: Vec<String> = queries.iter().map(RoutingQuery::label).collect();
        let mut cids = self.label_index.list_local(&label_strs);
        cids.sort();
        if let Some(limit) = limit {
            cids.truncate(limit);
        }
        Ok(cids
            .into_iter()
            .map(|cid| {
                let labels = self.label_index.lookup_cid(&cid).unwrap_or_default();
                ListEntry { cid, labels: labels.into_iter().collect() }
            })
            .collect())
    }

    /// `Search(queries[], limit?, min_match_score?)` (§4.7): remote-oriented
    /// OR-with-threshold over the C5/C6 remote-cache (P6). `min_match_score
    /// = 0` is coerced to 1; empty `queries` is `ErrBadQuery`.
    pub fn search(
        &self,
        queries: &[RoutingQuery],
        limit: Option<usize>,
        min_match_score: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        if queries.is_empty() {
            return Err(RoutingError::EmptyQueries);
        }
        let threshold = min_match_score.unwrap_or(1).max(1);
        let query_labels: Vec<String> = queries.iter().map(RoutingQuery::label).collect();

        let mut hits: Vec<SearchHit> = self
            .remote_cache
            .fresh_entries()
            .into_iter()
            .filter_map(|entry| {
                // Routing equality is case-insensitive while labels stay
                // case-preserving for display (§6).
                let entry_labels_lower: std::collections::HashSet<String> =
                    entry.labels.iter().map(|l| l.to_lowercase()).collect();
                let matched: Vec<String> = query_labels
                    .iter()
                    .filter(|l| entry_labels_lower.contains(&l.to_lowercase()))
                    .cloned()
                    .collect();
                if matched.len() >= threshold {
                    Some(SearchHit {
                        peer: entry.peer_id,
                        cid: entry.cid,
                        labels: entry.labels,
                        score: matched.len(),
                        matched_queries: matched,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score));
        if let Some(limit) = limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_cache::Source;
    use dirnode_store::SledBackend;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn controller() -> (RoutingController, tempfile::TempDir, tempfile::TempDir, mpsc::Receiver<SwarmCommand>) {
        let store_dir = tempdir().unwrap();
        let label_dir = tempdir().unwrap();
        let backend = Arc::new(SledBackend::open(store_dir.path()).unwrap());
        let store = Arc::new(BlobStore::new(backend));
        let label_index = Arc::new(LocalLabelIndex::open(label_dir.path()).unwrap());
        let remote_cache = Arc::new(RemoteCache::new(16, Duration::from_secs(3600)));
        let (tx, rx) = mpsc::channel(64);
        let provider_layer = Arc::new(ProviderLayer::new(tx.clone(), remote_cache.clone()));
        let controller =
            RoutingController::new(store.clone(), label_index, provider_layer, remote_cache, tx, "local-peer");
        (controller, store_dir, label_dir, rx)
    }

    const SAMPLE: &[u8] =
        br#"{"schema_version":"v0.5.0","name":"x","version":"1.0.0","skills":[{"category_name":"nlp","class_name":"tc"}]}"#;

    #[tokio::test]
    async fn test_publish_then_list_local_linearizability_p5() {
        let (controller, _s, _l, mut rx) = controller().await;
        let record_ref = controller.store.put(SAMPLE).await.unwrap();

        let outcomes = controller.publish(&[record_ref.clone()]).await;
        assert!(outcomes[0].result.is_ok());
        while rx.try_recv().is_ok() {}

        let found = controller.list(&[], Some(&record_ref.cid.to_string()), None).unwrap();
        assert_eq!(found.len(), 1);

        let by_skill = controller
            .list(&[RoutingQuery::new(Facet::Skill, "nlp/tc")], None, None)
            .unwrap();
        assert_eq!(by_skill.len(), 1);

        let by_other = controller
            .list(&[RoutingQuery::new(Facet::Skill, "vision/x")], None, None)
            .unwrap();
        assert!(by_other.is_empty());
    }

    #[tokio::test]
    async fn test_unpublish_removes_from_list_p5() {
        let (controller, _s, _l, _rx) = controller().await;
        let record_ref = controller.store.put(SAMPLE).await.unwrap();
        controller.publish(&[record_ref.clone()]).await;

        let outcomes = controller.unpublish(&[record_ref.clone()]).await;
        assert!(outcomes[0].result.is_ok());

        let found = controller.list(&[], Some(&record_ref.cid.to_string()), None).unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_publish_missing_ref_surfaces_per_item_failure() {
        let (controller, _s, _l, _rx) = controller().await;
        let missing = RecordRef { cid: Cid::of(b"never-pushed") };
        let outcomes = controller.publish(&[missing]).await;
        assert!(outcomes[0].result.is_err());
    }

    #[tokio::test]
    async fn test_search_or_threshold_p6() {
        let (controller, _s, _l, _rx) = controller().await;
        controller.remote_cache.observe(
            "peer-a",
            Some("bafcid".into()),
            vec!["/skills/nlp/tc".into(), "/skills/nlp/ps".into()],
            Source::Gossip,
        );

        let queries = vec![
            RoutingQuery::new(Facet::Skill, "nlp/tc"),
            RoutingQuery::new(Facet::Skill, "nlp/ps"),
            RoutingQuery::new(Facet::Skill, "nope"),
        ];
        let at_2 = controller.search(&queries, None, Some(2)).unwrap();
        assert_eq!(at_2.len(), 1);
        assert_eq!(at_2[0].score, 2);

        let at_3 = controller.search(&queries, None, Some(3)).unwrap();
        assert!(at_3.is_empty());
    }

    #[tokio::test]
    async fn test_search_min_score_zero_coerced_to_one() {
        let (controller, _s, _l, _rx) = controller().await;
        controller.remote_cache.observe("peer-a", None, vec!["/skills/nlp/tc".into()], Source::Dht);
        let hits = controller
            .search(&[RoutingQuery::new(Facet::Skill, "nlp/tc")], None, Some(0))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_case_insensitively() {
        let (controller, _s, _l, _rx) = controller().await;
        controller.remote_cache.observe("peer-a", None, vec!["/skills/NLP".into()], Source::Dht);
        let hits = controller
            .search(&[RoutingQuery::new(Facet::Skill, "nlp")], None, None)
            .unwrap();
        assert_eq!(hits.len(), 1);
        // Display preserves the remote's original case.
        assert_eq!(hits[0].labels, vec!["/skills/NLP".to_string()]);
    }

    #[tokio::test]
    async fn test_list_matches_case_insensitively() {
        let (controller, _s, _l, mut rx) = controller().await;
        let record_ref = controller.store.put(SAMPLE).await.unwrap();
        controller.publish(&[record_ref.clone()]).await;
        while rx.try_recv().is_ok() {}

        let found = controller
            .list(&[RoutingQuery::new(Facet::Skill, "NLP/TC")], None, None)
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_search_empty_queries_is_bad_query() {
        let (controller, _s, _l, _rx) = controller().await;
        assert!(matches!(controller.search(&[], None, None), Err(RoutingError::EmptyQueries)));
    }
}
