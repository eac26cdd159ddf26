//! GossipSub announcement wire format (§4.6).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementOp {
    Announce,
    Withdraw,
}

/// A compact label announcement/withdrawal. No record payload travels
/// over gossip (§4.6 "small-message regime").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Announcement {
    pub peer_id: String,
    pub op: AnnouncementOp,
    pub cid: String,
    pub labels: Vec<String>,
    pub record_count_hint: u32,
    pub ts: i64,
}

impl Announcement {
    /// Dedup key for the receiver-side delivery contract (§4.6
    /// "a receiver deduplicates by (peer, cid, ts)").
    pub fn dedup_key(&self) -> (String, String, i64) {
        (self.peer_id.clone(), self.cid.clone(), self.ts)
    }

    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Announcement, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let a = Announcement {
            peer_id: "peer-a".into(),
            op: AnnouncementOp::Announce,
            cid: "bafabc".into(),
            labels: vec!["/skills/nlp".into()],
            record_count_hint: 1,
            ts: 1000,
        };
        let bytes = a.encode().unwrap();
        let back = Announcement::decode(&bytes).unwrap();
        assert_eq!(back.dedup_key(), a.dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_ts() {
        let base = Announcement {
            peer_id: "p".into(),
            op: AnnouncementOp::Withdraw,
            cid: "c".into(),
            labels: vec![],
            record_count_hint: 0,
            ts: 1,
        };
        let mut later = base.clone();
        later.ts = 2;
        assert_ne!(base.dedup_key(), later.dedup_key());
    }
}
