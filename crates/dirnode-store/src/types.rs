//! Shared request/response types for the blob store contract (§4.2, §6
//! `StoreService`).

use dirnode_core::Cid;
use serde::{Deserialize, Serialize};

/// `{cid}`. Identity of a stored record (§3 "RecordRef").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub cid: Cid,
}

impl From<Cid> for RecordRef {
    fn from(cid: Cid) -> Self {
        RecordRef { cid }
    }
}

/// `Head` response: object metadata without the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub cid: Cid,
    pub size: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub referrer_types: Vec<String>,
}

/// `{type, data, media_type}` attached to a record's CID (§3 "Referrer").
/// Two predefined `type`s are used by the sign controller: `signature` and
/// `public-key`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Referrer {
    #[serde(rename = "type")]
    pub type_: String,
    pub data: Vec<u8>,
    pub media_type: String,
}

pub const REFERRER_TYPE_SIGNATURE: &str = "signature";
pub const REFERRER_TYPE_PUBLIC_KEY: &str = "public-key";
