//! CIDv1, raw codec (0x55), SHA-256 multihash content identifiers (§3 I3,
//! §6 "CID format on the wire", P9).
//!
//! `multibase` is retained from the workspace dependency set for the
//! base32-lowercase encoding step; the CID/multihash header bytes are
//! assembled by hand rather than pulled in from a `cid`/`multihash` crate,
//! since the header here is two fixed one-byte varints (version=1,
//! codec=0x55) plus a fixed-length multihash (sha2-256, 32-byte digest) —
//! not worth a dependency whose surface would otherwise go unused.

use multibase::Base;
use sha2::{Digest, Sha256};
use std::fmt;

const CID_VERSION: u8 = 0x01;
const CODEC_RAW: u8 = 0x55;
const MULTIHASH_SHA2_256: u8 = 0x12;
const SHA256_DIGEST_LEN: u8 = 0x20;

/// A CIDv1/raw/SHA-256 content identifier, printed base32-lowercase with
/// the `baf…` prefix (§9 GLOSSARY).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cid {
    digest: [u8; 32],
}

impl Cid {
    /// Derive a CID from the SHA-256 digest of already-canonical bytes.
    pub fn of(canonical_bytes: &[u8]) -> Cid {
        let digest: [u8; 32] = Sha256::digest(canonical_bytes).into();
        Cid { digest }
    }

    /// The raw SHA-256 digest backing this CID.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// The multibase-encoded binary form: `version || codec || multihash`.
    fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.digest.len());
        out.push(CID_VERSION);
        out.push(CODEC_RAW);
        out.push(MULTIHASH_SHA2_256);
        out.push(SHA256_DIGEST_LEN);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parse a `baf…` string back into a `Cid`, validating the codec and
    /// multihash function match what this node emits.
    pub fn parse(s: &str) -> Result<Cid, CidParseError> {
        let (base, bytes) = multibase::decode(s).map_err(|e| CidParseError(e.to_string()))?;
        if base != Base::Base32Lower {
            return Err(CidParseError(format!("unexpected multibase: {base:?}")));
        }
        if bytes.len() != 4 + 32 {
            return Err(CidParseError(format!("unexpected length: {}", bytes.len())));
        }
        if bytes[0] != CID_VERSION {
            return Err(CidParseError(format!("unsupported CID version: {}", bytes[0])));
        }
        if bytes[1] != CODEC_RAW {
            return Err(CidParseError(format!("unsupported codec: 0x{:02x}", bytes[1])));
        }
        if bytes[2] != MULTIHASH_SHA2_256 {
            return Err(CidParseError(format!(
                "unsupported multihash function: 0x{:02x}",
                bytes[2]
            )));
        }
        if bytes[3] != SHA256_DIGEST_LEN {
            return Err(CidParseError(format!("unexpected digest length: {}", bytes[3])));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[4..]);
        Ok(Cid { digest })
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", multibase::encode(Base::Base32Lower, self.bytes()))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self)
    }
}

impl serde::Serialize for Cid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Cid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Cid::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Failure decoding a `baf…` string as a CIDv1/raw/SHA-256 identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CID: {0}")]
pub struct CidParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_has_baf_prefix() {
        let cid = Cid::of(b"{}");
        assert!(cid.to_string().starts_with("baf"));
    }

    #[test]
    fn test_cid_deterministic() {
        let a = Cid::of(b"hello world");
        let b = Cid::of(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_cid_differs_on_different_input() {
        let a = Cid::of(b"hello");
        let b = Cid::of(b"world");
        assert_ne!(a, b);
    }

    #[test]
    fn test_cid_round_trip_through_string() {
        let cid = Cid::of(b"some canonical bytes");
        let s = cid.to_string();
        let parsed = Cid::parse(&s).unwrap();
        assert_eq!(cid, parsed);
    }

    #[test]
    fn test_cid_parse_rejects_garbage() {
        assert!(Cid::parse("not-a-cid").is_err());
    }
}
