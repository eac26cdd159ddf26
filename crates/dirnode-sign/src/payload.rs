//! The canonical signing payload derived from a CID (§4.9 "Derives a
//! canonical *payload* `{critical:{image:{docker-manifest-digest:<digest(cid)>}}}`").

use dirnode_core::Cid;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct Image {
    #[serde(rename = "docker-manifest-digest")]
    docker_manifest_digest: String,
}

#[derive(Serialize)]
struct Critical {
    image: Image,
}

#[derive(Serialize)]
struct Payload {
    critical: Critical,
}

/// `sha256:<hex>` over the CID's string form — the `digest(cid)` referenced
/// by §4.9.
fn digest_of_cid(cid: &Cid) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(cid.to_string().as_bytes())))
}

/// The canonical bytes of the signing payload for `cid`. Canonicalized the
/// same way records are (sorted keys, no whitespace) so the payload a
/// verifier recomputes always matches byte-for-byte what was signed.
pub fn canonical_payload_bytes(cid: &Cid) -> Vec<u8> {
    let payload = Payload { critical: Critical { image: Image { docker_manifest_digest: digest_of_cid(cid) } } };
    dirnode_core::canonical::canonical_bytes(&payload).expect("payload serialization cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_deterministic_for_same_cid() {
        let cid = Cid::of(b"hello");
        assert_eq!(canonical_payload_bytes(&cid), canonical_payload_bytes(&cid));
    }

    #[test]
    fn test_payload_differs_across_cids() {
        let a = Cid::of(b"hello");
        let b = Cid::of(b"world");
        assert_ne!(canonical_payload_bytes(&a), canonical_payload_bytes(&b));
    }

    #[test]
    fn test_payload_shape() {
        let cid = Cid::of(b"hello");
        let s = String::from_utf8(canonical_payload_bytes(&cid)).unwrap();
        assert!(s.starts_with(r#"{"critical":{"image":{"docker-manifest-digest":"sha256:"#));
    }
}
