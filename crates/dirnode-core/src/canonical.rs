//! Canonical JSON encoding (§3 invariant I1/I2).
//!
//! `serde_json`'s default `Value::Object` is backed by a `BTreeMap` (the
//! `preserve_order` feature is not enabled anywhere in this workspace), so
//! round-tripping a value through `serde_json::Value` and re-serializing it
//! already yields lexicographically sorted keys with no insignificant
//! whitespace. That is the entire canonicalization step; no custom sorter
//! is needed.

use crate::error::{Error, Result};
use serde::Serialize;

/// Serialize a value to its canonical JSON bytes: parse → re-emit with
/// sorted keys, no whitespace, UTF-8.
///
/// This is the normative encoding for [`crate::codec::canonical_hash`] and
/// for `Marshal`.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let v = serde_json::to_value(value).map_err(Error::from)?;
    serde_json::to_vec(&v).map_err(Error::from)
}

/// Re-canonicalize raw JSON bytes without knowing their shape: parse to
/// `serde_json::Value` and re-emit. Used to check whether already-received
/// bytes were already canonical (round-trip law, §4.1).
pub fn canonicalize_bytes(raw: &[u8]) -> Result<Vec<u8>> {
    let v: serde_json::Value = serde_json::from_slice(raw).map_err(Error::from)?;
    serde_json::to_vec(&v).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_bytes_sorts_keys() {
        let raw = br#"{"b": 1, "a": 2, "c": {"z": 1, "y": 2}}"#;
        let canon = canonicalize_bytes(raw).unwrap();
        assert_eq!(canon, br#"{"a":2,"b":1,"c":{"y":2,"z":1}}"#);
    }

    #[test]
    fn test_canonical_bytes_deterministic() {
        let raw = br#"{"name":"x","schema_version":"v0.5.0","version":"1.0.0"}"#;
        let c1 = canonicalize_bytes(raw).unwrap();
        let c2 = canonicalize_bytes(raw).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_canonical_bytes_idempotent_on_already_canonical_input() {
        let canon = br#"{"a":1,"b":2}"#;
        let out = canonicalize_bytes(canon).unwrap();
        assert_eq!(out, canon);
    }

    proptest::proptest! {
        /// I1 holds regardless of the key order a peer happened to send:
        /// any permutation of the same key/value pairs canonicalizes to
        /// the same bytes.
        #[test]
        fn test_key_order_does_not_affect_canonical_bytes(
            perm in proptest::sample::subsequence(vec![0usize, 1, 2, 3], 4)
        ) {
            let entries = [("alpha", 1), ("beta", 2), ("gamma", 3), ("delta", 4)];
            let permuted: Vec<String> = perm
                .into_iter()
                .map(|i| format!(r#""{}":{}"#, entries[i].0, entries[i].1))
                .collect();
            let raw = format!("{{{}}}", permuted.join(","));
            let canon = canonicalize_bytes(raw.as_bytes()).unwrap();
            let expected = canonicalize_bytes(br#"{"alpha":1,"beta":2,"gamma":3,"delta":4}"#).unwrap();
            prop_assert_eq!(canon, expected);
        }
    }
}
