//! The C1 record codec contract (§4.1): `Unmarshal`, `Marshal`,
//! `CanonicalHash`, `ExtractLabels`.

use crate::canonical::canonical_bytes;
use crate::cid::Cid;
use crate::error::{Error, Result};
use crate::label::{extract_labels, Label};
use crate::record::{Record, RecordV031, RecordV040, RecordV05};
use std::collections::BTreeSet;

/// Parse `bytes` into a [`Record`], detecting the schema variant from the
/// top-level `schema_version` field only.
///
/// Returns [`Error::Invalid`] for malformed JSON or a `schema_version` that
/// isn't even a string, and [`Error::UnsupportedVersion`] for a
/// well-formed but unrecognized version.
pub fn unmarshal(bytes: &[u8]) -> Result<Record> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| Error::Invalid(e.to_string()))?;

    let schema_version = value
        .get("schema_version")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::MissingField("schema_version".into()))?
        .to_string();

    match variant_of(&schema_version) {
        Some(Variant::V031) => {
            let r: RecordV031 = serde_json::from_value(value).map_err(Error::from)?;
            Ok(Record::V031(r))
        }
        Some(Variant::V040) => {
            let r: RecordV040 = serde_json::from_value(value).map_err(Error::from)?;
            Ok(Record::V040(r))
        }
        Some(Variant::V05) => {
            let r: RecordV05 = serde_json::from_value(value).map_err(Error::from)?;
            Ok(Record::V05(r))
        }
        None => Err(Error::UnsupportedVersion(schema_version)),
    }
}

enum Variant {
    V031,
    V040,
    V05,
}

/// Map a `schema_version` string to one of the three recognized variants.
/// v0.3.1 is matched exactly; v0.4.x and v0.5.x-and-above are matched by
/// major/minor so a future v0.5.1/v0.6.0 point release needs no new match
/// arm here, only (if ever) a new variant struct.
fn variant_of(schema_version: &str) -> Option<Variant> {
    let trimmed = schema_version.strip_prefix('v').unwrap_or(schema_version);
    let mut parts = trimmed.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    let patch: u32 = parts.next().unwrap_or("0").parse().ok()?;

    match (major, minor, patch) {
        (0, 3, 1) => Some(Variant::V031),
        (0, 4, _) => Some(Variant::V040),
        (0, m, _) if m >= 5 => Some(Variant::V05),
        _ => None,
    }
}

/// Re-emit a record's canonical JSON: the inner variant's fields, sorted
/// keys, no whitespace, never a variant wrapper (I2).
pub fn marshal(record: &Record) -> Result<Vec<u8>> {
    canonical_bytes(record)
}

/// `CID = CIDv1(raw, SHA-256(Marshal(record)))` (I1, I3).
pub fn canonical_hash(record: &Record) -> Result<Cid> {
    let bytes = marshal(record)?;
    Ok(Cid::of(&bytes))
}

/// Enumerate the deterministic label set for a record (§3, P4).
pub fn extract_record_labels(record: &Record) -> BTreeSet<Label> {
    extract_labels(&record.normalize())
}
