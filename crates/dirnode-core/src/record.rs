//! Schema-versioned record types (§3) and the normalized view downstream
//! components (labels, search, routing) operate on.
//!
//! Three schema variants are recognized by `schema_version`: v0.3.1
//! ("agent"), v0.4.0 ("agent-record"), v0.5.0+ ("record"). The codec
//! preserves the original variant on round-trip; everything past the codec
//! boundary works against [`NormalizedRecord`] so a single implementation of
//! the §3 label rules suffices (no per-variant branching downstream).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `{category_name?, class_name?, id?}`. Label key is
/// `category_name/class_name` when both are set, else `category_name` alone.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Skill {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
}

/// `{type, url}`. Label key is `type`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Locator {
    #[serde(rename = "type")]
    pub type_: String,
    pub url: String,
}

/// `{name, version}`. Spelled `extensions` in v0.3.1/v0.4.0 records and
/// `modules` from v0.5.0 onward; label key is `name/version`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Extension {
    pub name: String,
    pub version: String,
}

/// `{name}`. Present in v0.4.0 and v0.5.0+ only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Domain {
    pub name: String,
}

/// v0.3.1 ("agent") variant. No `domains` field; extensions are spelled
/// `extensions` on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecordV031 {
    pub schema_version: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skills: Vec<Skill>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locators: Vec<Locator>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extensions: Vec<Extension>,
}

/// v0.4.0 ("agent-record") variant. Adds `domains`; extensions remain
/// spelled `extensions` on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecordV040 {
    pub schema_version: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skills: Vec<Skill>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locators: Vec<Locator>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extensions: Vec<Extension>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub domains: Vec<Domain>,
}

/// v0.5.0+ ("record") variant. Extensions are spelled `modules` on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecordV05 {
    pub schema_version: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skills: Vec<Skill>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locators: Vec<Locator>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modules: Vec<Extension>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub domains: Vec<Domain>,
}

/// A record held as a tagged union over the three recognized schema
/// variants (§3). The codec always preserves the original variant on
/// round-trip; `Marshal` re-emits the inner variant, never a wrapper (I2).
///
/// `Record` deliberately has no derived `Deserialize` impl: which variant
/// struct to parse into is decided by reading `schema_version` first (see
/// [`crate::codec::unmarshal`]), not by trying each variant's shape in turn
/// — the three variants are structurally too similar (all-optional fields)
/// for untagged-enum shape-sniffing to dispatch correctly.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Record {
    V031(RecordV031),
    V040(RecordV040),
    V05(RecordV05),
}

impl Record {
    /// The `schema_version` string carried by the inner variant.
    pub fn schema_version(&self) -> &str {
        match self {
            Record::V031(r) => &r.schema_version,
            Record::V040(r) => &r.schema_version,
            Record::V05(r) => &r.schema_version,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Record::V031(r) => &r.name,
            Record::V040(r) => &r.name,
            Record::V05(r) => &r.name,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Record::V031(r) => r.version.as_deref(),
            Record::V040(r) => r.version.as_deref(),
            Record::V05(r) => r.version.as_deref(),
        }
    }

    pub fn skills(&self) -> &[Skill] {
        match self {
            Record::V031(r) => &r.skills,
            Record::V040(r) => &r.skills,
            Record::V05(r) => &r.skills,
        }
    }

    pub fn locators(&self) -> &[Locator] {
        match self {
            Record::V031(r) => &r.locators,
            Record::V040(r) => &r.locators,
            Record::V05(r) => &r.locators,
        }
    }

    /// The extension/module list, regardless of which wire field name the
    /// variant spells it with.
    pub fn extensions(&self) -> &[Extension] {
        match self {
            Record::V031(r) => &r.extensions,
            Record::V040(r) => &r.extensions,
            Record::V05(r) => &r.modules,
        }
    }

    pub fn domains(&self) -> &[Domain] {
        match self {
            Record::V031(_) => &[],
            Record::V040(r) => &r.domains,
            Record::V05(r) => &r.domains,
        }
    }

    /// Project this record into the variant-agnostic view the rest of the
    /// system operates on (§9 "variant polymorphism").
    pub fn normalize(&self) -> NormalizedRecord {
        NormalizedRecord {
            schema_version: self.schema_version().to_string(),
            name: self.name().to_string(),
            version: self.version().map(str::to_string),
            skills: self.skills().to_vec(),
            locators: self.locators().to_vec(),
            extensions: self.extensions().to_vec(),
            domains: self.domains().to_vec(),
        }
    }
}

/// Variant-agnostic view of a [`Record`] used by labels, search, and
/// routing so they never branch on schema variant directly.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    pub schema_version: String,
    pub name: String,
    pub version: Option<String>,
    pub skills: Vec<Skill>,
    pub locators: Vec<Locator>,
    pub extensions: Vec<Extension>,
    pub domains: Vec<Domain>,
}
