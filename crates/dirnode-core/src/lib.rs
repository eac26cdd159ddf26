//! dirnode-core: record schema, canonical encoding, and content identifiers
//! for the agent directory protocol.
//!
//! # Modules
//!
//! - [`record`]: Schema-versioned record types (v0.3.1, v0.4.0, v0.5.0+) and
//!   their normalized view.
//! - [`label`]: Facet label derivation shared across schema variants.
//! - [`canonical`]: Deterministic JSON serialization used for hashing.
//! - [`cid`]: CIDv1/raw/SHA-256 content identifiers.
//! - [`codec`]: `Unmarshal`/`Marshal`/`CanonicalHash`/`ExtractLabels`.
//! - [`error`]: Error types.

pub mod canonical;
pub mod cid;
pub mod codec;
pub mod error;
pub mod label;
pub mod record;

pub use cid::Cid;
pub use error::{Error, Result};
pub use record::{Domain, Extension, Locator, Record, Skill};
