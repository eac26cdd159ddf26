//! dirnode-sign: sign and verify records via ephemeral signature/public-key
//! referrers (C9, §4.9).

pub mod authority;
pub mod controller;
pub mod error;
pub mod payload;

pub use authority::{verify_signature, Ed25519KeyAuthority, NullOidcAuthority, SignedPayload, SigningAuthority};
pub use controller::{SignController, SignProvider, VerifyResult};
pub use error::{Result, SignError};
pub use payload::canonical_payload_bytes;
