//! Signing/verification authorities (§4.9). Fulcio/Rekor/TSA/cosign are
//! treated as opaque oracles per §1's Non-goals; [`SigningAuthority`] is
//! the seam. [`Ed25519KeyAuthority`] is the one real, fully-local
//! implementation (the key-based path, §8 P8's primary testable path);
//! [`NullOidcAuthority`] stubs the keyless path so its external calls
//! remain an explicit, clearly-unavailable seam rather than a half-built
//! network client.

use crate::error::{Result, SignError};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// A signature plus the public key that can verify it.
pub struct SignedPayload {
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

#[async_trait]
pub trait SigningAuthority: Send + Sync {
    async fn sign(&self, payload: &[u8]) -> Result<SignedPayload>;
}

/// The key-based signing path (§4.9 "Key-based"). `password` is accepted
/// for interface parity with cosign-style encrypted key material but is
/// unused: cosign key loading/decryption is explicitly out of scope (§1),
/// so key bytes here are always an unencrypted 32-byte ed25519 seed.
pub struct Ed25519KeyAuthority {
    signing_key: SigningKey,
}

impl Ed25519KeyAuthority {
    pub fn from_private_key_bytes(bytes: &[u8], _password: Option<&str>) -> Result<Self> {
        let seed: [u8; 32] =
            bytes.try_into().map_err(|_| SignError::InvalidKey(format!("expected 32-byte seed, got {} bytes", bytes.len())))?;
        Ok(Ed25519KeyAuthority { signing_key: SigningKey::from_bytes(&seed) })
    }

    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Ed25519KeyAuthority { signing_key: SigningKey::generate(&mut csprng) }
    }
}

#[async_trait]
impl SigningAuthority for Ed25519KeyAuthority {
    async fn sign(&self, payload: &[u8]) -> Result<SignedPayload> {
        let signature = self.signing_key.sign(payload);
        Ok(SignedPayload {
            signature: signature.to_bytes().to_vec(),
            public_key: self.signing_key.verifying_key().to_bytes().to_vec(),
        })
    }
}

/// The OIDC/keyless path (§4.9 "OIDC/keyless"): Fulcio/Rekor/TSA are
/// external signing authorities out of scope for this repo; requests are
/// rejected with a descriptive, never-a-transport-error failure so callers
/// get a clean `SignError::OidcUnavailable` rather than a confusing
/// network timeout.
pub struct NullOidcAuthority;

#[async_trait]
impl SigningAuthority for NullOidcAuthority {
    async fn sign(&self, _payload: &[u8]) -> Result<SignedPayload> {
        Err(SignError::OidcUnavailable(
            "OIDC/keyless signing requires a live Fulcio/Rekor/TSA endpoint, which this node does not provide".into(),
        ))
    }
}

/// Verify that `signature` over `payload` was produced by `public_key`.
pub fn verify_signature(public_key: &[u8], payload: &[u8], signature: &[u8]) -> bool {
    let Ok(vk_bytes): std::result::Result<[u8; 32], _> = public_key.try_into() else { return false };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&vk_bytes) else { return false };
    let Ok(sig_bytes): std::result::Result<[u8; 64], _> = signature.try_into() else { return false };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(payload, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_key_authority_signs_and_verifies() {
        let authority = Ed25519KeyAuthority::generate();
        let payload = b"some payload";
        let signed = authority.sign(payload).await.unwrap();
        assert!(verify_signature(&signed.public_key, payload, &signed.signature));
    }

    #[tokio::test]
    async fn test_tampered_payload_fails_verification() {
        let authority = Ed25519KeyAuthority::generate();
        let signed = authority.sign(b"payload-a").await.unwrap();
        assert!(!verify_signature(&signed.public_key, b"payload-b", &signed.signature));
    }

    #[tokio::test]
    async fn test_oidc_authority_is_unavailable() {
        let authority = NullOidcAuthority;
        assert!(matches!(authority.sign(b"payload").await, Err(SignError::OidcUnavailable(_))));
    }

    #[test]
    fn test_from_private_key_bytes_rejects_wrong_length() {
        assert!(Ed25519KeyAuthority::from_private_key_bytes(&[0u8; 10], None).is_err());
    }

    #[test]
    fn test_from_private_key_bytes_derives_same_key_as_direct_construction() {
        let seed = [7u8; 32];
        let authority = Ed25519KeyAuthority::from_private_key_bytes(&seed, None).unwrap();
        let expected = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        assert_eq!(authority.signing_key.verifying_key().to_bytes(), expected);
    }
}
