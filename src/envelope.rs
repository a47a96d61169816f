//! Envelope protection.
//!
//! A protected envelope carries two layers:
//! 1. The data key, serialized and sealed to the enclave identity.
//! 2. The payload, authenticated-encrypted under that data key.
//!
//! Protection seals the key before touching the payload, and both
//! directions fail closed: no partial envelope or plaintext is returned.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::{self, base64_bytes, base64_bytes_opt};
use crate::crypto::{self, AES_256_CBC_HMAC_SHA256, IV_LEN};
use crate::entropy::EntropySource;
use crate::error::{PolicyVaultError, Result};
use crate::keys::KeyMaterial;
use crate::seal::Sealer;

/// The at-rest form of protected data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedEnvelope {
    /// The sealed, serialized [`KeyMaterial`].
    #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<Vec<u8>>,
    /// The payload ciphertext.
    #[serde(default, with = "base64_bytes")]
    pub encrypted_data: Vec<u8>,
}

/// Protect `plaintext` for the enclave identity `platform`.
///
/// The serialized key is sealed under (`platform`, `label`); the plaintext
/// is encrypted under the key's secret with a fresh 16-byte IV. Returns the
/// serialized envelope.
pub fn protect(
    sealer: &dyn Sealer,
    entropy: &dyn EntropySource,
    platform: &str,
    label: &str,
    key: &KeyMaterial,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if key.key_type() != AES_256_CBC_HMAC_SHA256 {
        warn!(key_type = key.key_type(), "protect: wrong key type for authenticated encrypt");
        return Err(PolicyVaultError::UnsupportedAlgorithm(key.key_type().to_string()));
    }

    let mut iv = [0u8; IV_LEN];
    entropy.fill(&mut iv).inspect_err(|_| warn!("protect: can't generate iv"))?;

    let serialized_key = zeroize::Zeroizing::new(
        codec::to_bytes(key).inspect_err(|_| warn!("protect: can't serialize key"))?,
    );

    let sealed_key = sealer
        .seal(platform, label, &serialized_key)
        .inspect_err(|_| warn!(platform, "protect: seal failed"))?;

    let encrypted_data =
        crypto::authenticated_encrypt(key.key_type(), plaintext, key.secret_bytes(), &iv)
            .inspect_err(|_| warn!("protect: can't encrypt data"))?;

    let envelope = ProtectedEnvelope {
        encrypted_key: Some(sealed_key),
        encrypted_data,
    };
    codec::to_bytes(&envelope).inspect_err(|_| warn!("protect: can't serialize envelope"))
}

/// Reverse [`protect`]: returns the plaintext and the recovered data key.
///
/// Fails if the envelope is malformed or has no sealed key, if unsealing
/// fails (including an identity mismatch), if the recovered key is not
/// `aes-256-cbc-hmac-sha256`, or if the payload does not authenticate.
pub fn unprotect(
    sealer: &dyn Sealer,
    platform: &str,
    label: &str,
    envelope_bytes: &[u8],
) -> Result<(Vec<u8>, KeyMaterial)> {
    let envelope: ProtectedEnvelope = codec::from_bytes(envelope_bytes)
        .inspect_err(|_| warn!("unprotect: can't decode envelope"))?;

    let sealed_key = envelope.encrypted_key.as_deref().ok_or_else(|| {
        warn!("unprotect: envelope has no sealed key");
        PolicyVaultError::MissingSealedKey
    })?;

    let serialized_key = zeroize::Zeroizing::new(
        sealer
            .unseal(platform, label, sealed_key)
            .inspect_err(|_| warn!(platform, "unprotect: can't unseal key"))?,
    );

    let key: KeyMaterial = codec::from_bytes(&serialized_key)
        .inspect_err(|_| warn!("unprotect: can't decode key"))?;

    if key.key_type() != AES_256_CBC_HMAC_SHA256 {
        warn!(key_type = key.key_type(), "unprotect: wrong key type for authenticated decrypt");
        return Err(PolicyVaultError::UnsupportedAlgorithm(key.key_type().to_string()));
    }

    let plaintext =
        crypto::authenticated_decrypt(key.key_type(), &envelope.encrypted_data, key.secret_bytes())
            .inspect_err(|_| warn!("unprotect: payload failed authentication"))?;

    Ok((plaintext, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::SeededEntropy;
    use crate::keys::SealingRoot;
    use crate::seal::SoftwareSealer;

    const LABEL: &str = "test-enclave";

    fn sealer() -> SoftwareSealer<SeededEntropy> {
        SoftwareSealer::new(
            SealingRoot::from_bytes([6u8; 32]),
            b"enclave-measurement".to_vec(),
            SeededEntropy::new([6u8; 32]),
        )
    }

    fn key(key_type: &str) -> KeyMaterial {
        KeyMaterial::from_parts("protect-key", key_type, "vse-key", vec![0x11; 64], "nb", "na")
    }

    #[test]
    fn protect_unprotect_roundtrip() {
        let sealer = sealer();
        let entropy = SeededEntropy::new([1u8; 32]);
        let blob = protect(&sealer, &entropy, "simulated", LABEL, &key(AES_256_CBC_HMAC_SHA256), b"payload")
            .unwrap();

        let (plaintext, recovered) = unprotect(&sealer, "simulated", LABEL, &blob).unwrap();
        assert_eq!(plaintext, b"payload");
        assert_eq!(recovered.name(), "protect-key");
        assert_eq!(recovered.secret_bytes(), &[0x11; 64][..]);
    }

    #[test]
    fn protect_rejects_wrong_key_type() {
        let sealer = sealer();
        let entropy = SeededEntropy::new([1u8; 32]);
        let result = protect(&sealer, &entropy, "simulated", LABEL, &key("aes-256-gcm"), b"payload");
        assert!(matches!(result, Err(PolicyVaultError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn unprotect_requires_sealed_key() {
        let sealer = sealer();
        let blob = codec::to_bytes(&ProtectedEnvelope {
            encrypted_key: None,
            encrypted_data: vec![1, 2, 3],
        })
        .unwrap();
        assert!(matches!(
            unprotect(&sealer, "simulated", LABEL, &blob),
            Err(PolicyVaultError::MissingSealedKey)
        ));
    }

    #[test]
    fn unprotect_rejects_recovered_key_of_wrong_type() {
        let sealer = sealer();
        // Hand-build an envelope whose sealed key claims another algorithm.
        let wrong = key("aes-256-gcm");
        let sealed_key = sealer
            .seal("simulated", LABEL, &codec::to_bytes(&wrong).unwrap())
            .unwrap();
        let blob = codec::to_bytes(&ProtectedEnvelope {
            encrypted_key: Some(sealed_key),
            encrypted_data: vec![0u8; 64],
        })
        .unwrap();
        assert!(matches!(
            unprotect(&sealer, "simulated", LABEL, &blob),
            Err(PolicyVaultError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn unprotect_with_other_platform_fails() {
        let sealer = sealer();
        let entropy = SeededEntropy::new([1u8; 32]);
        let blob = protect(&sealer, &entropy, "simulated", LABEL, &key(AES_256_CBC_HMAC_SHA256), b"payload")
            .unwrap();
        assert!(matches!(
            unprotect(&sealer, "sev-snp", LABEL, &blob),
            Err(PolicyVaultError::EnclaveFailure)
        ));
    }
}
