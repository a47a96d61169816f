//! Data encapsulation for a third party.
//!
//! Encapsulation encrypts data under an ephemeral AES-256-GCM content key
//! for a recipient identified by an RSA-4096 key.
//!
//! Known gap: the content key is not wrapped under the recipient's public
//! key and [`EncapsulatedData`] has no field to carry it. Decapsulation
//! therefore tries an all-zero content key and fails authentication unless
//! the ephemeral key happened to be all zeros. The wire shape is kept as is
//! so existing encapsulated blobs stay readable once a key-wrap field is
//! added.

use serde::{Deserialize, Serialize};
use tracing::warn;
use zeroize::Zeroizing;

use crate::codec::base64_bytes;
use crate::crypto::{self, AES_256_GCM_NAME, IV_LEN};
use crate::entropy::EntropySource;
use crate::error::{PolicyVaultError, Result};
use crate::keys::KeyMaterial;

/// Key type accepted by [`encapsulate`].
pub const RSA_4096_PUBLIC: &str = "rsa-4096-public";

/// Key type accepted by [`decapsulate`].
pub const RSA_4096_PRIVATE: &str = "rsa-4096-private";

const CONTENT_KEY_LEN: usize = 32;

/// Encapsulated data as exchanged with the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncapsulatedData {
    #[serde(default)]
    pub encapsulating_key_type: String,
    #[serde(default)]
    pub encryption_algorithm: String,
    #[serde(default, with = "base64_bytes")]
    pub encrypted_data: Vec<u8>,
}

/// Encrypt `data` for the holder of `key`.
///
/// Requires an `rsa-4096-public` key and `aes-256-gcm`.
pub fn encapsulate(
    entropy: &dyn EntropySource,
    key: &KeyMaterial,
    algorithm: &str,
    data: &[u8],
) -> Result<EncapsulatedData> {
    if key.key_type() != RSA_4096_PUBLIC {
        warn!(key_type = key.key_type(), "encapsulate: unsupported encapsulating key type");
        return Err(PolicyVaultError::UnsupportedAlgorithm(key.key_type().to_string()));
    }
    if algorithm != AES_256_GCM_NAME {
        warn!(algorithm, "encapsulate: unsupported encryption algorithm");
        return Err(PolicyVaultError::UnsupportedAlgorithm(algorithm.to_string()));
    }

    let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
    entropy
        .fill(&mut content_key[..])
        .inspect_err(|_| warn!("encapsulate: can't generate content key"))?;

    let mut iv = [0u8; IV_LEN];
    entropy
        .fill(&mut iv)
        .inspect_err(|_| warn!("encapsulate: can't generate iv"))?;

    let encrypted_data = crypto::authenticated_encrypt(algorithm, data, &content_key[..], &iv)
        .inspect_err(|_| warn!("encapsulate: encryption failed"))?;

    Ok(EncapsulatedData {
        encapsulating_key_type: key.key_type().to_string(),
        encryption_algorithm: algorithm.to_string(),
        encrypted_data,
    })
}

/// Recover the data in `encapsulated` with the recipient's private `key`.
///
/// Requires an `rsa-4096-private` key and `aes-256-gcm`. See the module
/// documentation for why this normally fails authentication.
pub fn decapsulate(key: &KeyMaterial, encapsulated: &EncapsulatedData) -> Result<Vec<u8>> {
    if key.key_type() != RSA_4096_PRIVATE {
        warn!(key_type = key.key_type(), "decapsulate: unsupported decapsulating key type");
        return Err(PolicyVaultError::UnsupportedAlgorithm(key.key_type().to_string()));
    }
    if encapsulated.encryption_algorithm != AES_256_GCM_NAME {
        warn!(
            algorithm = %encapsulated.encryption_algorithm,
            "decapsulate: unsupported decryption algorithm"
        );
        return Err(PolicyVaultError::UnsupportedAlgorithm(
            encapsulated.encryption_algorithm.clone(),
        ));
    }

    // No wrapped content key is carried; see module docs.
    let content_key = [0u8; CONTENT_KEY_LEN];
    crypto::authenticated_decrypt(
        &encapsulated.encryption_algorithm,
        &encapsulated.encrypted_data,
        &content_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::SeededEntropy;

    fn rsa_key(key_type: &str) -> KeyMaterial {
        KeyMaterial::from_parts("recipient", key_type, "vse-key", Vec::new(), "", "")
    }

    #[test]
    fn encapsulate_records_types_and_ciphertext() {
        let entropy = SeededEntropy::new([2u8; 32]);
        let out = encapsulate(&entropy, &rsa_key(RSA_4096_PUBLIC), AES_256_GCM_NAME, b"secret").unwrap();
        assert_eq!(out.encapsulating_key_type, RSA_4096_PUBLIC);
        assert_eq!(out.encryption_algorithm, AES_256_GCM_NAME);
        assert!(!out.encrypted_data.windows(6).any(|w| w == b"secret"));

        // Replaying the same stream yields the content key, then the IV.
        let replay = SeededEntropy::new([2u8; 32]);
        let mut content_key = [0u8; CONTENT_KEY_LEN];
        replay.fill(&mut content_key).unwrap();
        let mut iv = [0u8; IV_LEN];
        replay.fill(&mut iv).unwrap();

        assert_eq!(&out.encrypted_data[..crypto::NONCE_LEN], &iv[..crypto::NONCE_LEN]);
        let plain =
            crypto::authenticated_decrypt(AES_256_GCM_NAME, &out.encrypted_data, &content_key)
                .unwrap();
        assert_eq!(plain, b"secret");
    }

    #[test]
    fn type_and_algorithm_preconditions() {
        let entropy = SeededEntropy::new([2u8; 32]);
        assert!(encapsulate(&entropy, &rsa_key(RSA_4096_PRIVATE), AES_256_GCM_NAME, b"x").is_err());
        assert!(encapsulate(&entropy, &rsa_key(RSA_4096_PUBLIC), "aes-256-cbc-hmac-sha256", b"x")
            .is_err());

        let out = encapsulate(&entropy, &rsa_key(RSA_4096_PUBLIC), AES_256_GCM_NAME, b"x").unwrap();
        assert!(matches!(
            decapsulate(&rsa_key(RSA_4096_PUBLIC), &out),
            Err(PolicyVaultError::UnsupportedAlgorithm(_))
        ));

        let mut other = out.clone();
        other.encryption_algorithm = "chacha20-poly1305".into();
        assert!(matches!(
            decapsulate(&rsa_key(RSA_4096_PRIVATE), &other),
            Err(PolicyVaultError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn decapsulate_fails_without_transported_key() {
        let entropy = SeededEntropy::new([2u8; 32]);
        let out = encapsulate(&entropy, &rsa_key(RSA_4096_PUBLIC), AES_256_GCM_NAME, b"secret").unwrap();
        assert!(matches!(
            decapsulate(&rsa_key(RSA_4096_PRIVATE), &out),
            Err(PolicyVaultError::AuthenticationFailure)
        ));
    }
}
