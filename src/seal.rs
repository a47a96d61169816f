//! Enclave sealing capability.
//!
//! Sealing binds ciphertext to an execution-environment identity: only code
//! running under an equivalent identity can unseal it. Real hardware
//! sealing is platform specific, so the pipeline talks to a [`Sealer`] and
//! this module ships [`SoftwareSealer`] for hosts without enclave hardware.

use tracing::warn;

use crate::crypto::{self, AES_256_GCM_NAME, IV_LEN};
use crate::entropy::EntropySource;
use crate::error::{PolicyVaultError, Result};
use crate::keys::{self, SealingRoot};

/// A sealing primitive.
///
/// `platform` names the enclave platform and `label` scopes the data
/// within it. Implementations must return [`PolicyVaultError::EnclaveFailure`]
/// on any platform failure or identity mismatch.
pub trait Sealer: Send + Sync {
    fn seal(&self, platform: &str, label: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn unseal(&self, platform: &str, label: &str, sealed: &[u8]) -> Result<Vec<u8>>;
}

/// Software-only sealing.
///
/// Keys are derived from a [`SealingRoot`] and the sealer's enclave
/// measurement, then used for AES-256-GCM. A sealer with a different root
/// or measurement, or a call with a different platform or label, cannot
/// unseal the output.
///
/// # Layout of sealed bytes
/// ```text
/// [ nonce (12 bytes) ][ ciphertext + GCM tag ]
/// ```
pub struct SoftwareSealer<E: EntropySource> {
    root: SealingRoot,
    measurement: Vec<u8>,
    entropy: E,
}

impl<E: EntropySource> SoftwareSealer<E> {
    pub fn new(root: SealingRoot, measurement: impl Into<Vec<u8>>, entropy: E) -> Self {
        Self {
            root,
            measurement: measurement.into(),
            entropy,
        }
    }

    /// The enclave measurement this sealer is bound to.
    pub fn measurement(&self) -> &[u8] {
        &self.measurement
    }
}

impl<E: EntropySource> Sealer for SoftwareSealer<E> {
    fn seal(&self, platform: &str, label: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = keys::derive_sealing_key(&self.root, platform, label, &self.measurement)?;
        let mut iv = [0u8; IV_LEN];
        self.entropy.fill(&mut iv)?;
        crypto::authenticated_encrypt(AES_256_GCM_NAME, plaintext, key.as_bytes(), &iv).map_err(
            |e| {
                warn!(platform, label, error = %e, "software seal failed");
                PolicyVaultError::EnclaveFailure
            },
        )
    }

    fn unseal(&self, platform: &str, label: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        let key = keys::derive_sealing_key(&self.root, platform, label, &self.measurement)?;
        crypto::authenticated_decrypt(AES_256_GCM_NAME, sealed, key.as_bytes()).map_err(|_| {
            warn!(platform, label, "software unseal failed");
            PolicyVaultError::EnclaveFailure
        })
    }
}

impl<E: EntropySource> std::fmt::Debug for SoftwareSealer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareSealer")
            .field("measurement_len", &self.measurement.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::SeededEntropy;

    fn sealer(root: u8, measurement: &[u8]) -> SoftwareSealer<SeededEntropy> {
        SoftwareSealer::new(
            SealingRoot::from_bytes([root; 32]),
            measurement,
            SeededEntropy::new([root; 32]),
        )
    }

    #[test]
    fn seal_unseal_roundtrip() {
        let s = sealer(1, b"measurement");
        let sealed = s.seal("simulated", "test-enclave", b"key bytes").unwrap();
        assert_eq!(s.unseal("simulated", "test-enclave", &sealed).unwrap(), b"key bytes");
    }

    #[test]
    fn identity_mismatch_fails() {
        let s = sealer(1, b"measurement");
        let sealed = s.seal("simulated", "test-enclave", b"key bytes").unwrap();

        assert!(matches!(
            s.unseal("sev", "test-enclave", &sealed),
            Err(PolicyVaultError::EnclaveFailure)
        ));
        assert!(s.unseal("simulated", "other-label", &sealed).is_err());
        assert!(sealer(1, b"other").unseal("simulated", "test-enclave", &sealed).is_err());
        assert!(sealer(2, b"measurement").unseal("simulated", "test-enclave", &sealed).is_err());
    }
}
