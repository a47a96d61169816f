//! Key material and key derivation.
//!
//! This module owns two responsibilities:
//! 1. Constructing the per-save data-protection key ([`KeyMaterial`]) with
//!    its validity window.
//! 2. Deriving sealing keys from a [`SealingRoot`] using HKDF-SHA256, for
//!    the software sealer.
//!
//! All secret bytes live in types that are zeroised on drop and whose
//! `Debug` output never includes the secret.
//!
//! ## Sealing key derivation
//!
//! ```text
//! HKDF-SHA256(
//!     ikm  = sealing_root,
//!     salt = None,
//!     info = "{platform}:{label}:{hex(measurement)}"
//! )
//! ```

use std::fmt;

use ring::hkdf;
use serde::{Deserialize, Serialize};
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::clock::{self, Clock};
use crate::codec::base64_bytes;
use crate::crypto::{self, AES_256_CBC_HMAC_SHA256};
use crate::entropy::EntropySource;
use crate::error::{PolicyVaultError, Result};

/// Format tag stamped on every key built by [`construct_key_for_protect`].
pub const KEY_FORMAT: &str = "vse-key";

/// Validity window of a protection key, in days.
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Length of the sealing root and of derived sealing keys (256 bits).
pub const SEALING_KEY_LEN: usize = 32;

const SECONDS_PER_DAY: i64 = 86_400;

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// A named symmetric key with a validity window.
///
/// Serialized only inside a sealed envelope; never persisted in the clear.
/// Not `Clone`. Zeroised on drop.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyMaterial {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    key_type: String,
    #[serde(default)]
    format: String,
    #[serde(with = "base64_bytes", default)]
    secret_bytes: Vec<u8>,
    #[serde(default)]
    not_before: String,
    #[serde(default)]
    not_after: String,
}

impl KeyMaterial {
    /// Assemble a key from its parts.
    ///
    /// No validation is done here; operations check the key type they need.
    pub fn from_parts(
        name: impl Into<String>,
        key_type: impl Into<String>,
        format: impl Into<String>,
        secret_bytes: Vec<u8>,
        not_before: impl Into<String>,
        not_after: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key_type: key_type.into(),
            format: format.into(),
            secret_bytes,
            not_before: not_before.into(),
            not_after: not_after.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn not_before(&self) -> &str {
        &self.not_before
    }

    pub fn not_after(&self) -> &str {
        &self.not_after
    }

    /// Borrow the secret bytes for encrypt/decrypt operations.
    ///
    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn secret_bytes(&self) -> &[u8] {
        &self.secret_bytes
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("name", &self.name)
            .field("key_type", &self.key_type)
            .field("format", &self.format)
            .field("secret_bytes", &format_args!("<{} bytes redacted>", self.secret_bytes.len()))
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish()
    }
}

/// Build a fresh data-protection key.
///
/// Only `aes-256-cbc-hmac-sha256` is supported. The secret is 64 bytes
/// from `entropy`; the window runs from `clock.now()` for `validity_days`.
/// Any failure yields no key at all.
pub fn construct_key_for_protect(
    name: &str,
    key_type: &str,
    validity_days: u32,
    entropy: &dyn EntropySource,
    clock: &dyn Clock,
) -> Result<KeyMaterial> {
    if key_type != AES_256_CBC_HMAC_SHA256 {
        warn!(key_type, "construct_key_for_protect: only aes-256-cbc-hmac-sha256 is supported");
        return Err(PolicyVaultError::UnsupportedAlgorithm(key_type.to_string()));
    }

    let alg = crypto::Algorithm::from_name(key_type)?;
    let mut secret = vec![0u8; alg.key_len()];
    if let Err(e) = entropy.fill(&mut secret) {
        secret.zeroize();
        warn!("construct_key_for_protect: can't generate key bytes");
        return Err(e);
    }

    let window = clock.now().and_then(|now| {
        let later = clock::plus_seconds(now, i64::from(validity_days) * SECONDS_PER_DAY)?;
        Ok((clock::to_canonical_string(now), clock::to_canonical_string(later)))
    });
    let (not_before, not_after) = match window {
        Ok(w) => w,
        Err(e) => {
            secret.zeroize();
            warn!("construct_key_for_protect: can't read time");
            return Err(e);
        }
    };

    Ok(KeyMaterial::from_parts(
        name, key_type, KEY_FORMAT, secret, not_before, not_after,
    ))
}

// ---------------------------------------------------------------------------
// Sealing root and derived sealing keys
// ---------------------------------------------------------------------------

/// The secret from which the software sealer derives its keys. Stands in
/// for a platform's hardware sealing secret.
///
/// Not `Clone`. Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SealingRoot {
    bytes: [u8; SEALING_KEY_LEN],
}

impl SealingRoot {
    pub fn from_bytes(bytes: [u8; SEALING_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Draw a new root from `entropy`.
    pub fn generate(entropy: &dyn EntropySource) -> Result<Self> {
        let mut bytes = [0u8; SEALING_KEY_LEN];
        entropy.fill(&mut bytes)?;
        Ok(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SEALING_KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SealingRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SealingRoot(<redacted>)")
    }
}

/// A key derived for one platform, label, and measurement. Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SealingKey {
    bytes: [u8; SEALING_KEY_LEN],
}

impl SealingKey {
    pub(crate) fn as_bytes(&self) -> &[u8; SEALING_KEY_LEN] {
        &self.bytes
    }
}

/// Derive the sealing key bound to `platform`, `label`, and `measurement`.
///
/// Each distinct identity produces a statistically independent key, so data
/// sealed under one identity cannot be unsealed under another.
pub(crate) fn derive_sealing_key(
    root: &SealingRoot,
    platform: &str,
    label: &str,
    measurement: &[u8],
) -> Result<SealingKey> {
    let info = format!("{platform}:{label}:{}", hex::encode(measurement));

    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
    let prk = salt.extract(root.as_bytes());

    let info_slices = [info.as_bytes()];
    let okm = prk
        .expand(&info_slices, hkdf::HKDF_SHA256)
        .map_err(|_| PolicyVaultError::EnclaveFailure)?;

    let mut derived = [0u8; SEALING_KEY_LEN];
    okm.fill(&mut derived)
        .map_err(|_| PolicyVaultError::EnclaveFailure)?;

    Ok(SealingKey { bytes: derived })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::entropy::SeededEntropy;
    use chrono::{TimeZone, Utc};

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn fill(&self, _dest: &mut [u8]) -> Result<()> {
            Err(PolicyVaultError::RandomnessFailure)
        }
    }

    struct BrokenClock;

    impl Clock for BrokenClock {
        fn now(&self) -> Result<chrono::DateTime<Utc>> {
            Err(PolicyVaultError::TimeSourceFailure)
        }
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn constructs_key_with_one_year_window() {
        let entropy = SeededEntropy::new([4u8; 32]);
        let key = construct_key_for_protect(
            "protect-key",
            AES_256_CBC_HMAC_SHA256,
            DEFAULT_VALIDITY_DAYS,
            &entropy,
            &fixed_clock(),
        )
        .unwrap();

        assert_eq!(key.name(), "protect-key");
        assert_eq!(key.key_type(), AES_256_CBC_HMAC_SHA256);
        assert_eq!(key.format(), KEY_FORMAT);
        assert_eq!(key.secret_bytes().len(), 64);
        assert_eq!(key.not_before(), "2026-03-01T12:00:00.000000000Z");
        assert_eq!(key.not_after(), "2027-03-01T12:00:00.000000000Z");
    }

    #[test]
    fn rejects_unsupported_key_type() {
        let entropy = SeededEntropy::new([4u8; 32]);
        let result = construct_key_for_protect("k", "aes-128-gcm", 365, &entropy, &fixed_clock());
        assert!(matches!(result, Err(PolicyVaultError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn randomness_and_time_failures_yield_no_key() {
        let result = construct_key_for_protect(
            "k",
            AES_256_CBC_HMAC_SHA256,
            365,
            &BrokenEntropy,
            &fixed_clock(),
        );
        assert!(matches!(result, Err(PolicyVaultError::RandomnessFailure)));

        let entropy = SeededEntropy::new([4u8; 32]);
        let result =
            construct_key_for_protect("k", AES_256_CBC_HMAC_SHA256, 365, &entropy, &BrokenClock);
        assert!(matches!(result, Err(PolicyVaultError::TimeSourceFailure)));
    }

    #[test]
    fn debug_redacts_secret() {
        let key = KeyMaterial::from_parts("k", "t", "f", vec![0xAB; 4], "nb", "na");
        let shown = format!("{key:?}");
        assert!(shown.contains("4 bytes redacted"));
        assert!(!shown.contains("171"));
    }

    #[test]
    fn sealing_keys_are_identity_scoped() {
        let root = SealingRoot::from_bytes([1u8; SEALING_KEY_LEN]);
        let a = derive_sealing_key(&root, "simulated", "test-enclave", b"m1").unwrap();
        let b = derive_sealing_key(&root, "simulated", "test-enclave", b"m2").unwrap();
        let c = derive_sealing_key(&root, "simulated", "other", b"m1").unwrap();
        let again = derive_sealing_key(&root, "simulated", "test-enclave", b"m1").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
        assert_eq!(a.as_bytes(), again.as_bytes());
    }
}
