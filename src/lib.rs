//! # policyvault
//!
//! Sealed persistence for a bounded, tag-indexed policy store.
//!
//! A store is saved with envelope encryption: each save builds a fresh
//! data key, seals that key to an enclave identity, and encrypts the
//! serialized store under it. Recovery reverses the chain and fails closed
//! on any algorithm, format, or authentication mismatch.
//!
//! Randomness, time, and sealing are injected capabilities, so the whole
//! pipeline runs deterministically under test.
//!
//! ## Public API
//!
//! [`PolicyVault`] bundles configuration and capabilities and is the usual
//! entry point. The per-step functions are public for callers that manage
//! their own capabilities.

pub mod clock;
pub mod codec;
pub mod config;
pub(crate) mod crypto;
pub mod encapsulate;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod persist;
pub mod seal;
pub mod store;

use std::path::Path;

use tracing::warn;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::VaultConfig;
pub use crypto::{AES_256_CBC_HMAC_SHA256, AES_256_GCM_NAME};
pub use encapsulate::EncapsulatedData;
pub use entropy::{EntropySource, SeededEntropy, SystemEntropy};
pub use envelope::ProtectedEnvelope;
pub use error::{PolicyVaultError, Result};
pub use keys::{KeyMaterial, SealingRoot};
pub use seal::{Sealer, SoftwareSealer};
pub use store::{PolicyStore, PolicyStoreEntry};

use persist::PersistContext;

/// Generate a sealing root from the operating system CSPRNG.
///
/// In production the root stands in for a platform sealing secret and
/// should come from the platform rather than be generated locally.
pub fn generate_sealing_root() -> Result<SealingRoot> {
    SealingRoot::generate(&SystemEntropy::new())
}

/// Configuration plus the sealing, randomness, and time capabilities.
pub struct PolicyVault {
    config: VaultConfig,
    sealer: Box<dyn Sealer>,
    entropy: Box<dyn EntropySource>,
    clock: Box<dyn Clock>,
}

impl PolicyVault {
    pub fn new(
        config: VaultConfig,
        sealer: impl Sealer + 'static,
        entropy: impl EntropySource + 'static,
        clock: impl Clock + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sealer: Box::new(sealer),
            entropy: Box::new(entropy),
            clock: Box::new(clock),
        })
    }

    /// A vault using the software sealer, the system CSPRNG and the wall
    /// clock, with default configuration.
    pub fn with_software_sealer(root: SealingRoot, measurement: impl Into<Vec<u8>>) -> Result<Self> {
        Self::new(
            VaultConfig::default(),
            SoftwareSealer::new(root, measurement, SystemEntropy::new()),
            SystemEntropy::new(),
            SystemClock,
        )
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// An empty store with the configured default capacity.
    pub fn new_store(&self) -> PolicyStore {
        PolicyStore::new(self.config.default_max_entries)
    }

    pub fn construct_key_for_protect(&self, name: &str, key_type: &str) -> Result<KeyMaterial> {
        keys::construct_key_for_protect(
            name,
            key_type,
            self.config.key_validity_days,
            self.entropy.as_ref(),
            self.clock.as_ref(),
        )
    }

    pub fn protect(&self, platform: &str, key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
        envelope::protect(
            self.sealer.as_ref(),
            self.entropy.as_ref(),
            platform,
            &self.config.seal_label,
            key,
            plaintext,
        )
    }

    pub fn unprotect(&self, platform: &str, envelope_bytes: &[u8]) -> Result<(Vec<u8>, KeyMaterial)> {
        envelope::unprotect(
            self.sealer.as_ref(),
            platform,
            &self.config.seal_label,
            envelope_bytes,
        )
    }

    pub fn save(&self, platform: &str, store: &PolicyStore, path: impl AsRef<Path>) -> Result<()> {
        persist::save_policy_store(self.persist_context(), platform, store, path.as_ref())
    }

    pub fn recover(&self, platform: &str, path: impl AsRef<Path>) -> Result<PolicyStore> {
        persist::recover_policy_store(self.persist_context(), platform, path.as_ref())
    }

    /// Recover into caller-owned state. `dest` is replaced only on success
    /// and is left exactly as it was on any failure.
    pub fn recover_into(
        &self,
        platform: &str,
        path: impl AsRef<Path>,
        dest: &mut PolicyStore,
    ) -> Result<()> {
        let recovered = self.recover(platform, path)?;
        if recovered.max_entries() != dest.max_entries() {
            warn!(
                recovered = recovered.max_entries(),
                expected = dest.max_entries(),
                "recovered store capacity differs from destination"
            );
        }
        *dest = recovered;
        Ok(())
    }

    pub fn encapsulate(
        &self,
        key: &KeyMaterial,
        algorithm: &str,
        data: &[u8],
    ) -> Result<EncapsulatedData> {
        encapsulate::encapsulate(self.entropy.as_ref(), key, algorithm, data)
    }

    pub fn decapsulate(&self, key: &KeyMaterial, encapsulated: &EncapsulatedData) -> Result<Vec<u8>> {
        encapsulate::decapsulate(key, encapsulated)
    }

    fn persist_context(&self) -> PersistContext<'_> {
        PersistContext {
            config: &self.config,
            sealer: self.sealer.as_ref(),
            entropy: self.entropy.as_ref(),
            clock: self.clock.as_ref(),
        }
    }
}

impl std::fmt::Debug for PolicyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyVault")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
