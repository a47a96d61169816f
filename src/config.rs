//! Runtime configuration.
//!
//! All fields have defaults, so an empty JSON object is a valid config.
//!
//! | Field | Default |
//! |-------|---------|
//! | `sealLabel` | `test-enclave` |
//! | `protectKeyName` | `protect-key` |
//! | `keyValidityDays` | `365` |
//! | `defaultMaxEntries` | `100` |
//!
//! The data-key algorithm is fixed (`aes-256-cbc-hmac-sha256`) and is not
//! configurable.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyVaultError, Result};
use crate::keys::DEFAULT_VALIDITY_DAYS;

/// Label every data key is sealed under.
pub const DEFAULT_SEAL_LABEL: &str = "test-enclave";

/// Name given to the key built for each save.
pub const DEFAULT_PROTECT_KEY_NAME: &str = "protect-key";

/// Capacity of stores created through the vault facade.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct VaultConfig {
    pub seal_label: String,
    pub protect_key_name: String,
    pub key_validity_days: u32,
    pub default_max_entries: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            seal_label: DEFAULT_SEAL_LABEL.to_string(),
            protect_key_name: DEFAULT_PROTECT_KEY_NAME.to_string(),
            key_validity_days: DEFAULT_VALIDITY_DAYS,
            default_max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl VaultConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PolicyVaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject settings the protection pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.seal_label.is_empty() {
            return Err(PolicyVaultError::Config("sealLabel must not be empty".into()));
        }
        if self.key_validity_days == 0 {
            return Err(PolicyVaultError::Config("keyValidityDays must be positive".into()));
        }
        Ok(())
    }
}
