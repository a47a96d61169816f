//! Error types for policyvault.
//!
//! Every variant is a distinct failure category of the protection
//! pipeline. Messages signal *what* failed without revealing key material
//! or plaintext.

use thiserror::Error;

/// The single error type for all policyvault operations.
#[derive(Debug, Error)]
pub enum PolicyVaultError {
    /// The key type or encryption algorithm is not supported by the
    /// requested operation.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The secure random source failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// The time source was unavailable or produced an unrepresentable time.
    #[error("time source failed")]
    TimeSourceFailure,

    /// A value could not be encoded or decoded in the canonical format.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The sealing primitive refused to seal or unseal.
    #[error("enclave sealing failed")]
    EnclaveFailure,

    /// Authenticated decryption failed: wrong key, tampered or truncated
    /// ciphertext.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Key bytes had the wrong length for the named algorithm.
    #[error("invalid key")]
    InvalidKey,

    /// The envelope carried no sealed key.
    #[error("protected envelope has no sealed key")]
    MissingSealedKey,

    /// Reading or writing the backing storage failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A new entry was rejected because the store is full.
    #[error("policy store is full ({max_entries} entries)")]
    CapacityExceeded { max_entries: usize },

    /// The operation is declared but deliberately not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for PolicyVaultError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PolicyVaultError>;
