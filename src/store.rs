//! The policy store.
//!
//! A bounded collection of opaque typed values indexed by `(tag, type)`.
//! Entries keep insertion order; enumeration order is part of the store's
//! meaning and survives a save/recover cycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::base64_bytes;
use crate::error::{PolicyVaultError, Result};

/// One tagged, typed value. `(tag, entry_type)` is unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStoreEntry {
    #[serde(default)]
    pub tag: String,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(with = "base64_bytes", default)]
    pub value: Vec<u8>,
}

impl PolicyStoreEntry {
    pub fn new(tag: impl Into<String>, entry_type: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            tag: tag.into(),
            entry_type: entry_type.into(),
            value,
        }
    }

    fn matches(&self, tag: &str, entry_type: &str) -> bool {
        self.tag == tag && self.entry_type == entry_type
    }
}

impl fmt::Display for PolicyStoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tag: {}, Type: {}, Value: {}",
            self.tag,
            self.entry_type,
            hex::encode(&self.value)
        )
    }
}

/// A bounded, ordered, tag-indexed store.
///
/// The store has no internal locking. Callers sharing one across threads
/// must serialize mutation and save/recover themselves.
///
/// Decoding re-checks the store invariants: no more entries than
/// `maxEntries`, and no repeated `(tag, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPolicyStore")]
pub struct PolicyStore {
    max_entries: usize,
    entries: Vec<PolicyStoreEntry>,
}

/// Wire form of [`PolicyStore`] before its invariants are checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicyStore {
    #[serde(default)]
    max_entries: usize,
    #[serde(default)]
    entries: Vec<PolicyStoreEntry>,
}

impl TryFrom<RawPolicyStore> for PolicyStore {
    type Error = PolicyVaultError;

    fn try_from(raw: RawPolicyStore) -> Result<Self> {
        if raw.entries.len() > raw.max_entries {
            return Err(PolicyVaultError::Serialization(format!(
                "store holds {} entries but allows {}",
                raw.entries.len(),
                raw.max_entries
            )));
        }
        for (i, entry) in raw.entries.iter().enumerate() {
            if raw.entries[..i]
                .iter()
                .any(|e| e.matches(&entry.tag, &entry.entry_type))
            {
                return Err(PolicyVaultError::Serialization(format!(
                    "duplicate entry ({}, {})",
                    entry.tag, entry.entry_type
                )));
            }
        }
        Ok(Self {
            max_entries: raw.max_entries,
            entries: raw.entries,
        })
    }
}

impl PolicyStore {
    /// Create an empty store holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: Vec::new(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn entries(&self) -> std::slice::Iter<'_, PolicyStoreEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PolicyStoreEntry> {
        self.entries.get(index)
    }

    /// Index of the first entry matching `(tag, entry_type)`.
    pub fn find(&self, tag: &str, entry_type: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.matches(tag, entry_type))
    }

    /// Value stored under `(tag, entry_type)`.
    pub fn value(&self, tag: &str, entry_type: &str) -> Option<&[u8]> {
        self.find(tag, entry_type)
            .map(|i| self.entries[i].value.as_slice())
    }

    /// Overwrite the value of an existing `(tag, entry_type)` in place, or
    /// append a new entry.
    ///
    /// Updates succeed even when the store is full. A new entry on a full
    /// store fails with [`PolicyVaultError::CapacityExceeded`] and leaves the
    /// store untouched.
    pub fn insert_or_update(&mut self, tag: &str, entry_type: &str, value: Vec<u8>) -> Result<()> {
        if let Some(i) = self.find(tag, entry_type) {
            self.entries[i].value = value;
            return Ok(());
        }
        if self.entries.len() >= self.max_entries {
            warn!(tag, entry_type, max_entries = self.max_entries, "policy store is full");
            return Err(PolicyVaultError::CapacityExceeded {
                max_entries: self.max_entries,
            });
        }
        self.entries
            .push(PolicyStoreEntry::new(tag, entry_type, value));
        Ok(())
    }

    /// Entry deletion is not supported. Always fails and never mutates.
    pub fn delete(&mut self, _index: usize) -> Result<()> {
        Err(PolicyVaultError::NotImplemented("policy store entry deletion"))
    }
}

impl fmt::Display for PolicyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Maximum Entries: {}, current entries: {}",
            self.max_entries,
            self.entries.len()
        )?;
        for entry in &self.entries {
            writeln!(f, "   {entry}")?;
        }
        Ok(())
    }
}
