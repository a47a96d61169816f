//! Secure random source.
//!
//! Randomness is an injected capability rather than a global so that the
//! protection pipeline can be driven deterministically in tests. Production
//! code uses [`SystemEntropy`], which wraps `ring::rand::SystemRandom`.

use std::sync::Mutex;

use ring::digest::{self, SHA256};
use ring::rand::{self, SystemRandom};

use crate::error::{PolicyVaultError, Result};

/// A source of cryptographically secure random bytes.
///
/// A failing source must surface [`PolicyVaultError::RandomnessFailure`];
/// implementations never fall back to weaker entropy.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG, via `ring`.
#[derive(Debug)]
pub struct SystemEntropy {
    rng: SystemRandom,
}

impl SystemEntropy {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for SystemEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        rand::SecureRandom::fill(&self.rng, dest).map_err(|_| PolicyVaultError::RandomnessFailure)
    }
}

/// Deterministic byte stream for tests and benchmarks.
///
/// Output block `i` is `SHA-256(seed || i)` with `i` as a big-endian u64.
/// Two sources built from the same seed produce the same stream. Never use
/// this for real key material.
#[derive(Debug)]
pub struct SeededEntropy {
    seed: [u8; 32],
    state: Mutex<StreamState>,
}

#[derive(Debug, Default)]
struct StreamState {
    counter: u64,
    block: [u8; 32],
    used: usize,
}

impl SeededEntropy {
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            seed,
            state: Mutex::new(StreamState {
                used: 32,
                ..StreamState::default()
            }),
        }
    }

    fn next_block(seed: &[u8; 32], counter: u64) -> [u8; 32] {
        let mut ctx = digest::Context::new(&SHA256);
        ctx.update(seed);
        ctx.update(&counter.to_be_bytes());
        let mut block = [0u8; 32];
        block.copy_from_slice(ctx.finish().as_ref());
        block
    }
}

impl EntropySource for SeededEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PolicyVaultError::RandomnessFailure)?;
        for byte in dest.iter_mut() {
            if state.used == state.block.len() {
                state.block = Self::next_block(&self.seed, state.counter);
                state.counter = state
                    .counter
                    .checked_add(1)
                    .ok_or(PolicyVaultError::RandomnessFailure)?;
                state.used = 0;
            }
            *byte = state.block[state.used];
            state.used += 1;
        }
        Ok(())
    }
}
