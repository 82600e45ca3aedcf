//! Deterministic per-unit seed derivation
//!
//! Every stochastic stage receives its own seed computed from the run's base seed and a
//! stable unit identifier, so results never depend on execution order.

use sha2::{Digest, Sha256};

/// Derive a seed for the unit `(scope, index)` from `base`
pub fn derive_seed(base: u64, scope: &str, index: usize) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update((scope.len() as u64).to_le_bytes());
    hasher.update(scope.as_bytes());
    hasher.update((index as u64).to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
