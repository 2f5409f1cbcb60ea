//! Seed management and deterministic key derivation.
//!
//! Uses BLAKE3 keyed derivation to produce Ed25519 keypairs from a 32-byte
//! master seed along a two-branch path `{receive|change}/{index}`. Simpler
//! than BIP-32 (which is incompatible with Ed25519) while keeping the same
//! deterministic, recoverable properties.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use minnow_core::crypto::KeyPair;

use crate::error::WalletError;

/// BLAKE3 KDF context for child key derivation.
const KDF_CONTEXT: &str = "minnow-wallet-key-derivation-v1";

/// A 32-byte master seed for deterministic key derivation.
///
/// Secret material is zeroized on drop to prevent leaking key material
/// in freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 32],
}

impl Seed {
    /// Generate a random seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the keypair at `{0|1}/{index}`.
///
/// Branch 0 holds receive keys, branch 1 change keys. Each (branch, index)
/// pair produces a unique, deterministic keypair recoverable from the seed
/// alone.
pub fn derive_keypair(seed: &Seed, is_change: bool, index: u32) -> KeyPair {
    let mut ikm = Vec::with_capacity(37);
    ikm.extend_from_slice(seed.as_bytes());
    ikm.push(is_change as u8);
    ikm.extend_from_slice(&index.to_le_bytes());
    let derived = blake3::derive_key(KDF_CONTEXT, &ikm);
    KeyPair::from_secret_bytes(derived)
}

/// Validate that a seed produces usable keypairs.
pub fn validate_seed(seed: &Seed) -> Result<(), WalletError> {
    let _kp = derive_keypair(seed, false, 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_generate_unique() {
        let s1 = Seed::generate();
        let s2 = Seed::generate();
        assert_ne!(s1.as_bytes(), s2.as_bytes());
    }

    #[test]
    fn seed_from_bytes_roundtrip() {
        let bytes = [42u8; 32];
        let seed = Seed::from_bytes(bytes);
        assert_eq!(seed.as_bytes(), &bytes);
    }

    #[test]
    fn seed_debug_hides_bytes() {
        let seed = Seed::from_bytes([0xAB; 32]);
        let debug = format!("{seed:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("ab"));
    }

    #[test]
    fn derive_deterministic() {
        let seed = Seed::from_bytes([1u8; 32]);
        let kp1 = derive_keypair(&seed, false, 0);
        let kp2 = derive_keypair(&seed, false, 0);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn derive_unique_per_index() {
        let seed = Seed::from_bytes([1u8; 32]);
        let kp0 = derive_keypair(&seed, false, 0);
        let kp1 = derive_keypair(&seed, false, 1);
        assert_ne!(kp0.public_key(), kp1.public_key());
    }

    #[test]
    fn derive_unique_per_branch() {
        let seed = Seed::from_bytes([1u8; 32]);
        let receive = derive_keypair(&seed, false, 3);
        let change = derive_keypair(&seed, true, 3);
        assert_ne!(receive.public_key(), change.public_key());
    }

    #[test]
    fn derive_unique_per_seed() {
        let kp1 = derive_keypair(&Seed::from_bytes([1u8; 32]), false, 0);
        let kp2 = derive_keypair(&Seed::from_bytes([2u8; 32]), false, 0);
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn validate_seed_works() {
        let seed = Seed::from_bytes([11u8; 32]);
        assert!(validate_seed(&seed).is_ok());
    }
}
