//! Ed25519 cryptographic operations for the Minnow protocol.
//!
//! Provides key generation, transaction signing, and signature verification.
//! Uses ed25519-dalek for the underlying Ed25519 implementation and BLAKE3
//! for pubkey hashing and signing hashes.
//!
//! # Signing scheme
//!
//! Transaction inputs are signed using a **sighash** that commits to:
//! - Transaction version and lock_time
//! - All input outpoints (txid + vout)
//! - All outputs (value, lock, and token fields)
//! - The index of the input being signed
//! - The **source output** being spent: its value and token fields
//!
//! Committing to the source output's value and token data means a signer
//! cannot be tricked into releasing a token-carrying UTXO it believed was
//! plain value. Signatures and public keys are excluded from the sighash so
//! inputs can be signed independently in any order.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CryptoError;
use crate::types::{Hash256, NftCapability, OutputLock, TokenData, Transaction, Utxo};

/// Ed25519 keypair for signing transaction inputs.
///
/// Wraps [`ed25519_dalek::SigningKey`]. The secret key is zeroized on drop
/// by the underlying library. Use [`KeyPair::generate`] for random keys or
/// [`KeyPair::from_secret_bytes`] for deterministic derivation from a seed.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    /// Derive the public key from this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Get the raw secret key bytes (32 bytes). Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.secret_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key for verifying signatures and deriving addresses.
///
/// The pubkey hash (BLAKE3 of the raw 32-byte key) identifies the owner of
/// an output.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    /// Get the raw public key bytes (32 bytes).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Compute the BLAKE3 pubkey hash used in output locks.
    pub fn pubkey_hash(&self) -> Hash256 {
        pubkey_hash(&self.to_bytes())
    }

    /// Verify an Ed25519 signature on a message.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Compute the BLAKE3 pubkey hash from raw public key bytes.
pub fn pubkey_hash(pubkey_bytes: &[u8; 32]) -> Hash256 {
    Hash256(blake3::hash(pubkey_bytes).into())
}

/// Append a token payload (or its absence) to the sighash preimage.
fn commit_token(data: &mut Vec<u8>, token: Option<&TokenData>) {
    match token {
        None => data.push(0),
        Some(t) => {
            data.push(1);
            data.extend_from_slice(t.category.as_bytes());
            data.extend_from_slice(&t.amount.to_le_bytes());
            match &t.nft {
                None => data.push(0),
                Some(nft) => {
                    data.push(1);
                    data.push(match nft.capability {
                        NftCapability::Immutable => 0,
                        NftCapability::Mutable => 1,
                        NftCapability::Minting => 2,
                    });
                    data.extend_from_slice(&(nft.commitment.len() as u64).to_le_bytes());
                    data.extend_from_slice(&nft.commitment);
                }
            }
        }
    }
}

/// Append an output lock to the sighash preimage.
fn commit_lock(data: &mut Vec<u8>, lock: &OutputLock) {
    match lock {
        OutputLock::PubkeyHash(h) => {
            data.push(0);
            data.extend_from_slice(h.as_bytes());
        }
        OutputLock::Data(bytes) => {
            data.push(1);
            data.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            data.extend_from_slice(bytes);
        }
    }
}

/// Compute the signing hash (sighash) for a transaction input.
///
/// `source` is the UTXO being spent by the input at `input_index`; its value
/// and token fields are part of the digest.
pub fn signing_hash(
    tx: &Transaction,
    input_index: usize,
    source: &Utxo,
) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut data = Vec::new();

    // Version
    data.extend_from_slice(&tx.version.to_le_bytes());

    // All input outpoints (no signatures/pubkeys)
    data.extend_from_slice(&(tx.inputs.len() as u64).to_le_bytes());
    for input in &tx.inputs {
        data.extend_from_slice(input.previous_output.txid.as_bytes());
        data.extend_from_slice(&input.previous_output.vout.to_le_bytes());
    }

    // All outputs: value, lock, token fields
    data.extend_from_slice(&(tx.outputs.len() as u64).to_le_bytes());
    for output in &tx.outputs {
        data.extend_from_slice(&output.value.to_le_bytes());
        commit_lock(&mut data, &output.lock);
        commit_token(&mut data, output.token.as_ref());
    }

    // Lock time
    data.extend_from_slice(&tx.lock_time.to_le_bytes());

    // Input index being signed
    data.extend_from_slice(&(input_index as u64).to_le_bytes());

    // Source output being spent: value and token fields
    data.extend_from_slice(&source.value.to_le_bytes());
    commit_token(&mut data, source.token.as_ref());

    Ok(Hash256(blake3::hash(&data).into()))
}

/// Sign a transaction input in place.
///
/// Computes the signing hash for the given input against its source output,
/// signs it with the keypair, and writes the signature and public key bytes
/// into the input. Inputs can be signed in any order since the sighash
/// excludes signatures.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    source: &Utxo,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let sighash = signing_hash(tx, input_index, source)?;
    let signature = keypair.sign(sighash.as_bytes());
    let pubkey_bytes = keypair.public_key().to_bytes();

    tx.inputs[input_index].signature = signature.to_vec();
    tx.inputs[input_index].public_key = pubkey_bytes.to_vec();
    Ok(())
}

/// Verify a transaction input's signature against its source output.
///
/// Checks that:
/// 1. The input carries a 64-byte signature and 32-byte public key
/// 2. The public key's hash matches the source output's owner
/// 3. The Ed25519 signature verifies against the sighash
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    source: &Utxo,
) -> Result<(), CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let input = &tx.inputs[input_index];

    let pk_bytes: [u8; 32] = input
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let pk = PublicKey::from_bytes(&pk_bytes)?;

    if pk.pubkey_hash() != source.pubkey_hash {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let sig_bytes: [u8; 64] = input
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;

    let sighash = signing_hash(tx, input_index, source)?;
    pk.verify(sighash.as_bytes(), &sig_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::types::{OutPoint, TokenData, TxInput, TxOutput};

    fn sample_source(keypair: &KeyPair, token: Option<TokenData>) -> Utxo {
        Utxo {
            outpoint: OutPoint {
                txid: Hash256([0x11; 32]),
                vout: 0,
            },
            value: 10 * COIN,
            pubkey_hash: keypair.public_key().pubkey_hash(),
            token,
        }
    }

    fn sample_tx(source: &Utxo) -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TxInput::unsigned(source.outpoint)],
            outputs: vec![TxOutput::pay(3 * COIN, Hash256([0xAA; 32]))],
            lock_time: 0,
        }
    }

    // --- KeyPair ---

    #[test]
    fn keypair_generate_unique() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn keypair_from_secret_deterministic() {
        let seed = [42u8; 32];
        let kp1 = KeyPair::from_secret_bytes(seed);
        let kp2 = KeyPair::from_secret_bytes(seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.secret_bytes(), kp2.secret_bytes());
    }

    #[test]
    fn keypair_debug_hides_secret() {
        let kp = KeyPair::from_secret_bytes([7u8; 32]);
        let debug = format!("{kp:?}");
        assert!(!debug.contains(&hex::encode([7u8; 32])));
    }

    // --- Sighash ---

    #[test]
    fn sighash_deterministic() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let source = sample_source(&kp, None);
        let tx = sample_tx(&source);
        assert_eq!(
            signing_hash(&tx, 0, &source).unwrap(),
            signing_hash(&tx, 0, &source).unwrap()
        );
    }

    #[test]
    fn sighash_commits_to_source_value() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let source = sample_source(&kp, None);
        let tx = sample_tx(&source);
        let mut other = source.clone();
        other.value += 1;
        assert_ne!(
            signing_hash(&tx, 0, &source).unwrap(),
            signing_hash(&tx, 0, &other).unwrap()
        );
    }

    #[test]
    fn sighash_commits_to_source_token() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let plain = sample_source(&kp, None);
        let token = sample_source(&kp, Some(TokenData::fungible(Hash256([0x22; 32]), 100)));
        let tx = sample_tx(&plain);
        assert_ne!(
            signing_hash(&tx, 0, &plain).unwrap(),
            signing_hash(&tx, 0, &token).unwrap()
        );
    }

    #[test]
    fn sighash_commits_to_output_token() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let source = sample_source(&kp, None);
        let tx1 = sample_tx(&source);
        let mut tx2 = sample_tx(&source);
        tx2.outputs[0].token = Some(TokenData::fungible(Hash256([0x33; 32]), 5));
        assert_ne!(
            signing_hash(&tx1, 0, &source).unwrap(),
            signing_hash(&tx2, 0, &source).unwrap()
        );
    }

    #[test]
    fn sighash_index_out_of_bounds() {
        let kp = KeyPair::from_secret_bytes([1u8; 32]);
        let source = sample_source(&kp, None);
        let tx = sample_tx(&source);
        let err = signing_hash(&tx, 5, &source).unwrap_err();
        assert!(matches!(err, CryptoError::InputIndexOutOfBounds { index: 5, len: 1 }));
    }

    // --- Sign / verify ---

    #[test]
    fn sign_and_verify_roundtrip() {
        let kp = KeyPair::from_secret_bytes([2u8; 32]);
        let source = sample_source(&kp, None);
        let mut tx = sample_tx(&source);

        sign_transaction_input(&mut tx, 0, &source, &kp).unwrap();
        assert!(tx.inputs[0].is_signed());
        verify_transaction_input(&tx, 0, &source).unwrap();
    }

    #[test]
    fn sign_and_verify_token_input() {
        let kp = KeyPair::from_secret_bytes([3u8; 32]);
        let source = sample_source(
            &kp,
            Some(TokenData::nft(
                Hash256([0x44; 32]),
                crate::types::NftCapability::Mutable,
                vec![0x01, 0x02],
            )),
        );
        let mut tx = sample_tx(&source);

        sign_transaction_input(&mut tx, 0, &source, &kp).unwrap();
        verify_transaction_input(&tx, 0, &source).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_owner() {
        let kp = KeyPair::from_secret_bytes([4u8; 32]);
        let source = sample_source(&kp, None);
        let mut tx = sample_tx(&source);
        sign_transaction_input(&mut tx, 0, &source, &kp).unwrap();

        let mut other = source.clone();
        other.pubkey_hash = Hash256([0xFF; 32]);
        let err = verify_transaction_input(&tx, 0, &other).unwrap_err();
        assert_eq!(err, CryptoError::PubkeyHashMismatch);
    }

    #[test]
    fn verify_rejects_tampered_output() {
        let kp = KeyPair::from_secret_bytes([5u8; 32]);
        let source = sample_source(&kp, None);
        let mut tx = sample_tx(&source);
        sign_transaction_input(&mut tx, 0, &source, &kp).unwrap();

        tx.outputs[0].value += 1;
        let err = verify_transaction_input(&tx, 0, &source).unwrap_err();
        assert_eq!(err, CryptoError::VerificationFailed);
    }

    #[test]
    fn verify_rejects_unsigned_input() {
        let kp = KeyPair::from_secret_bytes([6u8; 32]);
        let source = sample_source(&kp, None);
        let tx = sample_tx(&source);
        let err = verify_transaction_input(&tx, 0, &source).unwrap_err();
        assert_eq!(err, CryptoError::InvalidPublicKey);
    }

    #[test]
    fn pubkey_serde_roundtrip() {
        let kp = KeyPair::from_secret_bytes([8u8; 32]);
        let pk = kp.public_key();
        let json = serde_json::to_string(&pk).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }
}
