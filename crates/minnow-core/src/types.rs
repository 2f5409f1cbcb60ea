//! Core protocol types: transactions, outputs, UTXOs, and token data.
//!
//! All monetary values are in satoshis (1 coin = 10^8 satoshis). Token
//! amounts are unsigned integers in the token's own granularity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransactionError;

/// A 32-byte hash value.
///
/// Used for transaction IDs, token category IDs, and pubkey hashes
/// (all BLAKE3).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a Hash256 from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(s).map_err(|e| TransactionError::Serialization(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransactionError::Serialization("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub vout: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Capability carried by a non-fungible token.
///
/// `Minting` grants the holder the right to create further NFTs of the same
/// category (the "mint baton"); `Mutable` allows the commitment to change
/// when the token is spent; `Immutable` tokens pass through unchanged.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum NftCapability {
    Immutable,
    Mutable,
    Minting,
}

impl fmt::Display for NftCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NftCapability::Immutable => write!(f, "immutable"),
            NftCapability::Mutable => write!(f, "mutable"),
            NftCapability::Minting => write!(f, "minting"),
        }
    }
}

/// Non-fungible half of a token: a capability plus an arbitrary commitment.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct NftData {
    pub capability: NftCapability,
    /// Arbitrary bytes, at most [`MAX_COMMITMENT_LEN`](crate::constants::MAX_COMMITMENT_LEN).
    pub commitment: Vec<u8>,
}

impl NftData {
    pub fn new(capability: NftCapability, commitment: Vec<u8>) -> Self {
        Self { capability, commitment }
    }
}

/// Token payload attached to an output: a category, a fungible amount, and
/// optionally a non-fungible token.
///
/// An output may carry a fungible amount, an NFT, or both (a "hybrid"
/// output). `amount == 0` with `nft == None` is not a meaningful token and
/// is never produced by the engine.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct TokenData {
    /// Token category ID (the genesis outpoint's txid).
    pub category: Hash256,
    /// Fungible amount. Zero for pure NFT outputs.
    pub amount: u64,
    /// Non-fungible token, if present.
    pub nft: Option<NftData>,
}

impl TokenData {
    /// Fungible-only token data.
    pub fn fungible(category: Hash256, amount: u64) -> Self {
        Self { category, amount, nft: None }
    }

    /// Pure NFT token data (no fungible amount).
    pub fn nft(category: Hash256, capability: NftCapability, commitment: Vec<u8>) -> Self {
        Self {
            category,
            amount: 0,
            nft: Some(NftData::new(capability, commitment)),
        }
    }
}

/// The spend condition of a transaction output.
///
/// A closed union: either a pubkey-hash lock (standard payment) or a
/// data carrier (zero-value output embedding arbitrary bytes).
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum OutputLock {
    /// Spendable by the holder of the key hashing to this value.
    PubkeyHash(Hash256),
    /// Provably unspendable data carrier.
    Data(Vec<u8>),
}

impl OutputLock {
    /// The pubkey hash for payment locks; `None` for data carriers.
    pub fn pubkey_hash(&self) -> Option<Hash256> {
        match self {
            OutputLock::PubkeyHash(h) => Some(*h),
            OutputLock::Data(_) => None,
        }
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent.
    pub previous_output: OutPoint,
    /// Ed25519 signature (64 bytes). Empty while unsigned.
    pub signature: Vec<u8>,
    /// Ed25519 public key (32 bytes). Empty while unsigned.
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// An input referencing `outpoint` with blank unlocking data.
    pub fn unsigned(outpoint: OutPoint) -> Self {
        Self {
            previous_output: outpoint,
            signature: vec![],
            public_key: vec![],
        }
    }

    /// Whether the unlocking data has been filled in.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty() && !self.public_key.is_empty()
    }
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in satoshis. Zero for data carriers.
    pub value: u64,
    /// Spend condition.
    pub lock: OutputLock,
    /// Token payload, if this output carries one.
    pub token: Option<TokenData>,
}

impl TxOutput {
    /// A plain value output paying a pubkey hash.
    pub fn pay(value: u64, pubkey_hash: Hash256) -> Self {
        Self {
            value,
            lock: OutputLock::PubkeyHash(pubkey_hash),
            token: None,
        }
    }

    /// A token-carrying output paying a pubkey hash.
    pub fn pay_token(value: u64, pubkey_hash: Hash256, token: TokenData) -> Self {
        Self {
            value,
            lock: OutputLock::PubkeyHash(pubkey_hash),
            token: Some(token),
        }
    }

    /// A zero-value data carrier.
    pub fn data(bytes: Vec<u8>) -> Self {
        Self {
            value: 0,
            lock: OutputLock::Data(bytes),
            token: None,
        }
    }
}

/// A transaction transferring value and tokens between addresses.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Height or timestamp before which this tx is invalid.
    pub lock_time: u64,
}

impl Transaction {
    /// Canonical byte encoding of the transaction.
    ///
    /// Uses bincode with standard config for deterministic serialization;
    /// this is the byte length the fee estimator measures.
    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))
    }

    /// Length of the canonical encoding in bytes.
    pub fn encoded_size(&self) -> Result<usize, TransactionError> {
        Ok(self.encode()?.len())
    }

    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        Ok(Hash256(blake3::hash(&self.encode()?).into()))
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// An unspent transaction output as observed on chain.
///
/// Immutable once observed; identity is the outpoint.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Utxo {
    /// The outpoint identifying this UTXO.
    pub outpoint: OutPoint,
    /// Value in satoshis.
    pub value: u64,
    /// Pubkey hash of the owning address.
    pub pubkey_hash: Hash256,
    /// Token payload carried by this output, if any.
    pub token: Option<TokenData>,
}

impl Utxo {
    /// Whether this UTXO carries any token payload.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Whether this UTXO carries a token of the given category.
    pub fn has_category(&self, category: &Hash256) -> bool {
        self.token.as_ref().is_some_and(|t| t.category == *category)
    }

    /// The NFT carried by this UTXO, if any.
    pub fn nft(&self) -> Option<&NftData> {
        self.token.as_ref().and_then(|t| t.nft.as_ref())
    }
}
