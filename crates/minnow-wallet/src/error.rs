//! Wallet error types.

use minnow_core::error::{AddressError, CryptoError, TokenError, TransactionError};
use minnow_core::types::{Hash256, NftCapability};
use thiserror::Error;

/// Errors that can occur in wallet operations.
///
/// Recoverable variants carry the structured data a caller needs to present
/// an actionable message (amounts, the offending category). The engine never
/// retries internally; every failure is raised at the point of detection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    /// Selection could not meet the requested value plus fee.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the selection had to cover, in satoshis.
        required: u64,
        /// Amount the available UTXOs summed to, in satoshis.
        available: u64,
    },

    /// No UTXO matches a token transfer request through any fallback.
    #[error("no suitable token utxo: category {category}, capability {capability:?}, commitment {commitment:?}")]
    MissingTokenUtxo {
        category: Hash256,
        capability: Option<NftCapability>,
        commitment: Option<String>,
    },

    /// No explicit key and no cache-resolved key for an input address.
    #[error("no signing key for input owned by {0}")]
    MissingSigningKey(String),

    /// A send amount did not resolve to an integer satoshi count.
    #[error("not an integer satoshi amount: {0}")]
    FractionalValue(f64),

    /// Invalid monetary amount (negative, non-finite, or overflowing).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The transaction structure was rejected during assembly.
    #[error("build error: {0}")]
    Build(String),

    /// Post-build token conservation check failed.
    #[error(transparent)]
    TokenValidation(#[from] TokenError),

    /// Backing store failure.
    #[error("storage: {0}")]
    Storage(String),

    /// Network provider failure.
    #[error("provider: {0}")]
    Provider(String),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Wrong password for a keystore file.
    #[error("invalid password")]
    InvalidPassword,

    /// Keystore file is corrupted or has an unsupported format.
    #[error("corrupted file: {0}")]
    CorruptedFile(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// Decryption failure.
    #[error("decryption: {0}")]
    Decryption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Cryptographic error from minnow-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Transaction encoding error from minnow-core.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Address decoding error from minnow-core.
    #[error(transparent)]
    Address(#[from] AddressError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let e = WalletError::InsufficientFunds {
            required: 10_150,
            available: 10_000,
        };
        assert_eq!(
            e.to_string(),
            "insufficient funds: required 10150, available 10000"
        );
    }

    #[test]
    fn display_missing_token_utxo_full() {
        let e = WalletError::MissingTokenUtxo {
            category: Hash256([0xAB; 32]),
            capability: Some(NftCapability::Minting),
            commitment: Some("00".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("category"));
        assert!(msg.contains("Minting"));
        assert!(msg.contains("00"));
    }

    #[test]
    fn display_fractional_value() {
        let e = WalletError::FractionalValue(100.5);
        assert_eq!(e.to_string(), "not an integer satoshi amount: 100.5");
    }

    #[test]
    fn from_token_error() {
        let t = TokenError::UnbackedNft {
            category: "ff".repeat(32),
            inputs: 0,
            outputs: 1,
        };
        let w: WalletError = t.clone().into();
        assert_eq!(w, WalletError::TokenValidation(t));
    }

    #[test]
    fn from_crypto_error() {
        let w: WalletError = CryptoError::PubkeyHashMismatch.into();
        assert!(matches!(w, WalletError::Crypto(_)));
    }
}
