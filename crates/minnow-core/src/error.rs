//! Error types for the Minnow protocol core.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("serialization: {0}")] Serialization(String),
    #[error("value overflow")] ValueOverflow,
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("commitment too long: {len} > {max}")] OversizedCommitment { len: usize, max: usize },
    #[error("source output count {sources} does not match input count {inputs}")]
    SourceOutputMismatch { sources: usize, inputs: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("public key hash does not match the source output")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid HRP")] InvalidHrp,
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid version: {0}")] InvalidVersion(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
    #[error("invalid hex: {0}")] InvalidHex(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("fungible amounts for category {category} do not balance: inputs {inputs}, outputs {outputs}")]
    FungibleMismatch { category: String, inputs: u64, outputs: u64 },
    #[error("{outputs} NFT output(s) for category {category} backed by only {inputs} NFT input(s) and no minting baton")]
    UnbackedNft { category: String, inputs: usize, outputs: usize },
    #[error("token amount overflow for category {category}")]
    AmountOverflow { category: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_fungible_mismatch() {
        let e = TokenError::FungibleMismatch {
            category: "aa".repeat(32),
            inputs: 10,
            outputs: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains("inputs 10"));
        assert!(msg.contains("outputs 7"));
    }

    #[test]
    fn display_oversized_commitment() {
        let e = TransactionError::OversizedCommitment { len: 41, max: 40 };
        assert_eq!(e.to_string(), "commitment too long: 41 > 40");
    }

    #[test]
    fn errors_clone_and_eq() {
        let e1 = CryptoError::PubkeyHashMismatch;
        assert_eq!(e1.clone(), e1);
    }
}
