//! Fee estimation.
//!
//! Two models, both returning an integer satoshi fee rounded up:
//!
//! - **Heuristic** — a closed-form byte-size model over fixed per-input and
//!   per-output costs plus token overheads. Cheap, monotone, and an
//!   approximation: token commitment lengths make real encodings variable.
//! - **Precise** — build a complete draft transaction with a placeholder
//!   key and zero fee, encode it, and price the exact byte length. Used
//!   whenever exactness matters, in particular right before final signing.

use minnow_core::address::Address;
use minnow_core::crypto::KeyPair;
use minnow_core::types::{TokenData, Utxo};

use crate::builder::TransactionBuilder;
use crate::error::WalletError;
use crate::request::{FeePaidBy, SendRequest};

/// Byte cost of a plain input in the heuristic model.
pub const INPUT_SIZE: usize = 148;

/// Byte cost of a plain output in the heuristic model.
pub const OUTPUT_SIZE: usize = 34;

/// Fixed per-transaction overhead in the heuristic model.
pub const TX_OVERHEAD: usize = 10;

/// Byte cost of the token prefix on a token-carrying input or output.
pub const TOKEN_PREFIX_SIZE: usize = 34;

/// Byte cost of the fungible amount field, when an amount is present.
pub const TOKEN_AMOUNT_SIZE: usize = 9;

/// Byte cost of the NFT capability and commitment-length fields.
pub const NFT_PREFIX_SIZE: usize = 2;

/// Secret bytes of the throwaway key used to sign draft transactions.
/// Signature length is constant, so any key measures the same.
const PLACEHOLDER_KEY: [u8; 32] = [0x01; 32];

/// Heuristic and precise fee models.
pub struct FeeEstimator;

impl FeeEstimator {
    /// Closed-form fee estimate.
    ///
    /// `include_change` accounts for the change output the final
    /// transaction is expected to keep. Holding the rate constant, the
    /// estimate never decreases when inputs or outputs are added.
    pub fn fee_amount_simple(
        inputs: &[Utxo],
        requests: &[SendRequest],
        include_change: bool,
        fee_rate: f64,
    ) -> u64 {
        let mut size = TX_OVERHEAD;

        for input in inputs {
            size += INPUT_SIZE + Self::token_size(input.token.as_ref());
        }
        for request in requests {
            size += Self::request_size(request);
        }
        if include_change {
            size += OUTPUT_SIZE;
        }

        (size as f64 * fee_rate).ceil() as u64
    }

    /// Exact fee: build and encode a zero-fee draft of the transaction and
    /// price its real byte length, plus a one-satoshi rounding margin.
    pub fn fee_amount(
        inputs: &[Utxo],
        requests: &[SendRequest],
        fee_paid_by: &FeePaidBy,
        change_address: &Address,
        fee_rate: f64,
    ) -> Result<u64, WalletError> {
        let placeholder = KeyPair::from_secret_bytes(PLACEHOLDER_KEY);
        let draft = TransactionBuilder::build(
            inputs,
            requests,
            Some(&placeholder),
            0,
            false,
            fee_paid_by,
            change_address,
            None,
        )?;
        Ok((draft.encoded.len() as f64 * fee_rate).ceil() as u64 + 1)
    }

    /// Heuristic byte cost of one request's output.
    fn request_size(request: &SendRequest) -> usize {
        match request {
            SendRequest::PlainValue { .. } => OUTPUT_SIZE,
            SendRequest::DataOutput { data } => OUTPUT_SIZE + data.len(),
            SendRequest::TokenTransfer { amount, nft, .. } => {
                let mut size = OUTPUT_SIZE + TOKEN_PREFIX_SIZE;
                if amount.is_some() {
                    size += TOKEN_AMOUNT_SIZE;
                }
                if let Some(nft) = nft {
                    size += NFT_PREFIX_SIZE + nft.commitment.len();
                }
                size
            }
        }
    }

    /// Heuristic byte cost of an input's token payload.
    fn token_size(token: Option<&TokenData>) -> usize {
        match token {
            None => 0,
            Some(t) => {
                let mut size = TOKEN_PREFIX_SIZE;
                if t.amount > 0 {
                    size += TOKEN_AMOUNT_SIZE;
                }
                if let Some(nft) = &t.nft {
                    size += NFT_PREFIX_SIZE + nft.commitment.len();
                }
                size
            }
        }
    }
}
