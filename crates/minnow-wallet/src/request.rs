//! Abstract send requests and fee-allocation policy.
//!
//! A transaction batches many [`SendRequest`]s. The union is closed: adding
//! a variant forces every match site in the engine to handle it.

use serde::{Deserialize, Serialize};

use minnow_core::address::Address;
use minnow_core::constants::COIN;
use minnow_core::types::{Hash256, NftData};

use crate::error::WalletError;

/// Satoshi value carried by token-transfer outputs.
///
/// Token outputs need a small satoshi value to exist at all; this is kept
/// just above the dust threshold.
pub const TOKEN_OUTPUT_VALUE: u64 = 1_000;

/// Denomination of a monetary amount.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    /// Whole coins (1 coin = 10^8 satoshis).
    Coin,
    /// Satoshis.
    Satoshi,
}

/// A monetary amount in a caller-chosen denomination.
///
/// Conversion to satoshis is checked: amounts that are negative, non-finite,
/// or do not land on an integer satoshi are rejected. Unit conversion is the
/// only place fractional satoshis can arise.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Amount {
    pub value: f64,
    pub unit: Unit,
}

impl Amount {
    /// An amount denominated in whole coins.
    pub fn coins(value: f64) -> Self {
        Self { value, unit: Unit::Coin }
    }

    /// An amount denominated in satoshis.
    pub fn satoshis(value: u64) -> Self {
        Self {
            value: value as f64,
            unit: Unit::Satoshi,
        }
    }

    /// Convert to an integer satoshi count.
    ///
    /// Fails with [`WalletError::FractionalValue`] if the conversion does
    /// not land on an integer, and [`WalletError::InvalidAmount`] for
    /// negative, non-finite, or overflowing values.
    pub fn to_satoshis(&self) -> Result<u64, WalletError> {
        if !self.value.is_finite() {
            return Err(WalletError::InvalidAmount(format!(
                "amount is not finite: {}",
                self.value
            )));
        }
        if self.value < 0.0 {
            return Err(WalletError::InvalidAmount(format!(
                "amount is negative: {}",
                self.value
            )));
        }
        let sats = match self.unit {
            Unit::Satoshi => self.value,
            Unit::Coin => self.value * COIN as f64,
        };
        if sats.fract() != 0.0 {
            return Err(WalletError::FractionalValue(sats));
        }
        if sats > u64::MAX as f64 {
            return Err(WalletError::InvalidAmount(format!(
                "amount overflows satoshi range: {sats}"
            )));
        }
        Ok(sats as u64)
    }
}

/// One abstract output requested by the caller.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum SendRequest {
    /// Plain value payment.
    PlainValue { address: Address, amount: Amount },
    /// Fungible and/or non-fungible token transfer.
    TokenTransfer {
        address: Address,
        category: Hash256,
        /// Fungible amount to move. `None` for pure NFT transfers.
        amount: Option<u64>,
        /// NFT to move. `None` for fungible-only transfers.
        nft: Option<NftData>,
    },
    /// Zero-value output carrying arbitrary bytes.
    DataOutput { data: Vec<u8> },
}

impl SendRequest {
    /// The satoshi value this request's output will carry.
    pub fn value_satoshis(&self) -> Result<u64, WalletError> {
        match self {
            SendRequest::PlainValue { amount, .. } => amount.to_satoshis(),
            SendRequest::TokenTransfer { .. } => Ok(TOKEN_OUTPUT_VALUE),
            SendRequest::DataOutput { .. } => Ok(0),
        }
    }

    /// The destination address, for value-bearing requests.
    pub fn address(&self) -> Option<&Address> {
        match self {
            SendRequest::PlainValue { address, .. } => Some(address),
            SendRequest::TokenTransfer { address, .. } => Some(address),
            SendRequest::DataOutput { .. } => None,
        }
    }

    /// Sum of the satoshi values of a batch of requests.
    pub fn total_satoshis(requests: &[SendRequest]) -> Result<u64, WalletError> {
        requests.iter().try_fold(0u64, |acc, r| {
            acc.checked_add(r.value_satoshis()?)
                .ok_or_else(|| WalletError::InvalidAmount("total amount overflow".into()))
        })
    }
}

/// Which output(s) absorb the network fee.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum FeePaidBy {
    /// Fee comes out of the change output.
    #[default]
    Change,
    /// Fee comes out of change returned to the source address.
    SourceAddress,
    /// Fee is split across the outputs at the given request indexes.
    SpecificOutputs(Vec<usize>),
    /// Fee is split evenly across all value-bearing recipients.
    EachRecipient,
    /// Change absorbs the fee first; any deficit cascades to the requests.
    ChangeThenRequests,
    /// Requests absorb the fee first; any remainder falls to change.
    RequestsThenChange,
}

impl FeePaidBy {
    /// Whether the selection phase must balance inputs against the required
    /// amount. Only change-funded fees need that guarantee up front.
    pub fn requires_sufficiency_check(&self) -> bool {
        matches!(self, FeePaidBy::Change)
    }
}

/// The token-level intent of a transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenOperation {
    /// Move existing tokens; conservation applies.
    #[default]
    Send,
    /// Create a new category.
    Genesis,
    /// Mint further tokens with a baton.
    Mint,
    /// Destroy tokens.
    Burn,
}
