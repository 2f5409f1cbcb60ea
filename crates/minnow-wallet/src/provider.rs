//! Network provider contract.
//!
//! The engine never talks to the network itself; a caller-supplied provider
//! delivers the UTXO set and the relay fee rate. Electrum-style clients,
//! indexer backends, and test fixtures all fit behind this trait.

use async_trait::async_trait;

use minnow_core::address::Address;
use minnow_core::types::Utxo;

use crate::error::WalletError;

/// Chain data supplied by an external network client.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// The spendable UTXOs currently held by `address`.
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, WalletError>;

    /// The relay fee rate in satoshis per byte.
    async fn relay_fee_per_byte(&self) -> Result<f64, WalletError>;
}
