//! # minnow-wallet — token-aware UTXO wallet engine.
//!
//! Given a set of spendable UTXOs, a batch of abstract send requests, and a
//! fee policy, this crate selects a sufficient input set, computes the
//! network fee, assembles protocol outputs with change, and produces a
//! signed, encoded transaction, preserving token conservation and
//! respecting the dust threshold.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` taxonomy
//! - [`request`] — send requests, amounts, fee policy
//! - [`coin_selection`] — token-aware UTXO selection
//! - [`fee`] — heuristic and precise fee estimation
//! - [`outputs`] — fee allocation and change assembly
//! - [`builder`] — transaction construction, signing, encoding
//! - [`keys`] — seed and branch/index key derivation
//! - [`cache`] — address-keyed wallet cache with debounced persistence
//! - [`store`] — pluggable key-value persistence backends
//! - [`debounce`] — cancel-and-reschedule task primitive
//! - [`config`] — wallet and store configuration
//! - [`provider`] — network provider contract
//! - [`mnemonic`] — BIP-39 seed backup
//! - [`encryption`] — AES-256-GCM keystore encryption
//! - [`wallet`] — high-level wallet composition

pub mod builder;
pub mod cache;
pub mod coin_selection;
pub mod config;
pub mod debounce;
pub mod encryption;
pub mod error;
pub mod fee;
pub mod keys;
pub mod mnemonic;
pub mod outputs;
pub mod provider;
pub mod request;
pub mod store;
pub mod wallet;

// Re-exports for convenient access
pub use builder::{BuiltTransaction, TransactionBuilder};
pub use cache::{CacheEntry, HistoryItem, WalletCache};
pub use coin_selection::UtxoSelector;
pub use config::{StoreConfig, WalletConfig};
pub use error::WalletError;
pub use fee::FeeEstimator;
pub use keys::Seed;
pub use outputs::OutputAssembler;
pub use provider::ChainProvider;
pub use request::{Amount, FeePaidBy, SendRequest, TokenOperation, Unit};
pub use wallet::Wallet;
