//! Wallet composition: cache, providers, and high-level send operations.
//!
//! The [`Wallet`] struct ties together the derivation cache, the network
//! provider contract, and the selection → fee → assembly → signing pipeline.
//! It also persists the master seed to an encrypted keystore file.

use std::path::Path;

use minnow_core::address::{Address, Network};
use minnow_core::types::Utxo;

use crate::builder::{BuiltTransaction, TransactionBuilder};
use crate::cache::WalletCache;
use crate::coin_selection::UtxoSelector;
use crate::config::WalletConfig;
use crate::encryption;
use crate::error::WalletError;
use crate::fee::FeeEstimator;
use crate::keys::Seed;
use crate::mnemonic;
use crate::provider::ChainProvider;
use crate::request::{Amount, FeePaidBy, SendRequest, TokenOperation};

/// Magic bytes identifying a Minnow keystore file.
pub const KEYSTORE_MAGIC: &[u8; 4] = b"MNWK";

/// Current keystore file format version.
pub const KEYSTORE_VERSION: u32 = 1;

/// Keystore file header serialized as JSON.
#[derive(serde::Serialize, serde::Deserialize)]
struct KeystoreHeader {
    magic: String,
    version: u32,
}

/// Encrypted keystore payload.
#[derive(serde::Serialize, serde::Deserialize)]
struct KeystorePayload {
    seed: [u8; 32],
}

/// A token-aware HD wallet.
pub struct Wallet {
    config: WalletConfig,
    seed: Seed,
    cache: WalletCache,
}

impl Wallet {
    /// Create a new wallet with a random seed.
    pub async fn create(config: WalletConfig) -> Result<Self, WalletError> {
        Self::from_seed(config, Seed::generate()).await
    }

    /// Create a wallet from an existing seed (deterministic recovery).
    pub async fn from_seed(config: WalletConfig, seed: Seed) -> Result<Self, WalletError> {
        let cache = WalletCache::open(&config, seed.clone()).await?;
        Ok(Self { config, seed, cache })
    }

    /// Create a wallet from a BIP-39 mnemonic phrase.
    pub async fn from_mnemonic(config: WalletConfig, phrase: &str) -> Result<Self, WalletError> {
        let seed = mnemonic::mnemonic_to_seed(phrase)?;
        Self::from_seed(config, seed).await
    }

    /// The 24-word backup phrase for this wallet's seed.
    pub fn mnemonic(&self) -> String {
        mnemonic::seed_to_mnemonic(&self.seed)
    }

    /// The network this wallet is configured for.
    pub fn network(&self) -> Network {
        self.config.network
    }

    /// The derivation cache backing this wallet.
    pub fn cache(&self) -> &WalletCache {
        &self.cache
    }

    /// Receive address at the given derivation index.
    pub fn receive_address(&self, index: u32) -> Address {
        self.cache.get_by_index(index, false).address
    }

    /// Token-aware receive address at the given derivation index.
    pub fn token_address(&self, index: u32) -> Address {
        self.cache.get_by_index(index, false).token_address
    }

    /// Change address at the given derivation index.
    pub fn change_address(&self, index: u32) -> Address {
        self.cache.get_by_index(index, true).address
    }

    /// Total satoshi balance across the wallet's derived addresses.
    pub async fn balance(&self, provider: &dyn ChainProvider) -> Result<u64, WalletError> {
        let utxos = self.gather_utxos(provider).await?;
        utxos.iter().try_fold(0u64, |acc, u| {
            acc.checked_add(u.value)
                .ok_or_else(|| WalletError::InvalidAmount("balance overflow".into()))
        })
    }

    /// The UTXOs selection would pick for `requests`, without building.
    pub async fn suitable_utxos(
        &self,
        provider: &dyn ChainProvider,
        requests: &[SendRequest],
        fee_paid_by: &FeePaidBy,
    ) -> Result<Vec<Utxo>, WalletError> {
        let available = self.gather_utxos(provider).await?;
        let rate = provider.relay_fee_per_byte().await?;
        self.select(&available, requests, fee_paid_by, rate)
    }

    /// Quote the exact fee for sending `requests`.
    pub async fn fee_amount(
        &self,
        provider: &dyn ChainProvider,
        requests: &[SendRequest],
        fee_paid_by: &FeePaidBy,
    ) -> Result<u64, WalletError> {
        let available = self.gather_utxos(provider).await?;
        let rate = provider.relay_fee_per_byte().await?;
        let selected = self.select(&available, requests, fee_paid_by, rate)?;
        let change_address = self.resolve_change_address(&selected, fee_paid_by);
        FeeEstimator::fee_amount(&selected, requests, fee_paid_by, &change_address, rate)
    }

    /// Quote the heuristic fee for sending `requests`.
    pub async fn fee_amount_simple(
        &self,
        provider: &dyn ChainProvider,
        requests: &[SendRequest],
        fee_paid_by: &FeePaidBy,
    ) -> Result<u64, WalletError> {
        let available = self.gather_utxos(provider).await?;
        let rate = provider.relay_fee_per_byte().await?;
        let selected = self.select(&available, requests, fee_paid_by, rate)?;
        Ok(FeeEstimator::fee_amount_simple(&selected, requests, true, rate))
    }

    /// Build, sign, and encode a transaction for `requests`.
    ///
    /// Runs the full pipeline: gather UTXOs, select inputs, measure the
    /// exact fee on the selection, assemble and sign.
    pub async fn send(
        &self,
        provider: &dyn ChainProvider,
        requests: &[SendRequest],
        fee_paid_by: &FeePaidBy,
    ) -> Result<BuiltTransaction, WalletError> {
        if requests.is_empty() {
            return Err(WalletError::Build("no send requests".into()));
        }

        let available = self.gather_utxos(provider).await?;
        let rate = provider.relay_fee_per_byte().await?;

        let selected = self.select(&available, requests, fee_paid_by, rate)?;
        let change_address = self.resolve_change_address(&selected, fee_paid_by);
        let fee = FeeEstimator::fee_amount(&selected, requests, fee_paid_by, &change_address, rate)?;

        TransactionBuilder::build(
            &selected,
            requests,
            None,
            fee,
            false,
            fee_paid_by,
            &change_address,
            Some(&self.cache),
        )
    }

    /// Sweep the wallet's plain value to `address`.
    ///
    /// Token-carrying UTXOs are never swept; losing tokens to a value sweep
    /// is unrecoverable.
    pub async fn send_max(
        &self,
        provider: &dyn ChainProvider,
        address: &Address,
    ) -> Result<BuiltTransaction, WalletError> {
        let available = self.gather_utxos(provider).await?;
        let plain: Vec<Utxo> = available.into_iter().filter(|u| !u.has_token()).collect();
        let rate = provider.relay_fee_per_byte().await?;

        let selected = UtxoSelector::select(
            &plain,
            &[],
            None,
            &[],
            TokenOperation::Send,
            &FeePaidBy::Change,
        )?;
        if selected.is_empty() {
            return Err(WalletError::Build("no spendable utxos".into()));
        }
        let total: u64 = selected.iter().map(|u| u.value).sum();

        let change_address = self.change_address(0);
        let draft_request = SendRequest::PlainValue {
            address: address.clone(),
            amount: Amount::satoshis(total),
        };
        let fee = FeeEstimator::fee_amount(
            &selected,
            std::slice::from_ref(&draft_request),
            &FeePaidBy::Change,
            &change_address,
            rate,
        )?;
        if fee >= total {
            return Err(WalletError::InsufficientFunds {
                required: fee,
                available: total,
            });
        }

        let request = SendRequest::PlainValue {
            address: address.clone(),
            amount: Amount::satoshis(total - fee),
        };
        TransactionBuilder::build(
            &selected,
            std::slice::from_ref(&request),
            None,
            fee,
            true,
            &FeePaidBy::Change,
            &change_address,
            Some(&self.cache),
        )
    }

    /// Save the wallet's seed to an encrypted keystore file.
    ///
    /// # File format
    /// ```text
    /// header_len (4 bytes LE) || header_json || encrypted_payload
    /// ```
    pub fn save_to_file(&self, path: &Path, password: &[u8]) -> Result<(), WalletError> {
        let header = KeystoreHeader {
            magic: String::from_utf8_lossy(KEYSTORE_MAGIC).to_string(),
            version: KEYSTORE_VERSION,
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;

        let payload = KeystorePayload {
            seed: *self.seed.as_bytes(),
        };
        let payload_json =
            serde_json::to_vec(&payload).map_err(|e| WalletError::Serialization(e.to_string()))?;
        let encrypted = encryption::encrypt(&payload_json, password)?;

        let header_len = header_json.len() as u32;
        let mut file_data = Vec::with_capacity(4 + header_json.len() + encrypted.len());
        file_data.extend_from_slice(&header_len.to_le_bytes());
        file_data.extend_from_slice(&header_json);
        file_data.extend_from_slice(&encrypted);

        std::fs::write(path, &file_data).map_err(|e| WalletError::IoError(e.to_string()))
    }

    /// Load a wallet from an encrypted keystore file.
    pub async fn load_from_file(
        config: WalletConfig,
        path: &Path,
        password: &[u8],
    ) -> Result<Self, WalletError> {
        let file_data = std::fs::read(path).map_err(|e| WalletError::IoError(e.to_string()))?;

        if file_data.len() < 4 {
            return Err(WalletError::CorruptedFile("file too short".into()));
        }
        let header_len = u32::from_le_bytes(file_data[..4].try_into().unwrap()) as usize;
        if file_data.len() < 4 + header_len {
            return Err(WalletError::CorruptedFile("header truncated".into()));
        }

        let header: KeystoreHeader = serde_json::from_slice(&file_data[4..4 + header_len])
            .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;
        if header.magic != String::from_utf8_lossy(KEYSTORE_MAGIC).as_ref() {
            return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
        }
        if header.version != KEYSTORE_VERSION {
            return Err(WalletError::CorruptedFile(format!(
                "unsupported version: {}",
                header.version
            )));
        }

        let payload_json = encryption::decrypt(&file_data[4 + header_len..], password)?;
        let payload: KeystorePayload = serde_json::from_slice(&payload_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid payload: {e}")))?;

        Self::from_seed(config, Seed::from_bytes(payload.seed)).await
    }

    /// Fetch the UTXOs of every derived address. The first receive slot is
    /// always derived, so a fresh wallet watches at least one address.
    async fn gather_utxos(&self, provider: &dyn ChainProvider) -> Result<Vec<Utxo>, WalletError> {
        self.cache.get_by_index(0, false);
        let mut utxos = Vec::new();
        for entry in self.cache.entries() {
            utxos.extend(provider.get_utxos(&entry.address).await?);
        }
        Ok(utxos)
    }

    /// Run selection with the heuristic fee bound over the available set.
    fn select(
        &self,
        available: &[Utxo],
        requests: &[SendRequest],
        fee_paid_by: &FeePaidBy,
        rate: f64,
    ) -> Result<Vec<Utxo>, WalletError> {
        let request_total = SendRequest::total_satoshis(requests)?;
        let fee_estimate = FeeEstimator::fee_amount_simple(available, requests, true, rate);
        let required = request_total
            .checked_add(fee_estimate)
            .ok_or_else(|| WalletError::InvalidAmount("required amount overflow".into()))?;
        UtxoSelector::select(
            available,
            &[],
            Some(required),
            requests,
            TokenOperation::Send,
            fee_paid_by,
        )
    }

    /// The change destination: the source address when the policy says so,
    /// else the first change-branch address.
    fn resolve_change_address(&self, selected: &[Utxo], fee_paid_by: &FeePaidBy) -> Address {
        match fee_paid_by {
            FeePaidBy::SourceAddress => selected
                .first()
                .map(|u| Address::from_pubkey_hash(u.pubkey_hash, self.config.network))
                .unwrap_or_else(|| self.change_address(0)),
            _ => self.change_address(0),
        }
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.config.network)
            .field("wallet_id", &self.config.wallet_id)
            .field("entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}
