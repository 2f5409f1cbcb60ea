//! Address-keyed wallet cache.
//!
//! Maps derivation slots `(index, is_change)` to key material, addresses,
//! and last-known chain state. Entries are created lazily on first
//! derivation, indexed by address (plain and token-aware forms) for reverse
//! lookup, and persisted to the configured [`Store`] after a debounced idle
//! window. Only the persist step is deferred: derivation and lookups mutate
//! the in-memory tables synchronously, so an abandoned task leaves no
//! partial state behind.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use minnow_core::address::{Address, Network};
use minnow_core::crypto::KeyPair;
use minnow_core::types::{Hash256, Utxo};

use crate::config::WalletConfig;
use crate::debounce::Debouncer;
use crate::error::WalletError;
use crate::keys::{Seed, derive_keypair};
use crate::store::Store;

/// One transaction observed in an address's history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HistoryItem {
    pub txid: Hash256,
    /// Block height; non-positive for unconfirmed transactions.
    pub height: i64,
}

/// Cached state for one derived address.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub address: Address,
    pub token_address: Address,
    /// Secret key bytes; absent for watch-only entries.
    pub private_key: Option<[u8; 32]>,
    pub public_key: [u8; 32],
    pub public_key_hash: Hash256,
    pub index: u32,
    pub is_change: bool,
    /// Provider-reported script status, if the address has been watched.
    pub status: Option<String>,
    pub utxos: Vec<Utxo>,
    pub raw_history: Vec<HistoryItem>,
    pub last_confirmed_height: u64,
}

impl CacheEntry {
    /// The signing keypair, if this entry holds key material.
    pub fn keypair(&self) -> Option<KeyPair> {
        self.private_key.map(KeyPair::from_secret_bytes)
    }
}

/// The in-memory tables: the index table and the address reverse index.
#[derive(Default)]
struct CacheTables {
    entries: HashMap<(u32, bool), CacheEntry>,
    by_address: HashMap<String, (u32, bool)>,
}

impl CacheTables {
    fn index_entry(&mut self, entry: &CacheEntry) {
        let slot = (entry.index, entry.is_change);
        self.by_address.insert(entry.address.encode(), slot);
        self.by_address.insert(entry.token_address.encode(), slot);
    }
}

/// Address-keyed wallet cache with debounced persistence.
pub struct WalletCache {
    wallet_id: String,
    network: Network,
    seed: Seed,
    tables: Arc<Mutex<CacheTables>>,
    store: Arc<dyn Store>,
    debouncer: Debouncer,
}

impl WalletCache {
    /// Open the cache: resolve the backend, initialize it, and load any
    /// previously persisted tables.
    pub async fn open(config: &WalletConfig, seed: Seed) -> Result<Self, WalletError> {
        let store = config.store.open()?;
        store.init().await?;

        let mut tables = CacheTables::default();
        if let Some(json) = store.get_item(&entries_key(&config.wallet_id)).await? {
            let entries: Vec<CacheEntry> = serde_json::from_str(&json)
                .map_err(|e| WalletError::Serialization(e.to_string()))?;
            debug!(count = entries.len(), "loaded wallet cache entries");
            for entry in entries {
                tables.index_entry(&entry);
                tables.entries.insert((entry.index, entry.is_change), entry);
            }
        }

        Ok(Self {
            wallet_id: config.wallet_id.clone(),
            network: config.network,
            seed,
            tables: Arc::new(Mutex::new(tables)),
            store,
            debouncer: Debouncer::new(config.persist_delay),
        })
    }

    /// The entry at `(index, is_change)`, deriving it on first access.
    ///
    /// Derivation is deterministic, so repeated calls return bit-identical
    /// entries; only the first call mutates the tables and schedules a
    /// persist.
    pub fn get_by_index(&self, index: u32, is_change: bool) -> CacheEntry {
        let derived = {
            let mut tables = self.tables.lock();
            if let Some(entry) = tables.entries.get(&(index, is_change)) {
                return entry.clone();
            }

            let keypair = derive_keypair(&self.seed, is_change, index);
            let public = keypair.public_key();
            let address = Address::from_pubkey_hash(public.pubkey_hash(), self.network);
            let entry = CacheEntry {
                token_address: address.token_aware(),
                address,
                private_key: Some(keypair.secret_bytes()),
                public_key: public.to_bytes(),
                public_key_hash: public.pubkey_hash(),
                index,
                is_change,
                status: None,
                utxos: Vec::new(),
                raw_history: Vec::new(),
                last_confirmed_height: 0,
            };
            tables.index_entry(&entry);
            tables.entries.insert((index, is_change), entry.clone());
            entry
        };

        debug!(index, is_change, "derived wallet cache entry");
        self.schedule_persist();
        derived
    }

    /// Reverse lookup by address (plain or token-aware form), delegating to
    /// [`Self::get_by_index`]. `None` for addresses this wallet never
    /// derived.
    pub fn get(&self, address: &Address) -> Option<CacheEntry> {
        let slot = self.tables.lock().by_address.get(&address.encode()).copied();
        slot.map(|(index, is_change)| self.get_by_index(index, is_change))
    }

    /// The signing keypair owning `pubkey_hash`, if this cache derived it.
    pub fn signing_key_for(&self, pubkey_hash: &Hash256) -> Option<KeyPair> {
        self.tables
            .lock()
            .entries
            .values()
            .find(|e| e.public_key_hash == *pubkey_hash)
            .and_then(|e| e.keypair())
    }

    /// Update an entry's chain-observation fields. A no-op returning false
    /// if the address was never derived.
    pub fn set_status_and_utxos(
        &self,
        address: &Address,
        status: impl Into<String>,
        utxos: Vec<Utxo>,
        raw_history: Vec<HistoryItem>,
        last_confirmed_height: u64,
    ) -> bool {
        let updated = {
            let mut tables = self.tables.lock();
            let Some(&slot) = tables.by_address.get(&address.encode()) else {
                return false;
            };
            let entry = tables.entries.get_mut(&slot).expect("indexed entry exists");
            entry.status = Some(status.into());
            entry.utxos = utxos;
            entry.raw_history = raw_history;
            entry.last_confirmed_height = last_confirmed_height;
            true
        };
        if updated {
            self.schedule_persist();
        }
        updated
    }

    /// Write the tables to the store immediately, cancelling any pending
    /// debounced persist.
    pub async fn persist(&self) -> Result<(), WalletError> {
        self.debouncer.cancel();
        persist_tables(&self.wallet_id, &self.tables, self.store.as_ref()).await
    }

    /// Drop every entry and persist the empty tables.
    pub async fn reset(&self) -> Result<(), WalletError> {
        {
            let mut tables = self.tables.lock();
            tables.entries.clear();
            tables.by_address.clear();
        }
        self.persist().await
    }

    /// All cached entries, in derivation order.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let tables = self.tables.lock();
        let mut entries: Vec<CacheEntry> = tables.entries.values().cloned().collect();
        entries.sort_by_key(|e| (e.is_change, e.index));
        entries
    }

    /// Number of derived entries.
    pub fn len(&self) -> usize {
        self.tables.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().entries.is_empty()
    }

    /// Whether a debounced persist is waiting to fire.
    pub fn persist_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Schedule the debounced persist, replacing any pending one.
    fn schedule_persist(&self) {
        let wallet_id = self.wallet_id.clone();
        let tables = Arc::clone(&self.tables);
        let store = Arc::clone(&self.store);
        self.debouncer.schedule(async move {
            if let Err(e) = persist_tables(&wallet_id, &tables, store.as_ref()).await {
                warn!(error = %e, "debounced cache persist failed");
            }
        });
    }
}

impl std::fmt::Debug for WalletCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCache")
            .field("wallet_id", &self.wallet_id)
            .field("network", &self.network)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

fn entries_key(wallet_id: &str) -> String {
    format!("{wallet_id}:entries")
}

fn addresses_key(wallet_id: &str) -> String {
    format!("{wallet_id}:addresses")
}

/// Serialize and write both tables.
///
/// The snapshot is taken under the lock; the writes happen outside it. The
/// entries item is authoritative on load; the address table is written for
/// external readers of the store.
async fn persist_tables(
    wallet_id: &str,
    tables: &Mutex<CacheTables>,
    store: &dyn Store,
) -> Result<(), WalletError> {
    let (entries_json, addresses_json) = {
        let tables = tables.lock();
        let mut entries: Vec<&CacheEntry> = tables.entries.values().collect();
        entries.sort_by_key(|e| (e.is_change, e.index));
        let addresses: Vec<(&String, u32, bool)> = tables
            .by_address
            .iter()
            .map(|(addr, &(index, is_change))| (addr, index, is_change))
            .collect();
        (
            serde_json::to_string(&entries)
                .map_err(|e| WalletError::Serialization(e.to_string()))?,
            serde_json::to_string(&addresses)
                .map_err(|e| WalletError::Serialization(e.to_string()))?,
        )
    };

    store.set_item(&entries_key(wallet_id), &entries_json).await?;
    store
        .set_item(&addresses_key(wallet_id), &addresses_json)
        .await?;
    info!(wallet_id, "wallet cache persisted");
    Ok(())
}
