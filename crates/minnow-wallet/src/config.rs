//! Wallet configuration.
//!
//! All backend and timing choices are made here, once, at construction;
//! nothing in the engine re-reads ambient flags at runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use minnow_core::address::Network;

use crate::error::WalletError;
use crate::store::{MemoryStore, RocksStore, Store};

/// Default idle window before a cache mutation is persisted.
pub const DEFAULT_PERSIST_DELAY: Duration = Duration::from_secs(2);

/// Which backend the wallet cache persists to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreConfig {
    /// In-memory map; contents are lost when the wallet is dropped.
    #[default]
    Memory,
    /// Embedded RocksDB database at the given path.
    Rocks { path: PathBuf },
}

impl StoreConfig {
    /// Resolve the backend. Called exactly once, when the cache is opened.
    pub fn open(&self) -> Result<Arc<dyn Store>, WalletError> {
        match self {
            StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreConfig::Rocks { path } => Ok(Arc::new(RocksStore::open(path)?)),
        }
    }
}

/// Configuration for a wallet instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfig {
    /// Network determining address prefixes.
    pub network: Network,
    /// Identifier namespacing this wallet's cache keys in the store.
    pub wallet_id: String,
    /// Persistence backend for the wallet cache.
    pub store: StoreConfig,
    /// Idle window before cache mutations are written to the store.
    pub persist_delay: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            wallet_id: "primary".to_string(),
            store: StoreConfig::Memory,
            persist_delay: DEFAULT_PERSIST_DELAY,
        }
    }
}

impl WalletConfig {
    /// A testnet configuration with an in-memory store.
    pub fn testnet(wallet_id: impl Into<String>) -> Self {
        Self {
            network: Network::Testnet,
            wallet_id: wallet_id.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_mainnet_memory() {
        let cfg = WalletConfig::default();
        assert_eq!(cfg.network, Network::Mainnet);
        assert_eq!(cfg.store, StoreConfig::Memory);
        assert_eq!(cfg.persist_delay, DEFAULT_PERSIST_DELAY);
    }

    #[test]
    fn testnet_helper_sets_network_and_id() {
        let cfg = WalletConfig::testnet("hot");
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.wallet_id, "hot");
    }

    #[test]
    fn memory_store_opens() {
        assert!(StoreConfig::Memory.open().is_ok());
    }

    #[test]
    fn rocks_store_opens_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreConfig::Rocks {
            path: dir.path().join("cache"),
        };
        assert!(cfg.open().is_ok());
    }

    #[test]
    fn config_is_clone_and_debug() {
        let cfg = WalletConfig::default();
        let cfg2 = cfg.clone();
        assert!(format!("{cfg2:?}").contains("WalletConfig"));
    }
}
