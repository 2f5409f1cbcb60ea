//! Pluggable key-value persistence for the wallet cache.
//!
//! Backends implement simple string key-value semantics behind the [`Store`]
//! trait: an in-memory map for tests and ephemeral wallets, and an embedded
//! RocksDB database for durable ones. The backend is chosen once, at
//! construction, via [`StoreConfig`](crate::config::StoreConfig).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{DB, Options};

use crate::error::WalletError;

/// String key-value persistence contract.
#[async_trait]
pub trait Store: Send + Sync {
    /// Prepare the backend for use.
    async fn init(&self) -> Result<(), WalletError>;

    /// Fetch the value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>, WalletError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), WalletError>;
}

/// Ephemeral in-memory backend.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self) -> Result<(), WalletError> {
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Durable RocksDB backend.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl Store for RocksStore {
    async fn init(&self) -> Result<(), WalletError> {
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, WalletError> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| WalletError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let value = String::from_utf8(bytes)
                    .map_err(|e| WalletError::Storage(format!("non-utf8 value: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.db
            .put(key.as_bytes(), value.as_bytes())
            .map_err(|e| WalletError::Storage(e.to_string()))
    }
}
