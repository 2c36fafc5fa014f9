use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::StorageError;
use crate::wallet::{validate_address, Wallet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKind {
    Balance,
    Assets,
    Transactions,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Balance, CacheKind::Assets, CacheKind::Transactions];

    fn file_name(&self) -> &'static str {
        match self {
            CacheKind::Balance => "balance.json",
            CacheKind::Assets => "assets.json",
            CacheKind::Transactions => "transactions.json",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    value: Value,
}

/// File-backed store for wallets and per-address cached ledger data.
///
/// Layout: `<base>/<address>/wallet.json` plus `<base>/<address>/cache/<kind>.json`.
#[derive(Clone)]
pub struct Storage {
    base_path: PathBuf,
    ttl: CacheConfig,
}

impl Storage {
    pub fn new(base_path: impl Into<PathBuf>, ttl: CacheConfig) -> Self {
        Self {
            base_path: base_path.into(),
            ttl,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_path
    }

    /// Per-address directory. Only classic addresses are accepted so a key can never escape `base_path`.
    fn wallet_dir(&self, address: &str) -> Result<PathBuf, StorageError> {
        validate_address(address).map_err(|_| StorageError::InvalidAddress(address.to_string()))?;
        Ok(self.base_path.join(address))
    }

    fn cache_path(&self, address: &str, kind: CacheKind) -> Result<PathBuf, StorageError> {
        Ok(self.wallet_dir(address)?.join("cache").join(kind.file_name()))
    }

    pub fn save_wallet(&self, wallet: &Wallet) -> Result<(), StorageError> {
        let dir = self.wallet_dir(&wallet.address)?;
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(wallet)?;
        fs::write(dir.join("wallet.json"), json)?;
        debug!(address = %wallet.address, "Saved wallet");
        Ok(())
    }

    pub fn load_wallet(&self, address: &str) -> Result<Wallet, StorageError> {
        let path = self.wallet_dir(address)?.join("wallet.json");
        if !path.exists() {
            return Err(StorageError::WalletNotFound(address.to_string()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn wallet_exists(&self, address: &str) -> bool {
        self.wallet_dir(address)
            .map(|dir| dir.join("wallet.json").exists())
            .unwrap_or(false)
    }

    /// Addresses of every stored wallet, sorted.
    pub fn list_wallets(&self) -> Result<Vec<String>, StorageError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut addresses = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if validate_address(&name).is_ok() && entry.path().join("wallet.json").exists() {
                addresses.push(name);
            }
        }
        addresses.sort();
        Ok(addresses)
    }

    /// Remove the wallet and everything cached for it.
    pub fn delete_wallet(&self, address: &str) -> Result<(), StorageError> {
        let dir = self.wallet_dir(address)?;
        if dir.exists() {
            fs::remove_dir_all(dir)?;
            debug!(address = %address, "Deleted wallet data");
        }
        Ok(())
    }

    pub fn put<T: Serialize>(&self, address: &str, kind: CacheKind, value: &T) -> Result<(), StorageError> {
        self.put_at(address, kind, value, Utc::now())
    }

    pub fn put_at<T: Serialize>(
        &self,
        address: &str,
        kind: CacheKind,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let path = self.cache_path(address, kind)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let entry = CacheEntry {
            stored_at: now,
            expires_at: now + self.ttl.ttl(kind),
            value: serde_json::to_value(value)?,
        };
        fs::write(path, serde_json::to_string(&entry)?)?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, address: &str, kind: CacheKind) -> Result<Option<T>, StorageError> {
        self.get_at(address, kind, Utc::now())
    }

    /// Read a cached value as of `now`. Expired or unreadable entries are removed and read as absent.
    pub fn get_at<T: DeserializeOwned>(
        &self,
        address: &str,
        kind: CacheKind,
        now: DateTime<Utc>,
    ) -> Result<Option<T>, StorageError> {
        let path = self.cache_path(address, kind)?;
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)?;
        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(address = %address, ?kind, error = %e, "Discarding corrupt cache entry");
                fs::remove_file(&path)?;
                return Ok(None);
            }
        };

        if now >= entry.expires_at {
            debug!(address = %address, ?kind, "Cache entry expired");
            fs::remove_file(&path)?;
            return Ok(None);
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(address = %address, ?kind, error = %e, "Cached value has unexpected shape");
                fs::remove_file(&path)?;
                Ok(None)
            }
        }
    }

    pub fn clear(&self, address: &str) -> Result<(), StorageError> {
        for kind in CacheKind::ALL {
            let path = self.cache_path(address, kind)?;
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
