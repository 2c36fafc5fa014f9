use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::assets::Trustline;
use crate::config::Config;
use crate::connection::{ConnectionManager, Connector, WsConnector};
use crate::error::{LedgerError, Result};
use crate::history::TransactionRecord;
use crate::icons::{Icon, IconService};
use crate::ledger::{AccountInfo, LedgerClient};
use crate::storage::{CacheKind, Storage};
use crate::wallet::{validate_address, Wallet};

const ACCOUNT_NOT_FOUND: &str = "actNotFound";

/// Entry point for wallet views: cached reads over ledger requests.
#[derive(Clone)]
pub struct WalletService {
    ledger: LedgerClient,
    storage: Storage,
    icons: IconService,
}

impl WalletService {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: &Config, connector: Arc<dyn Connector>) -> Result<Self> {
        let manager = ConnectionManager::new(config.node_ring()?, config.connection.clone(), connector);
        Ok(Self {
            ledger: LedgerClient::new(manager, config.icon_url.clone()),
            storage: Storage::new(config.data_dir.clone(), config.cache.clone()),
            icons: IconService::new(Duration::from_secs(5)),
        })
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn create_wallet(&self) -> Result<Wallet> {
        let wallet = Wallet::generate()?;
        self.storage.save_wallet(&wallet)?;
        info!(address = %wallet.address, "Created wallet");
        Ok(wallet)
    }

    /// Restore from a family seed or a recovery phrase and persist it.
    pub fn restore_wallet(&self, secret: &str) -> Result<Wallet> {
        let secret = secret.trim();
        let wallet = if secret.contains(char::is_whitespace) {
            Wallet::from_mnemonic(secret)?
        } else {
            Wallet::from_seed(secret)?
        };
        self.storage.save_wallet(&wallet)?;
        info!(address = %wallet.address, "Restored wallet");
        Ok(wallet)
    }

    pub async fn balance(&self, address: &str, force: bool) -> Result<AccountInfo> {
        validate_address(address)?;
        if let Some(info) = self.cached(address, CacheKind::Balance, force) {
            return Ok(info);
        }
        let info = match self.ledger.account_info(address).await {
            Ok(info) => info,
            Err(e) if is_account_not_found(&e) => AccountInfo::unfunded(address),
            Err(e) => return Err(e.into()),
        };
        self.store(address, CacheKind::Balance, &info);
        Ok(info)
    }

    pub async fn assets(&self, address: &str, force: bool) -> Result<Vec<Trustline>> {
        validate_address(address)?;
        if let Some(lines) = self.cached(address, CacheKind::Assets, force) {
            return Ok(lines);
        }
        let lines = match self.ledger.account_lines(address).await {
            Ok(lines) => lines,
            Err(e) if is_account_not_found(&e) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        self.store(address, CacheKind::Assets, &lines);
        Ok(lines)
    }

    pub async fn history(
        &self,
        address: &str,
        limit: u32,
        force: bool,
    ) -> Result<Vec<TransactionRecord>> {
        validate_address(address)?;
        if let Some(records) = self.cached::<Vec<TransactionRecord>>(address, CacheKind::Transactions, force) {
            if records.len() >= limit as usize {
                return Ok(records.into_iter().take(limit as usize).collect());
            }
        }
        let records = match self.ledger.account_tx(address, limit).await {
            Ok(records) => records,
            Err(e) if is_account_not_found(&e) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        self.store(address, CacheKind::Transactions, &records);
        Ok(records)
    }

    pub async fn icon(&self, trustline: &Trustline) -> Icon {
        self.icons.fetch(&trustline.metadata).await
    }

    /// Forget the wallet and its cached data, and drop the connection.
    pub async fn reset(&self, address: &str) -> Result<()> {
        validate_address(address)?;
        self.storage.delete_wallet(address)?;
        self.ledger.manager().disconnect().await;
        info!(address = %address, "Wallet reset");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.ledger.manager().disconnect().await;
    }

    fn cached<T: DeserializeOwned>(&self, address: &str, kind: CacheKind, force: bool) -> Option<T> {
        if force {
            return None;
        }
        match self.storage.get(address, kind) {
            Ok(value) => value,
            Err(e) => {
                warn!(address = %address, ?kind, error = %e, "Cache read failed");
                None
            }
        }
    }

    fn store<T: Serialize>(&self, address: &str, kind: CacheKind, value: &T) {
        if let Err(e) = self.storage.put(address, kind, value) {
            warn!(address = %address, ?kind, error = %e, "Cache write failed");
        }
    }
}

fn is_account_not_found(err: &LedgerError) -> bool {
    matches!(err, LedgerError::Request { code, .. } if code == ACCOUNT_NOT_FOUND)
}
