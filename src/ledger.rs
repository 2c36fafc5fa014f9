use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::amount::Amount;
use crate::assets::Trustline;
use crate::connection::ConnectionManager;
use crate::error::LedgerError;
use crate::history::TransactionRecord;
use crate::wallet::validate_address;

pub const MAX_LINE_PAGES: usize = 20;
const LINES_PAGE_LIMIT: u32 = 400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,
    pub balance_drops: u64,
    pub sequence: u32,
    pub owner_count: u32,
    /// False for an address the ledger has never seen (no reserve paid yet).
    pub funded: bool,
}

impl AccountInfo {
    pub fn unfunded(address: &str) -> Self {
        Self {
            address: address.to_string(),
            balance_drops: 0,
            sequence: 0,
            owner_count: 0,
            funded: false,
        }
    }

    pub fn balance(&self) -> Amount {
        Amount::Xrp {
            drops: self.balance_drops,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathAlternative {
    pub source_amount: Amount,
    pub paths: Value,
}

/// Ways to deliver `destination_amount`, cheapest first as the ledger orders them.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFindQuote {
    pub destination_amount: Amount,
    pub alternatives: Vec<PathAlternative>,
}

impl PathFindQuote {
    pub fn best(&self) -> Option<&PathAlternative> {
        self.alternatives.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub engine_result: String,
    pub engine_result_message: String,
    pub hash: Option<String>,
    pub accepted: bool,
}

/// Typed wrappers over the ledger commands the wallet uses.
#[derive(Clone)]
pub struct LedgerClient {
    manager: ConnectionManager,
    icon_base: String,
}

impl LedgerClient {
    pub fn new(manager: ConnectionManager, icon_base: impl Into<String>) -> Self {
        Self {
            manager,
            icon_base: icon_base.into(),
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub async fn account_info(&self, address: &str) -> Result<AccountInfo, LedgerError> {
        validate_address(address)?;
        let result = self
            .manager
            .request(json!({
                "command": "account_info",
                "account": address,
                "ledger_index": "validated",
                "strict": true
            }))
            .await?;

        let data = result
            .get("account_data")
            .ok_or_else(|| LedgerError::decode("account_info has no account_data"))?;

        let balance_drops = data
            .get("Balance")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::decode("Balance not found"))?
            .parse::<u64>()
            .map_err(|e| LedgerError::decode(format!("Failed to parse balance: {}", e)))?;

        Ok(AccountInfo {
            address: address.to_string(),
            balance_drops,
            sequence: u32_field(data, "Sequence"),
            owner_count: u32_field(data, "OwnerCount"),
            funded: true,
        })
    }

    /// All trustlines of `address`, following the pagination marker.
    pub async fn account_lines(&self, address: &str) -> Result<Vec<Trustline>, LedgerError> {
        validate_address(address)?;
        let mut lines = Vec::new();
        let mut marker: Option<Value> = None;

        for page in 0..MAX_LINE_PAGES {
            let mut request = json!({
                "command": "account_lines",
                "account": address,
                "ledger_index": "validated",
                "limit": LINES_PAGE_LIMIT
            });
            if let Some(marker) = marker.take() {
                request["marker"] = marker;
            }

            let result = self.manager.request(request).await?;
            let page_lines = result
                .get("lines")
                .and_then(Value::as_array)
                .ok_or_else(|| LedgerError::decode("account_lines has no lines"))?;
            for line in page_lines {
                lines.push(Trustline::from_line(line, &self.icon_base)?);
            }

            match result.get("marker") {
                Some(next) if !next.is_null() => {
                    debug!(address = %address, page, "Fetching next trustline page");
                    marker = Some(next.clone());
                }
                _ => return Ok(lines),
            }
        }

        warn!(
            address = %address,
            pages = MAX_LINE_PAGES,
            fetched = lines.len(),
            "Trustline pagination did not finish"
        );
        Err(LedgerError::decode(format!(
            "account_lines still paginating after {} pages",
            MAX_LINE_PAGES
        )))
    }

    /// Most recent transactions first.
    pub async fn account_tx(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        validate_address(address)?;
        let result = self
            .manager
            .request(json!({
                "command": "account_tx",
                "account": address,
                "ledger_index_min": -1,
                "ledger_index_max": -1,
                "limit": limit,
                "forward": false
            }))
            .await?;

        result
            .get("transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| LedgerError::decode("account_tx has no transactions"))?
            .iter()
            .map(|entry| TransactionRecord::from_entry(entry, address))
            .collect()
    }

    /// Quote what `source` must spend so that `destination` receives `deliver`.
    ///
    /// For a swap, source and destination are the same account.
    pub async fn ripple_path_find(
        &self,
        source: &str,
        destination: &str,
        deliver: &Amount,
    ) -> Result<PathFindQuote, LedgerError> {
        validate_address(source)?;
        validate_address(destination)?;
        if let Amount::Issued { issuer, .. } = deliver {
            validate_address(issuer)?;
        }
        if deliver.is_zero() {
            return Err(LedgerError::validation("amount to deliver must be positive"));
        }

        let result = self
            .manager
            .request(json!({
                "command": "ripple_path_find",
                "source_account": source,
                "destination_account": destination,
                "destination_amount": deliver.to_json()
            }))
            .await?;

        let alternatives = result
            .get("alternatives")
            .and_then(Value::as_array)
            .ok_or_else(|| LedgerError::decode("ripple_path_find has no alternatives"))?
            .iter()
            .map(|alt| {
                let source_amount = alt
                    .get("source_amount")
                    .ok_or_else(|| LedgerError::decode("alternative has no source_amount"))
                    .and_then(Amount::from_json)?;
                Ok(PathAlternative {
                    source_amount,
                    paths: alt.get("paths_computed").cloned().unwrap_or(Value::Null),
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let destination_amount = match result.get("destination_amount") {
            Some(v) => Amount::from_json(v)?,
            None => deliver.clone(),
        };

        Ok(PathFindQuote {
            destination_amount,
            alternatives,
        })
    }

    /// Submit an already-signed transaction blob.
    pub async fn submit(&self, tx_blob: &str) -> Result<SubmitResult, LedgerError> {
        let blob = tx_blob.trim();
        if blob.is_empty() || hex::decode(blob).is_err() {
            return Err(LedgerError::validation("transaction blob must be non-empty hex"));
        }

        let result = self
            .manager
            .request(json!({"command": "submit", "tx_blob": blob}))
            .await?;

        let engine_result = result
            .get("engine_result")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::decode("submit has no engine_result"))?
            .to_string();
        let engine_result_message = result
            .get("engine_result_message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // tes: applied; ter: queued/retry locally. Anything else did not go through.
        if !(engine_result.starts_with("tes") || engine_result.starts_with("ter")) {
            return Err(LedgerError::Request {
                code: engine_result,
                message: engine_result_message,
            });
        }

        Ok(SubmitResult {
            hash: result
                .get("tx_json")
                .and_then(|tx| tx.get("hash"))
                .and_then(Value::as_str)
                .map(str::to_string),
            accepted: result.get("accepted").and_then(Value::as_bool).unwrap_or(false),
            engine_result,
            engine_result_message,
        })
    }

    /// Current base fee in drops.
    pub async fn server_fee(&self) -> Result<u64, LedgerError> {
        let result = self.manager.request(json!({"command": "fee"})).await?;
        result
            .get("drops")
            .and_then(|d| d.get("base_fee"))
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::decode("fee has no drops.base_fee"))?
            .parse()
            .map_err(|e| LedgerError::decode(format!("invalid base fee: {}", e)))
    }
}

fn u32_field(data: &Value, name: &str) -> u32 {
    data.get(name)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}
