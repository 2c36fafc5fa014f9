use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::amount::{drops_to_xrp, Amount};
use crate::assets::display_currency;
use crate::error::LedgerError;

/// Seconds between the Unix epoch and the ledger epoch (2000-01-01T00:00:00Z).
pub const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Failed(String),
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetChange {
    /// Signed, in display units; negative means the balance went down.
    pub value: BigDecimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Close time of the ledger; absent for transactions not yet in a closed ledger.
    pub timestamp: Option<DateTime<Utc>>,
    pub tx_type: String,
    pub description: String,
    pub status: TxStatus,
    pub fee_drops: u64,
    pub net_change: Option<NetChange>,
    pub hash: String,
}

pub fn ripple_time_to_utc(ripple_secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ripple_secs + RIPPLE_EPOCH_OFFSET, 0)
}

impl TransactionRecord {
    /// Build a record from one `account_tx` entry as seen by `account`.
    ///
    /// Accepts both the `tx` (API v1) and `tx_json` (API v2) layouts.
    pub fn from_entry(entry: &Value, account: &str) -> Result<Self, LedgerError> {
        let tx = entry
            .get("tx")
            .or_else(|| entry.get("tx_json"))
            .ok_or_else(|| LedgerError::decode("transaction entry has no tx"))?;
        let meta = entry.get("meta");

        let tx_type = str_field(tx, "TransactionType")?.to_string();
        let sender = str_field(tx, "Account")?;
        let outgoing = sender == account;

        let hash = tx
            .get("hash")
            .or_else(|| entry.get("hash"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let timestamp = match tx.get("date") {
            None | Some(Value::Null) => None,
            Some(date) => Some(
                date.as_i64()
                    .and_then(ripple_time_to_utc)
                    .ok_or_else(|| LedgerError::decode(format!("invalid transaction date {}", date)))?,
            ),
        };

        let fee_drops = tx
            .get("Fee")
            .and_then(Value::as_str)
            .and_then(|f| f.parse().ok())
            .unwrap_or(0);

        let validated = entry.get("validated").and_then(Value::as_bool).unwrap_or(true);
        let status = match meta
            .and_then(|m| m.get("TransactionResult"))
            .and_then(Value::as_str)
        {
            _ if !validated => TxStatus::Pending,
            Some("tesSUCCESS") => TxStatus::Success,
            Some(code) => TxStatus::Failed(code.to_string()),
            None => TxStatus::Pending,
        };

        let delivered = meta
            .and_then(|m| m.get("delivered_amount"))
            .filter(|v| v.as_str() != Some("unavailable"))
            .or_else(|| tx.get("Amount"))
            .map(Amount::from_json)
            .transpose()?;

        let description = describe(&tx_type, tx, outgoing, delivered.as_ref());
        let net_change = net_change(&tx_type, outgoing, &status, delivered.as_ref(), fee_drops);

        Ok(Self {
            timestamp,
            tx_type,
            description,
            status,
            fee_drops: if outgoing { fee_drops } else { 0 },
            net_change,
            hash,
        })
    }
}

fn str_field<'a>(value: &'a Value, name: &str) -> Result<&'a str, LedgerError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::decode(format!("transaction missing '{}'", name)))
}

fn describe(tx_type: &str, tx: &Value, outgoing: bool, delivered: Option<&Amount>) -> String {
    let amount = delivered
        .map(|a| a.to_string())
        .unwrap_or_else(|| "an amount".into());
    let text = |name: &str| tx.get(name).and_then(Value::as_str).unwrap_or("unknown");

    match tx_type {
        "Payment" if outgoing => format!("Sent {} to {}", amount, text("Destination")),
        "Payment" => format!("Received {} from {}", amount, text("Account")),
        "TrustSet" => {
            let limit = tx.get("LimitAmount");
            let currency = limit
                .and_then(|l| l.get("currency"))
                .and_then(Value::as_str)
                .map(display_currency)
                .unwrap_or_else(|| "unknown".into());
            let issuer = limit
                .and_then(|l| l.get("issuer"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let value = limit
                .and_then(|l| l.get("value"))
                .and_then(Value::as_str)
                .unwrap_or("0");
            if value == "0" {
                format!("Removed {} trustline to {}", currency, issuer)
            } else {
                format!("Set {} trustline to {} (limit {})", currency, issuer, value)
            }
        }
        "OfferCreate" => {
            let side = |name: &str| {
                tx.get(name)
                    .and_then(|v| Amount::from_json(v).ok())
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "unknown".into())
            };
            format!("Offered {} for {}", side("TakerGets"), side("TakerPays"))
        }
        "OfferCancel" => match tx.get("OfferSequence").and_then(Value::as_u64) {
            Some(seq) => format!("Cancelled offer #{}", seq),
            None => "Cancelled offer".into(),
        },
        "AccountSet" => "Updated account settings".into(),
        other => format!("{} transaction", other),
    }
}

fn net_change(
    tx_type: &str,
    outgoing: bool,
    status: &TxStatus,
    delivered: Option<&Amount>,
    fee_drops: u64,
) -> Option<NetChange> {
    let fee = drops_to_xrp(fee_drops);
    let succeeded = *status == TxStatus::Success;

    match (tx_type, delivered) {
        ("Payment", Some(amount)) if succeeded => {
            let value = amount.value();
            if !outgoing {
                return Some(NetChange {
                    value,
                    currency: amount.currency().to_string(),
                });
            }
            let value = match amount {
                Amount::Xrp { .. } => -(value + fee),
                Amount::Issued { .. } => -value,
            };
            Some(NetChange {
                value,
                currency: amount.currency().to_string(),
            })
        }
        // Senders always pay the fee, even when the transaction fails.
        _ if outgoing && fee_drops > 0 => Some(NetChange {
            value: -fee,
            currency: "XRP".into(),
        }),
        _ => None,
    }
}
