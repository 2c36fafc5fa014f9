use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;

pub const DROPS_PER_XRP: u64 = 1_000_000;
const XRP_DECIMALS: i64 = 6;

pub fn drops_to_xrp(drops: u64) -> BigDecimal {
    BigDecimal::from(drops) / BigDecimal::from(DROPS_PER_XRP)
}

/// Parse a decimal XRP string into drops. Rejects negatives and sub-drop precision.
pub fn xrp_to_drops(xrp: &str) -> Result<u64, LedgerError> {
    let value = BigDecimal::from_str(xrp.trim())
        .map_err(|e| LedgerError::validation(format!("invalid XRP amount '{}': {}", xrp, e)))?;
    if value.is_negative() {
        return Err(LedgerError::validation(format!("negative XRP amount '{}'", xrp)));
    }
    let drops = value * BigDecimal::from(DROPS_PER_XRP);
    if !drops.is_integer() {
        return Err(LedgerError::validation(format!(
            "XRP amount '{}' has more than {} decimal places",
            xrp, XRP_DECIMALS
        )));
    }
    drops
        .with_scale(0)
        .to_u64()
        .ok_or_else(|| LedgerError::validation(format!("XRP amount '{}' out of range", xrp)))
}

pub fn format_xrp(drops: u64) -> String {
    let whole = drops / DROPS_PER_XRP;
    let frac = drops % DROPS_PER_XRP;
    if frac == 0 {
        format!("{} XRP", whole)
    } else {
        let frac = format!("{:06}", frac);
        format!("{}.{} XRP", whole, frac.trim_end_matches('0'))
    }
}

/// Plain decimal rendering without trailing zeros.
pub fn plain(value: &BigDecimal) -> String {
    let s = value.to_string();
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// A ledger amount: XRP in drops or an issued-currency value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    Xrp { drops: u64 },
    Issued {
        currency: String,
        issuer: String,
        value: BigDecimal,
    },
}

impl Amount {
    /// Decode rippled's amount encoding: a drops string, or `{currency, issuer, value}`.
    pub fn from_json(value: &Value) -> Result<Self, LedgerError> {
        match value {
            Value::String(drops) => drops
                .parse::<u64>()
                .map(|drops| Amount::Xrp { drops })
                .map_err(|e| LedgerError::decode(format!("invalid drops '{}': {}", drops, e))),
            Value::Object(obj) => {
                let field = |name: &str| {
                    obj.get(name)
                        .and_then(Value::as_str)
                        .ok_or_else(|| LedgerError::decode(format!("amount missing '{}'", name)))
                };
                let currency = field("currency")?;
                let raw = field("value")?;
                let value = BigDecimal::from_str(raw)
                    .map_err(|e| LedgerError::decode(format!("invalid value '{}': {}", raw, e)))?;
                if currency == "XRP" {
                    // Path-find results may express XRP in object form.
                    let drops = value * BigDecimal::from(DROPS_PER_XRP);
                    if !drops.is_integer() {
                        return Err(LedgerError::decode(format!(
                            "XRP value '{}' is finer than one drop",
                            raw
                        )));
                    }
                    let drops = drops
                        .with_scale(0)
                        .to_u64()
                        .ok_or_else(|| LedgerError::decode(format!("invalid XRP value '{}'", raw)))?;
                    return Ok(Amount::Xrp { drops });
                }
                Ok(Amount::Issued {
                    currency: currency.to_string(),
                    issuer: field("issuer")?.to_string(),
                    value,
                })
            }
            other => Err(LedgerError::decode(format!("unsupported amount: {}", other))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Amount::Xrp { drops } => Value::String(drops.to_string()),
            Amount::Issued {
                currency,
                issuer,
                value,
            } => serde_json::json!({
                "currency": currency,
                "issuer": issuer,
                "value": plain(value),
            }),
        }
    }

    /// Value in display units (XRP or the issued currency).
    pub fn value(&self) -> BigDecimal {
        match self {
            Amount::Xrp { drops } => drops_to_xrp(*drops),
            Amount::Issued { value, .. } => value.clone(),
        }
    }

    pub fn currency(&self) -> &str {
        match self {
            Amount::Xrp { .. } => "XRP",
            Amount::Issued { currency, .. } => currency,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Xrp { drops } => write!(f, "{}", format_xrp(*drops)),
            Amount::Issued {
                currency, value, ..
            } => write!(
                f,
                "{} {}",
                plain(value),
                crate::assets::display_currency(currency)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_between_drops_and_xrp() {
        assert_eq!(xrp_to_drops("1").unwrap(), 1_000_000);
        assert_eq!(xrp_to_drops("0.000001").unwrap(), 1);
        assert_eq!(xrp_to_drops("25.5").unwrap(), 25_500_000);
        assert_eq!(drops_to_xrp(1_500_000), BigDecimal::from_str("1.5").unwrap());
        assert_eq!(format_xrp(20_000_000), "20 XRP");
        assert_eq!(format_xrp(1_250_000), "1.25 XRP");
        assert_eq!(format_xrp(1), "0.000001 XRP");
    }

    #[test]
    fn rejects_bad_xrp_amounts() {
        assert!(xrp_to_drops("-1").is_err());
        assert!(xrp_to_drops("0.0000001").is_err());
        assert!(xrp_to_drops("ten").is_err());
    }

    #[test]
    fn decodes_ledger_amounts() {
        assert_eq!(
            Amount::from_json(&json!("12000000")).unwrap(),
            Amount::Xrp { drops: 12_000_000 }
        );

        let issued = Amount::from_json(&json!({
            "currency": "USD",
            "issuer": "rhub8VRN55s94qWKDv6jmDy1pUykJzF3wq",
            "value": "10.25"
        }))
        .unwrap();
        assert_eq!(issued.currency(), "USD");
        assert_eq!(issued.value(), BigDecimal::from_str("10.25").unwrap());
        assert_eq!(issued.to_string(), "10.25 USD");

        assert!(Amount::from_json(&json!({"currency": "USD"})).is_err());
        assert!(Amount::from_json(&json!(5)).is_err());
    }

    #[test]
    fn object_form_xrp_must_be_whole_drops() {
        assert_eq!(
            Amount::from_json(&json!({"currency": "XRP", "value": "1.5"})).unwrap(),
            Amount::Xrp { drops: 1_500_000 }
        );
        assert!(matches!(
            Amount::from_json(&json!({"currency": "XRP", "value": "0.0000001"})),
            Err(LedgerError::Decode(_))
        ));
    }
}
