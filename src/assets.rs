use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub name: String,
    pub symbol: String,
    pub icon_url: Option<String>,
}

/// One entry of `account_lines`, seen from the wallet's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trustline {
    pub currency: String,
    pub issuer: String,
    pub balance: BigDecimal,
    pub limit: BigDecimal,
    pub metadata: AssetMetadata,
}

struct KnownToken {
    name: &'static str,
    symbol: &'static str,
    icon: &'static str,
}

lazy_static! {
    static ref KNOWN_TOKENS: HashMap<String, KnownToken> = {
        let mut m = HashMap::new();
        m.insert(
            token_key("524C555344000000000000000000000000000000", "rMxCKbEDwqr76QuheSUMdEGf4B9xJ8m5De"),
            KnownToken { name: "Ripple USD", symbol: "RLUSD", icon: "https://cdn.bithomp.com/issued-token/rMxCKbEDwqr76QuheSUMdEGf4B9xJ8m5De/524C555344000000000000000000000000000000" },
        );
        m.insert(
            token_key("USD", "rhub8VRN55s94qWKDv6jmDy1pUykJzF3wq"),
            KnownToken { name: "GateHub USD", symbol: "USD", icon: "https://cdn.bithomp.com/issued-token/rhub8VRN55s94qWKDv6jmDy1pUykJzF3wq/USD" },
        );
        m.insert(
            token_key("EUR", "rhub8VRN55s94qWKDv6jmDy1pUykJzF3wq"),
            KnownToken { name: "GateHub EUR", symbol: "EUR", icon: "https://cdn.bithomp.com/issued-token/rhub8VRN55s94qWKDv6jmDy1pUykJzF3wq/EUR" },
        );
        m.insert(
            token_key("534F4C4F00000000000000000000000000000000", "rsoLo2S1kiGeCcn6hCUXVrCpGMWLrRrLZz"),
            KnownToken { name: "Sologenic", symbol: "SOLO", icon: "https://cdn.bithomp.com/issued-token/rsoLo2S1kiGeCcn6hCUXVrCpGMWLrRrLZz/534F4C4F00000000000000000000000000000000" },
        );
        m.insert(
            token_key("CSC", "rCSCManTZ8ME9EoLrSHHYKW8PPwWMgkwr"),
            KnownToken { name: "CasinoCoin", symbol: "CSC", icon: "https://cdn.bithomp.com/issued-token/rCSCManTZ8ME9EoLrSHHYKW8PPwWMgkwr/CSC" },
        );
        m
    };
}

fn token_key(currency: &str, issuer: &str) -> String {
    format!("{}/{}", issuer, currency)
}

/// Human form of a currency code.
///
/// Standard three-character codes pass through. 40-hex codes decode to ASCII
/// when printable; otherwise the first eight hex digits are shown.
pub fn display_currency(code: &str) -> String {
    if code.len() != 40 {
        return code.to_string();
    }
    match hex::decode(code) {
        Ok(bytes) => {
            let text: String = bytes
                .iter()
                .take_while(|b| **b != 0)
                .map(|b| *b as char)
                .collect();
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_graphic()) {
                text
            } else {
                format!("{}…", &code[..8])
            }
        }
        Err(_) => code.to_string(),
    }
}

/// Encode a display code into the ledger's currency field.
pub fn encode_currency(code: &str) -> Result<String, LedgerError> {
    let code = code.trim();
    if code.eq_ignore_ascii_case("XRP") {
        return Err(LedgerError::validation("XRP is not an issued currency"));
    }
    match code.len() {
        3 if code.chars().all(|c| c.is_ascii_alphanumeric()) => Ok(code.to_string()),
        40 if code.chars().all(|c| c.is_ascii_hexdigit()) => Ok(code.to_uppercase()),
        4..=20 if code.chars().all(|c| c.is_ascii_graphic()) => {
            let mut bytes = code.as_bytes().to_vec();
            bytes.resize(20, 0);
            Ok(hex::encode_upper(bytes))
        }
        _ => Err(LedgerError::validation(format!("invalid currency code '{}'", code))),
    }
}

pub fn metadata_for(currency: &str, issuer: &str, icon_base: &str) -> AssetMetadata {
    if let Some(known) = KNOWN_TOKENS.get(&token_key(currency, issuer)) {
        return AssetMetadata {
            name: known.name.to_string(),
            symbol: known.symbol.to_string(),
            icon_url: Some(known.icon.to_string()),
        };
    }
    let symbol = display_currency(currency);
    AssetMetadata {
        name: symbol.clone(),
        symbol,
        icon_url: Some(format!(
            "{}/{}/{}",
            icon_base.trim_end_matches('/'),
            issuer,
            currency
        )),
    }
}

impl Trustline {
    /// Build from one `account_lines` entry, where `account` is the issuer.
    pub fn from_line(line: &Value, icon_base: &str) -> Result<Self, LedgerError> {
        let field = |name: &str| {
            line.get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| LedgerError::decode(format!("trustline missing '{}'", name)))
        };
        let decimal = |name: &str| -> Result<BigDecimal, LedgerError> {
            let raw = field(name)?;
            BigDecimal::from_str(raw)
                .map_err(|e| LedgerError::decode(format!("invalid {} '{}': {}", name, raw, e)))
        };

        let currency = field("currency")?.to_string();
        let issuer = field("account")?.to_string();
        let metadata = metadata_for(&currency, &issuer, icon_base);

        Ok(Self {
            balance: decimal("balance")?,
            limit: decimal("limit")?,
            currency,
            issuer,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_hex_currency_codes() {
        assert_eq!(display_currency("USD"), "USD");
        assert_eq!(display_currency("534F4C4F00000000000000000000000000000000"), "SOLO");
        assert_eq!(
            display_currency("0158415500000000C1F76FF6ECB0BAC600000000"),
            "01584155…"
        );
    }

    #[test]
    fn encodes_currency_codes() {
        assert_eq!(encode_currency("USD").unwrap(), "USD");
        assert_eq!(
            encode_currency("SOLO").unwrap(),
            "534F4C4F00000000000000000000000000000000"
        );
        assert!(encode_currency("XRP").is_err());
        assert!(encode_currency("U$").is_err());
    }

    #[test]
    fn known_tokens_get_static_metadata() {
        let meta = metadata_for(
            "524C555344000000000000000000000000000000",
            "rMxCKbEDwqr76QuheSUMdEGf4B9xJ8m5De",
            "https://icons.example",
        );
        assert_eq!(meta.symbol, "RLUSD");
        assert_eq!(meta.name, "Ripple USD");
    }

    #[test]
    fn unknown_tokens_fall_back_to_icon_service() {
        let meta = metadata_for("ABC", "rIssuer", "https://icons.example/");
        assert_eq!(meta.symbol, "ABC");
        assert_eq!(meta.icon_url.as_deref(), Some("https://icons.example/rIssuer/ABC"));
    }

    #[test]
    fn parses_account_line() {
        let line = json!({
            "account": "rhub8VRN55s94qWKDv6jmDy1pUykJzF3wq",
            "balance": "12.5",
            "currency": "USD",
            "limit": "1000",
            "limit_peer": "0",
            "quality_in": 0,
            "quality_out": 0
        });
        let trustline = Trustline::from_line(&line, "https://icons.example").unwrap();
        assert_eq!(trustline.issuer, "rhub8VRN55s94qWKDv6jmDy1pUykJzF3wq");
        assert_eq!(trustline.balance, BigDecimal::from_str("12.5").unwrap());
        assert_eq!(trustline.metadata.name, "GateHub USD");

        assert!(Trustline::from_line(&json!({"currency": "USD"}), "x").is_err());
    }
}
