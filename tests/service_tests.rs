mod support;

use serde_json::json;
use support::{
    ledger_error, node_urls, success, MockConnector, GENESIS_ADDRESS, GENESIS_SEED, RLUSD_ISSUER,
};
use tempfile::TempDir;
use xrpl_wallet::config::ConnectionConfig;
use xrpl_wallet::{Config, ConnectionState, Error, LedgerError, WalletService};

fn service(connector: &std::sync::Arc<MockConnector>) -> (TempDir, WalletService) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        nodes: node_urls(2),
        data_dir: dir.path().to_path_buf(),
        connection: ConnectionConfig {
            idle_timeout_secs: 5,
            ..ConnectionConfig::default()
        },
        ..Config::default()
    };
    let service = WalletService::with_connector(&config, connector.clone()).unwrap();
    (dir, service)
}

/// `account_tx` result holding exactly as many payments as the request asks for.
fn payments(request: &serde_json::Value) -> serde_json::Value {
    let limit = request["limit"].as_u64().unwrap_or(0);
    let transactions: Vec<_> = (0..limit)
        .map(|i| {
            json!({
                "tx": {
                    "TransactionType": "Payment",
                    "Account": RLUSD_ISSUER,
                    "Destination": GENESIS_ADDRESS,
                    "Amount": "1000000",
                    "Fee": "12",
                    "date": 1000 - i,
                    "hash": format!("HASH{}", i)
                },
                "meta": {"TransactionResult": "tesSUCCESS", "delivered_amount": "1000000"},
                "validated": true
            })
        })
        .collect();
    success(json!({"account": GENESIS_ADDRESS, "transactions": transactions}))
}

fn funded_account() -> serde_json::Value {
    success(json!({
        "account_data": {"Balance": "30000000", "Sequence": 1, "OwnerCount": 0}
    }))
}

#[tokio::test(start_paused = true)]
async fn balance_is_served_from_cache() {
    let connector = MockConnector::new()
        .with_handler(|_| Ok(funded_account()))
        .into_arc();
    let (_dir, service) = service(&connector);

    let first = service.balance(GENESIS_ADDRESS, false).await.unwrap();
    let second = service.balance(GENESIS_ADDRESS, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.balance_drops, 30_000_000);
    assert_eq!(connector.sent().len(), 1);

    service.balance(GENESIS_ADDRESS, true).await.unwrap();
    assert_eq!(connector.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_account_is_unfunded() {
    let connector = MockConnector::new()
        .with_handler(|_| Ok(ledger_error("actNotFound", "Account not found.")))
        .into_arc();
    let (_dir, service) = service(&connector);

    let info = service.balance(GENESIS_ADDRESS, false).await.unwrap();
    assert!(!info.funded);
    assert_eq!(info.balance_drops, 0);

    let lines = service.assets(GENESIS_ADDRESS, false).await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test(start_paused = true)]
async fn connection_failure_is_retryable() {
    let connector = MockConnector::new()
        .with_outcome(|_, node| {
            Err(xrpl_wallet::ConnectionError::Io(format!("{node}: unreachable")))
        })
        .into_arc();
    let (_dir, service) = service(&connector);

    let err = service.balance(GENESIS_ADDRESS, false).await.unwrap_err();

    assert!(err.is_retryable());
    assert!(err
        .to_string()
        .starts_with("Failed to connect after maximum attempts"));
    assert_eq!(connector.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn assets_carry_token_metadata() {
    let connector = MockConnector::new()
        .with_handler(|_| {
            Ok(success(json!({
                "lines": [{
                    "account": RLUSD_ISSUER,
                    "currency": "524C555344000000000000000000000000000000",
                    "balance": "5",
                    "limit": "100"
                }]
            })))
        })
        .into_arc();
    let (_dir, service) = service(&connector);

    let lines = service.assets(GENESIS_ADDRESS, false).await.unwrap();

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].metadata.symbol, "RLUSD");

    let cached = service.assets(GENESIS_ADDRESS, false).await.unwrap();
    assert_eq!(cached[0].metadata.symbol, "RLUSD");
    assert_eq!(connector.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn restore_and_reset() {
    let connector = MockConnector::new()
        .with_handler(|_| Ok(funded_account()))
        .into_arc();
    let (_dir, service) = service(&connector);

    let wallet = service.restore_wallet(GENESIS_SEED).unwrap();
    assert_eq!(wallet.address, GENESIS_ADDRESS);
    assert!(service.storage().wallet_exists(GENESIS_ADDRESS));

    service.balance(GENESIS_ADDRESS, false).await.unwrap();
    assert_eq!(service.ledger().manager().state(), ConnectionState::Connected);

    service.reset(GENESIS_ADDRESS).await.unwrap();

    assert!(!service.storage().wallet_exists(GENESIS_ADDRESS));
    assert_eq!(service.ledger().manager().state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn generated_wallet_restores_from_phrase() {
    let connector = MockConnector::new().into_arc();
    let (_dir, service) = service(&connector);

    let wallet = service.create_wallet().unwrap();
    let phrase = wallet.seed_phrase().unwrap();
    service.reset(&wallet.address).await.unwrap();

    let restored = service.restore_wallet(&phrase).unwrap();

    assert_eq!(restored.address, wallet.address);
    assert_eq!(restored.seed, wallet.seed);
    assert_eq!(service.storage().list_wallets().unwrap(), vec![wallet.address]);
}

#[tokio::test(start_paused = true)]
async fn history_serves_cached_prefix() {
    let connector = MockConnector::new()
        .with_handler(|request| Ok(payments(request)))
        .into_arc();
    let (_dir, service) = service(&connector);

    let first = service.history(GENESIS_ADDRESS, 3, false).await.unwrap();
    assert_eq!(first.len(), 3);

    let shorter = service.history(GENESIS_ADDRESS, 2, false).await.unwrap();
    assert_eq!(shorter, first[..2].to_vec());
    assert_eq!(connector.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn history_refetches_when_cache_is_too_short() {
    let connector = MockConnector::new()
        .with_handler(|request| Ok(payments(request)))
        .into_arc();
    let (_dir, service) = service(&connector);

    service.history(GENESIS_ADDRESS, 2, false).await.unwrap();
    let longer = service.history(GENESIS_ADDRESS, 5, false).await.unwrap();

    assert_eq!(longer.len(), 5);
    let sent = connector.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1]["limit"], 5);
}

#[tokio::test(start_paused = true)]
async fn history_of_unknown_account_is_empty() {
    let connector = MockConnector::new()
        .with_handler(|_| Ok(ledger_error("actNotFound", "Account not found.")))
        .into_arc();
    let (_dir, service) = service(&connector);

    let records = service.history(GENESIS_ADDRESS, 10, false).await.unwrap();

    assert!(records.is_empty());
}

fn is_validation(err: &Error) -> bool {
    matches!(err, Error::Ledger(LedgerError::Validation(_)))
}

#[tokio::test(start_paused = true)]
async fn reset_refuses_paths_outside_the_data_dir() {
    let root = TempDir::new().unwrap();
    let data_dir = root.path().join("data");
    let sibling = root.path().join("keep.txt");
    std::fs::write(&sibling, "keep").unwrap();

    let connector = MockConnector::new().into_arc();
    let config = Config {
        nodes: node_urls(2),
        data_dir: data_dir.clone(),
        ..Config::default()
    };
    let service = WalletService::with_connector(&config, connector.clone()).unwrap();
    service.restore_wallet(GENESIS_SEED).unwrap();

    for address in ["..", "", ".", "../data"] {
        let err = service.reset(address).await.unwrap_err();
        assert!(is_validation(&err), "{address:?}: {err}");
    }

    assert!(sibling.exists());
    assert!(data_dir.exists());
    assert!(service.storage().wallet_exists(GENESIS_ADDRESS));
}

#[tokio::test(start_paused = true)]
async fn reads_reject_malformed_addresses_before_touching_disk() {
    let root = TempDir::new().unwrap();
    let outside = root.path().join("x").join("cache");
    std::fs::create_dir_all(&outside).unwrap();
    std::fs::write(outside.join("balance.json"), "{corrupt").unwrap();

    let connector = MockConnector::new()
        .with_handler(|_| Ok(funded_account()))
        .into_arc();
    let config = Config {
        nodes: node_urls(2),
        data_dir: root.path().join("data"),
        ..Config::default()
    };
    let service = WalletService::with_connector(&config, connector.clone()).unwrap();

    let err = service.balance("../x", false).await.unwrap_err();
    assert!(is_validation(&err));
    let err = service.assets("x", false).await.unwrap_err();
    assert!(is_validation(&err));
    let err = service.history("", 5, false).await.unwrap_err();
    assert!(is_validation(&err));

    assert!(outside.join("balance.json").exists());
    assert_eq!(connector.calls(), 0);
}
