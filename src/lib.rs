//! XRP Ledger wallet client core.
//!
//! - [`connection`] - resilient connection to a rotating set of public nodes
//! - [`ledger`] - typed `account_info`, `account_lines`, `account_tx`,
//!   `ripple_path_find`, `submit` and `fee` requests
//! - [`wallet`] - key generation and restore (delegated to `xrpl-rust`)
//! - [`storage`] - wallet persistence and the per-address expiring cache
//! - [`service`] - cached reads for wallet views

pub mod amount;
pub mod assets;
pub mod config;
pub mod connection;
pub mod error;
pub mod history;
pub mod icons;
pub mod ledger;
pub mod nodes;
pub mod service;
pub mod storage;
pub mod wallet;

pub use config::Config;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{ConnectionError, Error, LedgerError, Result};
pub use service::WalletService;
pub use wallet::Wallet;
