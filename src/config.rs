use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use crate::error::ConfigError;
use crate::nodes::{Network, NodeRing};
use crate::storage::CacheKind;

const DEFAULT_ICON_URL: &str = "https://cdn.bithomp.com/issued-token";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: Network,
    /// Endpoint override; empty means the network's public node list.
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_icon_url")]
    pub icon_url: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./wallets")
}

fn default_icon_url() -> String {
    DEFAULT_ICON_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::default(),
            nodes: Vec::new(),
            connection: ConnectionConfig::default(),
            cache: CacheConfig::default(),
            data_dir: default_data_dir(),
            icon_url: default_icon_url(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `XRPL_*` variables resolved by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(network) = lookup("XRPL_NETWORK") {
            config.network = network.parse()?;
        }
        if let Some(nodes) = lookup("XRPL_NODES") {
            config.nodes = nodes
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        if let Some(dir) = lookup("XRPL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("XRPL_ICON_URL") {
            config.icon_url = url;
        }
        if let Some(level) = lookup("XRPL_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("XRPL_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Some(idle) = lookup("XRPL_IDLE_TIMEOUT_SECS") {
            config.connection.idle_timeout_secs =
                idle.parse().map_err(|e| ConfigError::InvalidValue {
                    field: "idle_timeout_secs",
                    reason: format!("{}", e),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&contents)
    }

    pub fn parse_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.node_ring()?;
        let icon = Url::parse(&self.icon_url).map_err(|e| ConfigError::InvalidValue {
            field: "icon_url",
            reason: format!("'{}': {}", self.icon_url, e),
        })?;
        if !matches!(icon.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "icon_url",
                reason: format!("unsupported scheme '{}'", icon.scheme()),
            });
        }
        self.logging.validate()
    }

    pub fn nodes(&self) -> Vec<String> {
        if self.nodes.is_empty() {
            self.network.default_nodes()
        } else {
            self.nodes.clone()
        }
    }

    pub fn node_ring(&self) -> Result<NodeRing, ConfigError> {
        NodeRing::new(self.nodes())
    }
}

/// Connection manager timing and retry limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Quiet period after which the socket is dropped.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Total connection attempts before giving up; defaults to twice the node count.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_request_retries")]
    pub request_retries: u32,
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_request_timeout_ms() -> u64 {
    20_000
}

const fn default_idle_timeout_secs() -> u64 {
    300
}

const fn default_initial_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_request_retries() -> u32 {
    3
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_attempts: None,
            request_retries: default_request_retries(),
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_attempts_for(&self, node_count: usize) -> u32 {
        self.max_attempts
            .unwrap_or((node_count as u32).saturating_mul(2))
            .max(1)
    }
}

/// Per-kind cache lifetimes in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_balance_ttl_secs")]
    pub balance_ttl_secs: i64,
    #[serde(default = "default_assets_ttl_secs")]
    pub assets_ttl_secs: i64,
    #[serde(default = "default_transactions_ttl_secs")]
    pub transactions_ttl_secs: i64,
}

const fn default_balance_ttl_secs() -> i64 {
    60
}

const fn default_assets_ttl_secs() -> i64 {
    300
}

const fn default_transactions_ttl_secs() -> i64 {
    120
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            balance_ttl_secs: default_balance_ttl_secs(),
            assets_ttl_secs: default_assets_ttl_secs(),
            transactions_ttl_secs: default_transactions_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self, kind: CacheKind) -> chrono::Duration {
        let secs = match kind {
            CacheKind::Balance => self.balance_ttl_secs,
            CacheKind::Assets => self.assets_ttl_secs,
            CacheKind::Transactions => self.transactions_ttl_secs,
        };
        chrono::Duration::seconds(secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` overrides `level`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "log_format",
                reason: format!("'{}' is not one of pretty, json", self.format),
            });
        }
        EnvFilter::try_new(&self.level).map_err(|e| ConfigError::InvalidValue {
            field: "log_level",
            reason: format!("'{}': {}", self.level, e),
        })?;
        Ok(())
    }

    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        if self.format == "json" {
            fmt().json().with_env_filter(filter).init();
        } else {
            fmt().with_env_filter(filter).init();
        }
    }
}
