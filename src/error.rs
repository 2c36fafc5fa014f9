use thiserror::Error;

/// Failures while establishing or using the node connection.
///
/// Cloneable so a single in-flight connection attempt can hand the same
/// outcome to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection to {node} timed out")]
    Timeout { node: String },

    #[error("permission denied by {node}: {reason}")]
    PermissionDenied { node: String, reason: String },

    #[error("protocol error from {node}: {reason}")]
    Protocol { node: String, reason: String },

    #[error("socket closed: {0}")]
    Closed(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Failed to connect after maximum attempts ({attempts})")]
    Exhausted { attempts: u32, last: Box<ConnectionError> },
}

impl ConnectionError {
    /// Whether the failed node should be abandoned for the next one.
    ///
    /// Only plain timeouts are retried against the same node.
    pub fn rotates_node(&self) -> bool {
        !matches!(self, ConnectionError::Timeout { .. })
    }

    /// Whether a request failing this way may be retried on a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::Timeout { .. } | ConnectionError::Closed(_) | ConnectionError::Io(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("ledger returned {code}: {message}")]
    Request { code: String, message: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        LedgerError::Decode(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Invalid wallet address: {0:?}")]
    InvalidAddress(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Top-level error for wallet operations that touch both the ledger and local storage.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Ledger(LedgerError::Connection(err))
    }
}

impl Error {
    /// Whether offering the user a manual "try again" makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Ledger(LedgerError::Connection(_)))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
