use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

const MAINNET_NODES: &[&str] = &[
    "wss://xrplcluster.com",
    "wss://s1.ripple.com",
    "wss://s2.ripple.com",
];

const TESTNET_NODES: &[&str] = &[
    "wss://s.altnet.rippletest.net:51233",
    "wss://testnet.xrpl-labs.com",
    "wss://clio.altnet.rippletest.net:51233",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn default_nodes(&self) -> Vec<String> {
        let nodes = match self {
            Network::Mainnet => MAINNET_NODES,
            Network::Testnet => TESTNET_NODES,
        };
        nodes.iter().map(|n| n.to_string()).collect()
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(ConfigError::InvalidValue {
                field: "network",
                reason: format!("'{}' is not mainnet or testnet", other),
            }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Ordered endpoint list with a cursor that wraps around on rotation.
#[derive(Debug, Clone)]
pub struct NodeRing {
    nodes: Vec<String>,
    current: usize,
}

impl NodeRing {
    pub fn new(nodes: Vec<String>) -> Result<Self, ConfigError> {
        if nodes.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "nodes",
                reason: "at least one node endpoint is required".into(),
            });
        }
        for node in &nodes {
            validate_endpoint(node)?;
        }
        Ok(Self { nodes, current: 0 })
    }

    pub fn current(&self) -> &str {
        &self.nodes[self.current]
    }

    /// Advance to the next endpoint and return it.
    pub fn rotate(&mut self) -> &str {
        self.current = (self.current + 1) % self.nodes.len();
        &self.nodes[self.current]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }
}

fn validate_endpoint(node: &str) -> Result<(), ConfigError> {
    let url = Url::parse(node).map_err(|e| ConfigError::InvalidValue {
        field: "nodes",
        reason: format!("{}: {}", node, e),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(ConfigError::InvalidValue {
            field: "nodes",
            reason: format!("{}: unsupported scheme '{}'", node, scheme),
        }),
    }
}
