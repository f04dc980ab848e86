//! Configuration for a ledger node
//!
//! Watched keys are part of the node's explicit configuration rather than
//! ambient process state: apply-time notices fire for these identities and
//! for nothing else.

use crate::types::PublicKey;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ledger node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name used in logs
    pub service_name: String,

    /// Bound on the outbound proposal channel; sends block once full
    pub proposal_buffer: usize,

    /// Bound on the inbound commit feed
    pub commit_buffer: usize,

    /// Hex-encoded public keys whose activity this node reports on
    #[serde(default)]
    pub watched_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "currency-ledger".to_string(),
            proposal_buffer: 256,
            commit_buffer: 1024,
            watched_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(name) = std::env::var("LEDGER_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(size) = std::env::var("LEDGER_PROPOSAL_BUFFER") {
            config.proposal_buffer = size
                .parse()
                .map_err(|e| Error::Config(format!("bad LEDGER_PROPOSAL_BUFFER: {}", e)))?;
        }

        if let Ok(size) = std::env::var("LEDGER_COMMIT_BUFFER") {
            config.commit_buffer = size
                .parse()
                .map_err(|e| Error::Config(format!("bad LEDGER_COMMIT_BUFFER: {}", e)))?;
        }

        if let Ok(keys) = std::env::var("LEDGER_WATCHED_KEYS") {
            config.watched_keys = keys.split(',').map(str::to_string).collect();
        }

        Ok(config)
    }

    /// Parse the watched-key hex strings into ledger identities
    pub fn watched_keys(&self) -> Result<BTreeSet<PublicKey>> {
        self.watched_keys
            .iter()
            .map(|hex| PublicKey::from_hex(hex))
            .collect()
    }
}
