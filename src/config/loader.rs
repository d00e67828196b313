//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching
//! config.toml structure. Endpoint URLs can be overridden through
//! environment variables so deployments never need to edit the file.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::domain::ViewConfig;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub index: IndexSection,
    pub oracle: OracleSection,
    pub market: MarketSection,
    pub chain: ChainSection,
    pub reconciler: ReconcilerSection,
    #[serde(default)]
    pub view: ViewConfig,
    pub storage: StorageSection,
    pub bonding: BondingSection,
    pub logging: LoggingSection,
}

/// Launchpad GraphQL index
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSection {
    /// GraphQL endpoint URL
    pub endpoint: String,
    /// Gateway used to resolve relative IPFS image paths
    pub ipfs_gateway: String,
    /// Section fetch limits (verified / newly-created / graduating / listed)
    #[serde(default = "default_board_limit")]
    pub board_limit: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_board_limit() -> u32 {
    50
}

fn default_timeout_secs() -> u64 {
    15
}

impl IndexSection {
    /// Endpoint with environment variable override (INDEX_ENDPOINT)
    pub fn get_endpoint(&self) -> String {
        std::env::var("INDEX_ENDPOINT").unwrap_or_else(|_| self.endpoint.clone())
    }
}

/// Base-currency USD rate oracle
#[derive(Debug, Clone, Deserialize)]
pub struct OracleSection {
    /// Ticker endpoint returning {"price": "..."}
    pub endpoint: String,
    /// Symbol queried, e.g. "BNBUSDT"
    pub symbol: String,
    /// Cache TTL in seconds
    #[serde(default = "default_oracle_ttl")]
    pub ttl_secs: u64,
    /// Rate used until the first successful fetch
    pub fallback_price: f64,
}

fn default_oracle_ttl() -> u64 {
    60
}

/// DEX aggregator search / pair-info API
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSection {
    /// API base URL (no trailing slash)
    pub base_url: String,
    /// Chain slug used in pair-info paths, e.g. "bsc"
    pub chain_id: String,
    /// Factory address-suffix fingerprints (4 hex digits each)
    pub address_suffixes: Vec<String>,
    /// Addresses per pair-info batch call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between batches in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    30
}

fn default_batch_delay_ms() -> u64 {
    300
}

/// Chain RPC and graduation-event scanning
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Launch contract emitting the graduation event
    pub contract: String,
    /// topic0 signature of the graduation event
    pub graduation_topic: String,
    /// Topic index holding the token address (indexed parameter)
    #[serde(default = "default_token_topic_index")]
    pub token_topic_index: usize,
    /// Fallback 32-byte word offset into `data` when the topic is absent
    #[serde(default)]
    pub token_data_word: usize,
    /// Blocks per eth_getLogs chunk
    #[serde(default = "default_chunk_blocks")]
    pub chunk_blocks: u64,
    /// First-run look-back window in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,
    /// Approximate blocks per day on the target chain
    #[serde(default = "default_blocks_per_day")]
    pub blocks_per_day: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_topic_index() -> usize {
    1
}

fn default_chunk_blocks() -> u64 {
    10_000
}

fn default_lookback_days() -> u64 {
    3
}

fn default_blocks_per_day() -> u64 {
    // BSC produces a block roughly every 3 seconds.
    28_800
}

impl ChainSection {
    /// RPC URL with environment variable override (CHAIN_RPC_URL)
    pub fn get_rpc_url(&self) -> String {
        std::env::var("CHAIN_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }

    pub fn lookback_blocks(&self) -> u64 {
        self.lookback_days.saturating_mul(self.blocks_per_day)
    }
}

/// Reconciliation cycle scheduling
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerSection {
    /// Seconds between cycle starts (next cycle waits for the previous)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Placeholders retried against the index per cycle
    #[serde(default = "default_placeholder_budget")]
    pub placeholder_budget: usize,
}

fn default_interval_secs() -> u64 {
    20
}

fn default_placeholder_budget() -> usize {
    12
}

/// Durable registry storage
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// SQLite database path (supports ~ expansion)
    pub db_path: String,
    /// Records per upsert transaction
    #[serde(default = "default_upsert_batch")]
    pub upsert_batch: usize,
}

fn default_upsert_batch() -> usize {
    50
}

impl StorageSection {
    pub fn expanded_db_path(&self) -> String {
        shellexpand::tilde(&self.db_path).to_string()
    }
}

/// Bonding-curve numeric constants. Environment-specific: these mirror
/// the launch contract's parameters and must match the target deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct BondingSection {
    /// Fixed total supply every launchpad token is minted with
    pub total_supply: f64,
    /// Reserve target (base currency units) at which a token graduates
    pub bond_target: f64,
    /// Burn / zero addresses whose holdings count as burned
    pub burn_addresses: Vec<String>,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "index.endpoint cannot be empty".to_string(),
            ));
        }

        if self.oracle.fallback_price <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "oracle.fallback_price must be > 0, got {}",
                self.oracle.fallback_price
            )));
        }

        if self.market.address_suffixes.is_empty() {
            return Err(ConfigError::ValidationError(
                "market.address_suffixes cannot be empty".to_string(),
            ));
        }
        for suffix in &self.market.address_suffixes {
            if suffix.len() != 4 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::ValidationError(format!(
                    "address suffix must be 4 hex digits, got '{suffix}'"
                )));
            }
        }
        if self.market.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "market.batch_size must be > 0".to_string(),
            ));
        }

        if self.chain.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "chain.rpc_url cannot be empty".to_string(),
            ));
        }
        if !self.chain.contract.starts_with("0x") {
            return Err(ConfigError::ValidationError(format!(
                "chain.contract must be a 0x address, got '{}'",
                self.chain.contract
            )));
        }
        if !self.chain.graduation_topic.starts_with("0x")
            || self.chain.graduation_topic.len() != 66
        {
            return Err(ConfigError::ValidationError(
                "chain.graduation_topic must be a 0x-prefixed 32-byte hex string".to_string(),
            ));
        }
        if self.chain.chunk_blocks == 0 {
            return Err(ConfigError::ValidationError(
                "chain.chunk_blocks must be > 0".to_string(),
            ));
        }

        if self.reconciler.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "reconciler.interval_secs must be > 0".to_string(),
            ));
        }

        if self.view.cap == 0 {
            return Err(ConfigError::ValidationError(
                "view.cap must be > 0".to_string(),
            ));
        }

        if self.storage.db_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.db_path cannot be empty".to_string(),
            ));
        }
        if self.storage.upsert_batch == 0 {
            return Err(ConfigError::ValidationError(
                "storage.upsert_batch must be > 0".to_string(),
            ));
        }

        if self.bonding.total_supply <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "bonding.total_supply must be > 0, got {}",
                self.bonding.total_supply
            )));
        }
        if self.bonding.bond_target <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "bonding.bond_target must be > 0, got {}",
                self.bonding.bond_target
            )));
        }

        Ok(())
    }
}
