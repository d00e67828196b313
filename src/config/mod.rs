//! Configuration loading and validation.

mod loader;

pub use loader::{
    load_config, BondingSection, ChainSection, Config, ConfigError, IndexSection, LoggingSection,
    MarketSection, OracleSection, ReconcilerSection, StorageSection,
};
