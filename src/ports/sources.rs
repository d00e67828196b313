//! Source port traits.
//!
//! The reconciler is generic over these three traits so its merge logic
//! can be exercised in tests with the mocks in [`crate::ports::mocks`]
//! instead of live endpoints.

use async_trait::async_trait;

use super::models::{ChainScanOutcome, SourceError, TokenCandidate};

/// The launchpad index: authoritative for descriptive metadata and the
/// `listed` flag, silent on precise graduation timing.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Fetch the current board sections, deduplicated by address.
    async fn fetch_board(&self) -> Result<Vec<TokenCandidate>, SourceError>;

    /// Look up a single coin by address. `Ok(None)` means the index
    /// answered and does not know the token.
    async fn lookup(&self, address: &str) -> Result<Option<TokenCandidate>, SourceError>;
}

/// Public DEX aggregator search: rich market data, weak identity and
/// timestamp confidence.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Keyword-search for tokens matching the factory fingerprint,
    /// enriched with pair-level market data where available.
    async fn search_graduated(&self) -> Result<Vec<TokenCandidate>, SourceError>;
}

/// Raw chain logs: the highest-confidence graduation timing signal.
#[async_trait]
pub trait ChainLogSource: Send + Sync {
    /// Scan forward from `checkpoint` (exclusive; `None` seeds the
    /// configured look-back window) and return decoded events plus the
    /// new checkpoint.
    async fn scan(&self, checkpoint: Option<u64>) -> Result<ChainScanOutcome, SourceError>;
}
