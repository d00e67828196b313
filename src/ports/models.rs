//! Normalized data shapes shared by all source ports.
//!
//! Every adapter converts its raw payloads into these types at its own
//! boundary, so the reconciler never inspects source-specific JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a source can surface for a cycle. None of these are fatal:
/// the reconciler logs them and retains the prior registry state for
/// the affected source until the next polling cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, timeout, connection reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered but reported errors in-band
    /// (e.g. a GraphQL `errors` array).
    #[error("service error: {0}")]
    Service(String),

    /// A batch or request was rejected for rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A payload or log entry could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Transport(err.to_string())
    }
}

/// A normalized token observation from the index or market source.
///
/// All fields except the address are optional: each source fills what it
/// actually knows and leaves the rest `None`, so the merge step can tell
/// "source did not report" apart from "source reported zero".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenCandidate {
    /// Canonical lowercase hex token address.
    pub address: String,
    /// Board section or origin tag ("verified", "listed", "lookup", ...).
    pub section: String,

    // Identity
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub creator: Option<String>,
    pub beneficiary: Option<String>,
    pub created_at: Option<DateTime<Utc>>,

    // Market
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub buys_24h: Option<u32>,
    pub sells_24h: Option<u32>,
    pub holders: Option<u32>,
    pub dex_url: Option<String>,
    pub dex_paid: Option<bool>,

    // Bonding state
    pub reserve: Option<f64>,
    pub bonding_progress_pct: Option<f64>,
    pub tax_rate_pct: Option<f64>,
    pub dev_hold_pct: Option<f64>,
    pub burn_pct: Option<f64>,
    pub listed: Option<bool>,

    /// Whether this source considers the token graduated.
    pub graduated: bool,
    /// Low-confidence graduation time (e.g. DEX pair creation).
    /// Applied only when no better timestamp exists.
    pub graduated_at_estimate: Option<DateTime<Utc>>,
}

impl TokenCandidate {
    pub fn new(address: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            address: address.into().to_lowercase(),
            section: section.into(),
            ..Self::default()
        }
    }
}

/// A graduation event decoded from a chain log. Highest-confidence
/// timing signal in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraduationEvent {
    /// Canonical lowercase hex token address.
    pub address: String,
    /// Block the event was emitted in.
    pub block_number: u64,
    /// Transaction hash, when the node supplied one.
    pub tx_hash: Option<String>,
    /// Block timestamp of the graduation.
    pub graduated_at: DateTime<Utc>,
}

/// Result of one chain scan pass.
#[derive(Debug, Clone, Default)]
pub struct ChainScanOutcome {
    /// Decoded graduation events, fingerprint-filtered.
    pub events: Vec<GraduationEvent>,
    /// Last block covered by an attempted chunk. Monotonic: the caller
    /// must never move its stored checkpoint backwards.
    pub checkpoint: u64,
}
