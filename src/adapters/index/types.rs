//! Raw GraphQL payload shapes for the launchpad index.
//!
//! These types exist only inside the adapter: they are normalized into
//! [`crate::ports::models::TokenCandidate`] before anything else sees
//! them.

use serde::Deserialize;

use crate::adapters::de::flexible_opt_f64;

/// GraphQL envelope. A populated `errors` array means the whole
/// response is unusable for this cycle.
#[derive(Debug, Deserialize)]
pub struct GqlEnvelope<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GqlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GqlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct BoardData {
    #[serde(rename = "boardV2")]
    pub board_v2: Board,
}

#[derive(Debug, Default, Deserialize)]
pub struct Board {
    pub verified: Option<BoardSection>,
    #[serde(rename = "newlyCreated")]
    pub newly_created: Option<BoardSection>,
    pub graduating: Option<BoardSection>,
    pub listed: Option<BoardSection>,
}

#[derive(Debug, Deserialize)]
pub struct BoardSection {
    #[serde(default)]
    pub coins: Vec<RawCoin>,
}

#[derive(Debug, Deserialize)]
pub struct ListedData {
    #[serde(default)]
    pub coins: Vec<RawCoin>,
}

#[derive(Debug, Deserialize)]
pub struct CoinData {
    pub coin: Option<RawCoin>,
}

#[derive(Debug, Deserialize)]
pub struct RawCoin {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub listed: bool,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<i64>,
    /// Market cap in base-currency units.
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub marketcap: Option<f64>,
    /// Curve reserve in base-currency units.
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub reserve: Option<f64>,
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub supply: Option<f64>,
    /// Tax as a fraction (0.02 = 2%).
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub tax: Option<f64>,
    #[serde(default)]
    pub beneficiary: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(rename = "nHolders", default)]
    pub n_holders: Option<u32>,
    #[serde(default)]
    pub holders: Option<Vec<RawHolder>>,
    #[serde(default)]
    pub metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct RawHolder {
    pub holder: Option<String>,
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
}
