//! Raw DEX aggregator payload shapes, normalized at the adapter
//! boundary before reaching the reconciler.

use serde::Deserialize;

use crate::adapters::de::flexible_opt_f64;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub pairs: Vec<RawPair>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPair {
    #[serde(rename = "chainId", default)]
    pub chain_id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "pairAddress", default)]
    pub pair_address: Option<String>,
    #[serde(rename = "baseToken", default)]
    pub base_token: Option<RawBaseToken>,
    #[serde(rename = "priceUsd", default, deserialize_with = "flexible_opt_f64")]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub txns: Option<RawTxns>,
    #[serde(default)]
    pub volume: Option<RawWindowed>,
    #[serde(rename = "priceChange", default)]
    pub price_change: Option<RawWindowed>,
    #[serde(default)]
    pub liquidity: Option<RawLiquidity>,
    #[serde(rename = "marketCap", default, deserialize_with = "flexible_opt_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub fdv: Option<f64>,
    /// Milliseconds since epoch.
    #[serde(rename = "pairCreatedAt", default)]
    pub pair_created_at: Option<i64>,
    #[serde(default)]
    pub info: Option<RawPairInfo>,
    #[serde(default)]
    pub boosts: Option<RawBoosts>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBaseToken {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTxns {
    #[serde(default)]
    pub h24: Option<RawTxnCounts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTxnCounts {
    #[serde(default)]
    pub buys: Option<u32>,
    #[serde(default)]
    pub sells: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWindowed {
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLiquidity {
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPairInfo {
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(rename = "openGraph", default)]
    pub open_graph: Option<String>,
    #[serde(default)]
    pub websites: Vec<RawLink>,
    #[serde(default)]
    pub socials: Vec<RawSocial>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSocial {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBoosts {
    #[serde(default)]
    pub active: Option<u32>,
}

impl RawPair {
    pub fn base_address(&self) -> Option<String> {
        self.base_token
            .as_ref()
            .filter(|t| !t.address.is_empty())
            .map(|t| t.address.to_lowercase())
    }

    /// Paid-promotion heuristic: active boosts or uploaded branding.
    pub fn has_paid_promotion(&self) -> bool {
        if self.boosts.as_ref().and_then(|b| b.active).unwrap_or(0) > 0 {
            return true;
        }
        self.info
            .as_ref()
            .is_some_and(|i| i.header.is_some() || i.open_graph.is_some())
    }

    pub fn has_market_depth(&self) -> bool {
        self.liquidity.as_ref().and_then(|l| l.usd).is_some()
            && self.volume.as_ref().and_then(|v| v.h24).is_some()
    }
}
