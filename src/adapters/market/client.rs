//! DEX aggregator search adapter.
//!
//! Finds launchpad tokens on the open market by searching for the
//! factory's fixed address-suffix fingerprints, then enriches thin
//! results through batched pair-info lookups. Rich in market data,
//! weak on identity: everything it reports merges at the lowest
//! confidence tier.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use tracing::{debug, warn};

use super::types::{RawPair, SearchResponse};
use crate::config::MarketSection;
use crate::ports::models::{SourceError, TokenCandidate};
use crate::ports::sources::MarketSource;

pub struct MarketClient {
    http: Client,
    base_url: String,
    chain_id: String,
    suffixes: Vec<String>,
    batch_size: usize,
    batch_delay: Duration,
}

impl MarketClient {
    pub fn new(cfg: &MarketSection) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            chain_id: cfg.chain_id.clone(),
            suffixes: cfg.address_suffixes.iter().map(|s| s.to_lowercase()).collect(),
            batch_size: cfg.batch_size,
            batch_delay: Duration::from_millis(cfg.batch_delay_ms),
        })
    }

    async fn search(&self, keyword: &str) -> Result<Vec<RawPair>, SourceError> {
        let url = format!("{}/latest/dex/search?q={keyword}", self.base_url);
        let resp = self.http.get(&url).send().await?;
        if resp.status().as_u16() == 429 {
            return Err(SourceError::RateLimited(format!("search '{keyword}'")));
        }
        if !resp.status().is_success() {
            return Err(SourceError::Transport(format!(
                "search returned HTTP {}",
                resp.status()
            )));
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(body.pairs)
    }

    async fn pair_info(&self, addresses: &[String]) -> Result<Vec<RawPair>, SourceError> {
        let joined = addresses.join(",");
        let url = format!("{}/tokens/v1/{}/{joined}", self.base_url, self.chain_id);
        let resp = self.http.get(&url).send().await?;
        if resp.status().as_u16() == 429 {
            return Err(SourceError::RateLimited("pair-info batch".to_string()));
        }
        if !resp.status().is_success() {
            return Err(SourceError::Transport(format!(
                "pair-info returned HTTP {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }

    /// A pair is admissible when it lives on the target chain, its base
    /// token carries the factory fingerprint, and the pair has a
    /// creation timestamp to anchor the graduation estimate.
    fn admit(&self, pair: &RawPair) -> Option<String> {
        if pair.chain_id != self.chain_id {
            return None;
        }
        if pair.pair_created_at.is_none() {
            return None;
        }
        let address = pair.base_address()?;
        self.suffixes
            .iter()
            .any(|s| address.ends_with(s.as_str()))
            .then_some(address)
    }

    pub(crate) fn normalize(&self, address: &str, pair: &RawPair) -> TokenCandidate {
        let mut c = TokenCandidate::new(address, "market");

        if let Some(base) = &pair.base_token {
            c.name = base.name.clone();
            c.ticker = base.symbol.clone();
        }
        if let Some(info) = &pair.info {
            c.image = info.image_url.clone();
            c.website = info.websites.first().and_then(|l| l.url.clone());
            for social in &info.socials {
                match social.kind.as_str() {
                    "twitter" => c.twitter = social.url.clone(),
                    "telegram" => c.telegram = social.url.clone(),
                    _ => {}
                }
            }
        }

        c.price_usd = pair.price_usd;
        c.market_cap_usd = pair.market_cap.or(pair.fdv);
        c.liquidity_usd = pair.liquidity.as_ref().and_then(|l| l.usd);
        c.volume_24h_usd = pair.volume.as_ref().and_then(|v| v.h24);
        c.price_change_24h = pair.price_change.as_ref().and_then(|p| p.h24);
        if let Some(txns) = pair.txns.as_ref().and_then(|t| t.h24.as_ref()) {
            c.buys_24h = txns.buys;
            c.sells_24h = txns.sells;
        }
        c.dex_url = pair.url.clone().or_else(|| {
            Some(format!(
                "https://dexscreener.com/{}/{address}",
                self.chain_id
            ))
        });
        c.dex_paid = Some(pair.has_paid_promotion());

        c.graduated = true;
        c.graduated_at_estimate = pair
            .pair_created_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        c
    }
}

#[async_trait]
impl MarketSource for MarketClient {
    async fn search_graduated(&self) -> Result<Vec<TokenCandidate>, SourceError> {
        let mut by_token: HashMap<String, RawPair> = HashMap::new();
        let mut failures = 0usize;
        let mut last_err: Option<SourceError> = None;

        for (i, suffix) in self.suffixes.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }
            match self.search(suffix).await {
                Ok(pairs) => {
                    for pair in pairs {
                        if let Some(address) = self.admit(&pair) {
                            by_token.entry(address).or_insert(pair);
                        }
                    }
                }
                Err(err) => {
                    warn!(suffix = %suffix, error = %err, "market search batch failed, skipping");
                    failures += 1;
                    last_err = Some(err);
                }
            }
        }

        if failures == self.suffixes.len() {
            // Nothing came back at all: treat as source-down this cycle.
            return Err(last_err.unwrap_or_else(|| {
                SourceError::Transport("all market searches failed".to_string())
            }));
        }

        // Secondary lookups for tokens the search returned without
        // full market depth.
        let thin: Vec<String> = by_token
            .iter()
            .filter(|(_, pair)| !pair.has_market_depth())
            .map(|(address, _)| address.clone())
            .collect();

        for batch in thin.chunks(self.batch_size) {
            tokio::time::sleep(self.batch_delay).await;
            match self.pair_info(batch).await {
                Ok(pairs) => {
                    for pair in pairs {
                        let Some(address) = pair.base_address() else {
                            continue;
                        };
                        if pair.has_market_depth() || pair.pair_created_at.is_some() {
                            by_token.insert(address, pair);
                        }
                    }
                }
                Err(err) => {
                    warn!(batch = batch.len(), error = %err, "pair-info batch failed, skipping");
                }
            }
        }

        let candidates: Vec<TokenCandidate> = by_token
            .iter()
            .map(|(address, pair)| self.normalize(address, pair))
            .collect();
        debug!(count = candidates.len(), "market search done");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::market::types::{
        RawBaseToken, RawBoosts, RawLiquidity, RawPairInfo, RawTxnCounts, RawTxns, RawWindowed,
    };

    fn client() -> MarketClient {
        MarketClient::new(&MarketSection {
            base_url: "http://127.0.0.1:1".into(),
            chain_id: "bsc".into(),
            address_suffixes: vec!["f1a9".into(), "b1a9".into()],
            batch_size: 30,
            batch_delay_ms: 0,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn pair(address: &str, chain: &str, created_at: Option<i64>) -> RawPair {
        RawPair {
            chain_id: chain.into(),
            url: Some(format!("https://dexscreener.com/bsc/{address}")),
            pair_address: Some("0xpair".into()),
            base_token: Some(RawBaseToken {
                address: address.into(),
                name: Some("Bubble".into()),
                symbol: Some("BBL".into()),
            }),
            price_usd: Some(0.0005),
            txns: Some(RawTxns {
                h24: Some(RawTxnCounts {
                    buys: Some(12),
                    sells: Some(7),
                }),
            }),
            volume: Some(RawWindowed { h24: Some(40_000.0) }),
            price_change: Some(RawWindowed { h24: Some(-3.5) }),
            liquidity: Some(RawLiquidity { usd: Some(25_000.0) }),
            market_cap: Some(500_000.0),
            fdv: Some(510_000.0),
            pair_created_at: created_at,
            info: Some(RawPairInfo {
                image_url: Some("https://cdn.test/bbl.png".into()),
                header: None,
                open_graph: None,
                websites: vec![],
                socials: vec![],
            }),
            boosts: Some(RawBoosts { active: Some(0) }),
        }
    }

    const ADDR: &str = "0x00000000000000000000000000000000000ff1a9";

    #[test]
    fn admit_requires_chain_fingerprint_and_timestamp() {
        let c = client();
        assert_eq!(
            c.admit(&pair(ADDR, "bsc", Some(1_700_000_000_000))),
            Some(ADDR.to_string())
        );
        // Wrong chain.
        assert!(c.admit(&pair(ADDR, "ethereum", Some(1))).is_none());
        // No pair creation timestamp.
        assert!(c.admit(&pair(ADDR, "bsc", None)).is_none());
        // Suffix mismatch.
        assert!(c
            .admit(&pair(
                "0x000000000000000000000000000000000000beef",
                "bsc",
                Some(1)
            ))
            .is_none());
    }

    #[test]
    fn normalize_carries_market_fields_and_estimate() {
        let c = client();
        let candidate = c.normalize(ADDR, &pair(ADDR, "bsc", Some(1_700_000_000_000)));
        assert_eq!(candidate.liquidity_usd, Some(25_000.0));
        assert_eq!(candidate.volume_24h_usd, Some(40_000.0));
        assert_eq!(candidate.price_change_24h, Some(-3.5));
        assert_eq!(candidate.buys_24h, Some(12));
        assert_eq!(candidate.sells_24h, Some(7));
        assert_eq!(candidate.market_cap_usd, Some(500_000.0));
        assert!(candidate.graduated);
        assert_eq!(
            candidate.graduated_at_estimate.unwrap().timestamp(),
            1_700_000_000
        );
        assert_eq!(candidate.dex_paid, Some(false));
    }

    #[test]
    fn paid_promotion_detected_from_boosts_or_branding() {
        let mut p = pair(ADDR, "bsc", Some(1));
        assert!(!p.has_paid_promotion());
        p.boosts = Some(RawBoosts { active: Some(2) });
        assert!(p.has_paid_promotion());

        let mut p = pair(ADDR, "bsc", Some(1));
        p.boosts = None;
        p.info.as_mut().unwrap().header = Some("banner.png".into());
        assert!(p.has_paid_promotion());
    }

    #[test]
    fn search_payload_parses() {
        let json = format!(
            r#"{{"schemaVersion":"1.0.0","pairs":[{{
                "chainId":"bsc",
                "url":"https://dexscreener.com/bsc/x",
                "baseToken":{{"address":"{ADDR}","name":"Bubble","symbol":"BBL"}},
                "priceUsd":"0.00051",
                "txns":{{"h24":{{"buys":3,"sells":1}}}},
                "volume":{{"h24":123.4}},
                "priceChange":{{"h24":-1.2}},
                "liquidity":{{"usd":9999.5}},
                "marketCap":1000000,
                "pairCreatedAt":1700000000000,
                "boosts":{{"active":1}}
            }}]}}"#
        );
        let parsed: SearchResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.pairs.len(), 1);
        let p = &parsed.pairs[0];
        assert_eq!(p.price_usd, Some(0.00051));
        assert!(p.has_paid_promotion());
        assert!(p.has_market_depth());
    }
}
