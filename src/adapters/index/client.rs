//! Launchpad index GraphQL client.
//!
//! Authoritative source for token identity, bonding state and the
//! `listed` flag. Any transport failure or in-band `errors` array is
//! surfaced as a [`SourceError`]; the reconciler then skips the index
//! contribution for the cycle without touching prior state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::types::{BoardData, CoinData, GqlEnvelope, ListedData, RawCoin};
use crate::adapters::oracle::PriceOracle;
use crate::config::{BondingSection, IndexSection};
use crate::ports::models::{SourceError, TokenCandidate};
use crate::ports::sources::IndexSource;

const COIN_FIELDS: &str = "\
    name address symbol listed createdAt \
    marketcap(round: 18) reserve(round: 18) supply(round: 18) \
    tax(round: 4) beneficiary creator nHolders \
    holders { holder amount } \
    metadata { description image website twitter telegram }";

pub struct IndexClient {
    http: Client,
    endpoint: String,
    ipfs_gateway: String,
    board_limit: u32,
    bonding: BondingSection,
    oracle: Arc<PriceOracle>,
}

impl IndexClient {
    pub fn new(
        cfg: &IndexSection,
        bonding: &BondingSection,
        oracle: Arc<PriceOracle>,
    ) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.get_endpoint(),
            ipfs_gateway: cfg.ipfs_gateway.clone(),
            board_limit: cfg.board_limit,
            bonding: bonding.clone(),
            oracle,
        })
    }

    fn board_query(&self) -> String {
        let n = self.board_limit;
        format!(
            "{{ boardV2 {{ \
                verified(limit: {n}) {{ coins {{ {COIN_FIELDS} }} }} \
                newlyCreated(limit: {n}) {{ coins {{ {COIN_FIELDS} }} }} \
                graduating(limit: {n}) {{ coins {{ {COIN_FIELDS} }} }} \
                listed(limit: {n}) {{ coins {{ {COIN_FIELDS} }} }} \
            }} }}"
        )
    }

    fn listed_query(&self) -> String {
        format!(
            "{{ coins(options: {{ listed: true, hideListed: false, asc: false, \
             limit: 100, offset: 0, sort: 0 }}) {{ {COIN_FIELDS} }} }}"
        )
    }

    fn coin_query() -> &'static str {
        "query($address: String!) { coin(address: $address) { \
            name address symbol listed createdAt \
            marketcap(round: 18) reserve(round: 18) supply(round: 18) \
            tax(round: 4) beneficiary creator nHolders \
            holders { holder amount } \
            metadata { description image website twitter telegram } } }"
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T, SourceError> {
        let body = match variables {
            Some(vars) => json!({ "query": query, "variables": vars }),
            None => json!({ "query": query }),
        };

        let resp = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Transport(format!(
                "index returned HTTP {status}"
            )));
        }

        let envelope: GqlEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let joined: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(SourceError::Service(joined.join("; ")));
        }
        envelope
            .data
            .ok_or_else(|| SourceError::Decode("index response had no data".to_string()))
    }

    fn resolve_image(&self, image: Option<&str>) -> Option<String> {
        let image = image?;
        if image.is_empty() {
            return None;
        }
        if image.starts_with("http") || image.starts_with('/') {
            return Some(image.to_string());
        }
        Some(format!(
            "{}{}?img-width=200&img-height=200&img-fit=cover",
            self.ipfs_gateway, image
        ))
    }

    /// Normalize one raw coin into the shared candidate schema.
    pub(crate) fn normalize(&self, coin: &RawCoin, section: &str, usd_rate: f64) -> TokenCandidate {
        let mut c = TokenCandidate::new(&coin.address, section);

        c.name = coin.name.clone();
        c.ticker = coin.symbol.clone();
        c.creator = coin.creator.clone();
        c.beneficiary = coin.beneficiary.clone();
        c.created_at = coin
            .created_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        if let Some(meta) = &coin.metadata {
            c.description = meta.description.clone();
            c.image = self.resolve_image(meta.image.as_deref());
            c.website = meta.website.clone();
            c.twitter = meta.twitter.clone();
            c.telegram = meta.telegram.clone();
        }

        let burned = self.burned_amount(coin);
        let circulating = self.bonding.total_supply - burned;
        let mcap_usd = coin.marketcap.unwrap_or(0.0) * usd_rate;
        c.market_cap_usd = Some(mcap_usd.max(0.0));
        c.price_usd = Some(if mcap_usd > 0.0 && circulating > 0.0 {
            mcap_usd / circulating
        } else {
            0.0
        });

        let reserve = coin.reserve.unwrap_or(0.0);
        c.reserve = Some(reserve);
        let progress = ((reserve / self.bonding.bond_target) * 100.0).min(100.0);
        c.bonding_progress_pct = Some(progress);
        c.tax_rate_pct = coin.tax.map(|t| t * 100.0);
        c.burn_pct = Some(burned / self.bonding.total_supply * 100.0);
        c.dev_hold_pct = Some(self.holder_pct(coin, coin.creator.as_deref()));

        c.holders = coin
            .n_holders
            .or_else(|| coin.holders.as_ref().map(|h| h.len() as u32));
        c.listed = Some(coin.listed);
        c.graduated = coin.listed || progress >= 100.0;

        c
    }

    /// Holder balances sitting at burn/zero addresses.
    fn burned_amount(&self, coin: &RawCoin) -> f64 {
        let Some(holders) = &coin.holders else {
            return 0.0;
        };
        holders
            .iter()
            .filter(|h| {
                h.holder.as_deref().is_some_and(|addr| {
                    self.bonding
                        .burn_addresses
                        .iter()
                        .any(|b| b.eq_ignore_ascii_case(addr))
                })
            })
            .filter_map(|h| h.amount)
            .sum()
    }

    fn holder_pct(&self, coin: &RawCoin, holder: Option<&str>) -> f64 {
        let Some(holder) = holder else { return 0.0 };
        let Some(holders) = &coin.holders else {
            return 0.0;
        };
        let amount: f64 = holders
            .iter()
            .filter(|h| h.holder.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(holder)))
            .filter_map(|h| h.amount)
            .sum();
        amount / self.bonding.total_supply * 100.0
    }
}

#[async_trait]
impl IndexSource for IndexClient {
    async fn fetch_board(&self) -> Result<Vec<TokenCandidate>, SourceError> {
        let usd_rate = self.oracle.usd_rate().await;
        let board: BoardData = self.query(&self.board_query(), None).await?;

        let mut candidates: Vec<TokenCandidate> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let sections = [
            (&board.board_v2.verified, "verified"),
            (&board.board_v2.newly_created, "newlyCreated"),
            (&board.board_v2.graduating, "graduating"),
            (&board.board_v2.listed, "listed"),
        ];
        for (section, name) in sections {
            let Some(section) = section else { continue };
            for coin in &section.coins {
                if seen.insert(coin.address.to_lowercase()) {
                    candidates.push(self.normalize(coin, name, usd_rate));
                }
            }
        }

        // The full listed collection catches graduated tokens the board
        // sections no longer surface. Its failure is tolerable when the
        // board itself came through.
        match self.query::<ListedData>(&self.listed_query(), None).await {
            Ok(listed) => {
                for coin in &listed.coins {
                    if seen.insert(coin.address.to_lowercase()) {
                        candidates.push(self.normalize(coin, "listed", usd_rate));
                    }
                }
            }
            Err(err) => debug!(error = %err, "listed coins query failed, using board only"),
        }

        debug!(count = candidates.len(), "index board fetched");
        Ok(candidates)
    }

    async fn lookup(&self, address: &str) -> Result<Option<TokenCandidate>, SourceError> {
        let usd_rate = self.oracle.usd_rate().await;
        let data: CoinData = self
            .query(Self::coin_query(), Some(json!({ "address": address })))
            .await?;
        Ok(data
            .coin
            .as_ref()
            .map(|coin| self.normalize(coin, "lookup", usd_rate)))
    }
}
