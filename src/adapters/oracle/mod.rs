//! Base-currency USD rate oracle.
//!
//! Fetches the average ticker price from a public endpoint and caches
//! it on a TTL. Lookups never fail: on any error the last known rate
//! (or the configured fallback) is served, so a dead ticker endpoint
//! can never stall a reconciliation cycle.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::OracleSection;

#[derive(Debug, Deserialize)]
struct AvgPriceResponse {
    price: String,
}

pub struct PriceOracle {
    http: Client,
    endpoint: String,
    symbol: String,
    ttl: Duration,
    cached: Mutex<(f64, Option<Instant>)>,
}

impl PriceOracle {
    pub fn new(cfg: &OracleSection) -> Self {
        Self {
            http: Client::new(),
            endpoint: cfg.endpoint.clone(),
            symbol: cfg.symbol.clone(),
            ttl: Duration::from_secs(cfg.ttl_secs),
            cached: Mutex::new((cfg.fallback_price, None)),
        }
    }

    /// Current base-currency → USD rate. Cached; infallible.
    pub async fn usd_rate(&self) -> f64 {
        {
            let cached = self.cached.lock();
            if let (rate, Some(at)) = *cached {
                if at.elapsed() < self.ttl {
                    return rate;
                }
            }
        }

        match self.fetch().await {
            Ok(rate) if rate > 0.0 => {
                *self.cached.lock() = (rate, Some(Instant::now()));
                debug!(rate, symbol = %self.symbol, "refreshed usd rate");
                rate
            }
            Ok(rate) => {
                warn!(rate, "ticker returned non-positive rate, keeping previous");
                self.cached.lock().0
            }
            Err(err) => {
                warn!(error = %err, "usd rate fetch failed, keeping previous");
                self.cached.lock().0
            }
        }
    }

    async fn fetch(&self) -> Result<f64, reqwest::Error> {
        let url = format!("{}?symbol={}", self.endpoint, self.symbol);
        let resp: AvgPriceResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.price.parse().unwrap_or(0.0))
    }

    /// Inject a rate directly, bypassing the fetch path.
    #[cfg(test)]
    pub fn set_rate(&self, rate: f64) {
        *self.cached.lock() = (rate, Some(Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> PriceOracle {
        PriceOracle::new(&OracleSection {
            endpoint: "http://127.0.0.1:1/avgPrice".to_string(),
            symbol: "BNBUSDT".to_string(),
            ttl_secs: 60,
            fallback_price: 600.0,
        })
    }

    #[tokio::test]
    async fn serves_fallback_when_endpoint_unreachable() {
        let oracle = oracle();
        assert_eq!(oracle.usd_rate().await, 600.0);
    }

    #[tokio::test]
    async fn cached_rate_short_circuits_fetch() {
        let oracle = oracle();
        oracle.set_rate(612.5);
        // Endpoint is unreachable, so this only passes via the cache.
        assert_eq!(oracle.usd_rate().await, 612.5);
    }
}
