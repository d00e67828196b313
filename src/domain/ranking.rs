//! Ranked display view over the registry.
//!
//! The registry never deletes records; everything the frontend should
//! not see is filtered out here at view-build time.

use serde::Deserialize;

use crate::domain::registry::RegistryState;
use crate::domain::token::TokenRecord;

/// View filtering and ranking knobs, deserialized from the `[view]`
/// config section.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// Maximum number of records returned.
    #[serde(default = "default_cap")]
    pub cap: usize,
    /// One address forced to position 0 when eligible.
    #[serde(default)]
    pub pinned: Option<String>,
    /// Addresses excluded outright.
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Addresses that bypass identity and activity checks.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Tickers of major assets nobody gets to impersonate.
    #[serde(default = "default_protected_tickers")]
    pub protected_tickers: Vec<String>,
}

fn default_cap() -> usize {
    60
}

fn default_protected_tickers() -> Vec<String> {
    ["BTC", "ETH", "BNB", "SOL", "XRP", "USDT", "USDC", "DOGE", "WBNB"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            cap: default_cap(),
            pinned: None,
            blacklist: Vec::new(),
            allowlist: Vec::new(),
            protected_tickers: default_protected_tickers(),
        }
    }
}

impl ViewConfig {
    fn is_blacklisted(&self, address: &str) -> bool {
        self.blacklist.iter().any(|a| a.eq_ignore_ascii_case(address))
    }

    fn is_allowlisted(&self, address: &str) -> bool {
        self.allowlist.iter().any(|a| a.eq_ignore_ascii_case(address))
    }

    fn is_protected_ticker(&self, ticker: &str) -> bool {
        self.protected_tickers
            .iter()
            .any(|t| t.eq_ignore_ascii_case(ticker))
    }
}

/// Is the record eligible for display at all?
fn eligible(rec: &TokenRecord, cfg: &ViewConfig) -> bool {
    if cfg.is_blacklisted(&rec.address) {
        return false;
    }
    if rec.demoted || !rec.graduated {
        return false;
    }
    if cfg.is_protected_ticker(&rec.ticker) {
        return false;
    }
    if cfg.is_allowlisted(&rec.address) {
        return true;
    }
    // Unverified fingerprint matches stay hidden until the index
    // vouches for them.
    if rec.is_placeholder() {
        return false;
    }
    rec.has_resolved_identity() && rec.has_activity_signal()
}

/// Build the ranked view: filter, sort descending by effective
/// graduation time (missing sorts last), truncate to the cap, and hoist
/// the pinned record to position 0.
pub fn build_ranked_view(state: &RegistryState, cfg: &ViewConfig) -> Vec<TokenRecord> {
    let mut view: Vec<TokenRecord> = state
        .records()
        .filter(|r| eligible(r, cfg))
        .cloned()
        .collect();

    view.sort_by_key(|r| {
        std::cmp::Reverse(
            r.effective_graduation_time()
                .map(|t| t.timestamp())
                .unwrap_or(i64::MIN),
        )
    });
    view.truncate(cfg.cap);

    if let Some(pinned) = &cfg.pinned {
        if let Some(pos) = view
            .iter()
            .position(|r| r.address.eq_ignore_ascii_case(pinned))
        {
            let rec = view.remove(pos);
            view.insert(0, rec);
        } else if let Some(rec) = state.get(pinned).filter(|r| eligible(r, cfg)) {
            // Pinned but ranked below the cap: still forced in.
            view.insert(0, rec.clone());
            view.truncate(cfg.cap);
        }
    }

    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::models::{GraduationEvent, TokenCandidate};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn addr(i: u64) -> String {
        format!("0x{:036x}f1a9", i)
    }

    fn seeded_state(n: u64) -> RegistryState {
        let mut state = RegistryState::new();
        for i in 0..n {
            let a = addr(i);
            let candidate = TokenCandidate {
                name: Some(format!("Token {i}")),
                ticker: Some(format!("T{i}")),
                listed: Some(true),
                graduated: true,
                ..TokenCandidate::new(&a, "listed")
            };
            state.apply_index_candidates(&[candidate]);
            state.apply_chain_events(
                &[GraduationEvent {
                    address: a.clone(),
                    block_number: i,
                    tx_hash: None,
                    graduated_at: Utc.timestamp_opt(1_000 + i as i64, 0).unwrap(),
                }],
                &[a].into_iter().collect::<HashSet<_>>(),
            );
            // Give each record an activity signal.
            let mut mkt = TokenCandidate::new(&addr(i), "market");
            mkt.liquidity_usd = Some(10_000.0 + i as f64);
            state.apply_market_candidates(&[mkt], Utc::now());
        }
        state
    }

    #[test]
    fn view_is_capped_and_sorted_descending() {
        let state = seeded_state(61);
        let cfg = ViewConfig::default();
        let view = build_ranked_view(&state, &cfg);
        assert_eq!(view.len(), 60);
        // Newest graduation first; the oldest (i=0) is the one dropped.
        assert_eq!(view[0].address, addr(60));
        assert!(!view.iter().any(|r| r.address == addr(0)));
        for pair in view.windows(2) {
            assert!(
                pair[0].effective_graduation_time() >= pair[1].effective_graduation_time()
            );
        }
    }

    #[test]
    fn pinned_record_is_position_zero() {
        let state = seeded_state(10);
        let cfg = ViewConfig {
            pinned: Some(addr(3)),
            ..ViewConfig::default()
        };
        let view = build_ranked_view(&state, &cfg);
        assert_eq!(view[0].address, addr(3));
        assert_eq!(view.len(), 10);
    }

    #[test]
    fn blacklisted_and_protected_tickers_are_hidden() {
        let mut state = seeded_state(3);
        let imposter = addr(99);
        let candidate = TokenCandidate {
            name: Some("Fake Bitcoin".into()),
            ticker: Some("BTC".into()),
            listed: Some(true),
            graduated: true,
            ..TokenCandidate::new(&imposter, "listed")
        };
        state.apply_index_candidates(&[candidate]);
        let mut mkt = TokenCandidate::new(&imposter, "market");
        mkt.liquidity_usd = Some(50_000.0);
        state.apply_market_candidates(&[mkt], Utc::now());

        let cfg = ViewConfig {
            blacklist: vec![addr(1)],
            ..ViewConfig::default()
        };
        let view = build_ranked_view(&state, &cfg);
        assert!(!view.iter().any(|r| r.address == addr(1)));
        assert!(!view.iter().any(|r| r.address == imposter));
    }

    #[test]
    fn placeholders_hidden_until_verified_or_allowlisted() {
        let mut state = RegistryState::new();
        let a = addr(7);
        state.apply_chain_events(
            &[GraduationEvent {
                address: a.clone(),
                block_number: 1,
                tx_hash: None,
                graduated_at: Utc.timestamp_opt(1_000, 0).unwrap(),
            }],
            &HashSet::new(),
        );

        let view = build_ranked_view(&state, &ViewConfig::default());
        assert!(view.is_empty());

        let cfg = ViewConfig {
            allowlist: vec![a.clone()],
            ..ViewConfig::default()
        };
        let view = build_ranked_view(&state, &cfg);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn records_without_activity_are_hidden() {
        let mut state = RegistryState::new();
        let a = addr(8);
        let candidate = TokenCandidate {
            name: Some("Quiet".into()),
            ticker: Some("QU".into()),
            listed: Some(true),
            graduated: true,
            ..TokenCandidate::new(&a, "listed")
        };
        state.apply_index_candidates(&[candidate]);
        assert!(build_ranked_view(&state, &ViewConfig::default()).is_empty());
    }
}
