//! Token records and the confidence-tiered merge rules.
//!
//! A [`TokenRecord`] is the authoritative view of one launchpad token.
//! It is only ever mutated through the `apply_*` methods below, which
//! enforce the precedence rules between the three data sources:
//!
//! - chain logs win for graduation timing and confirmation,
//! - the index wins for descriptive metadata and the `listed` flag,
//! - the market source wins for liquidity/volume style fields and may
//!   only *fill* what nothing better has written yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::models::{GraduationEvent, TokenCandidate};

/// Trustworthiness ranking of a writing source. Order matters: a higher
/// tier always beats a lower one during merge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Confidence {
    #[default]
    None,
    /// DEX search results: probabilistic identity, estimated timing.
    MarketEstimate,
    /// The launchpad index: authoritative metadata.
    IndexMetadata,
    /// Decoded chain events: authoritative timing.
    ChainLog,
}

/// Confidence tier of the last writer, tracked per mutable field group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub identity: Confidence,
    pub market: Confidence,
    pub timing: Confidence,
}

/// Per-field precedence check.
///
/// A write is allowed when the incoming tier beats the group's current
/// tier, or ties it with a non-empty value. A lower tier may only fill a
/// field that is still empty. Empty incoming values never clear state.
pub fn tier_allows(
    current: Confidence,
    incoming: Confidence,
    existing_set: bool,
    incoming_set: bool,
) -> bool {
    if !incoming_set {
        return false;
    }
    incoming >= current || !existing_set
}

/// One registry entry per on-chain token address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Canonical lowercase hex address; the registry key.
    pub address: String,
    pub name: String,
    pub ticker: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub creator: Option<String>,
    pub beneficiary: Option<String>,
    pub created_at: Option<DateTime<Utc>>,

    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
    pub price_change_24h: f64,
    pub buys_24h: u32,
    pub sells_24h: u32,
    pub holders: u32,
    pub dex_url: Option<String>,

    pub reserve: f64,
    pub bonding_progress_pct: f64,
    pub tax_rate_pct: f64,
    pub dev_hold_pct: f64,
    pub burn_pct: f64,
    pub listed: bool,
    pub bonding_curve_active: bool,

    pub graduated: bool,
    /// Monotonic true-only, except the explicit demotion pass.
    pub confirmed_graduated: bool,
    /// Guarded by `provenance.timing`: a chain-log timestamp is never
    /// replaced by a market estimate.
    pub graduated_at: Option<DateTime<Utc>>,
    pub graduation_block: Option<u64>,
    pub dex_paid: bool,
    /// First-write-wins.
    pub dex_paid_detected_at: Option<DateTime<Utc>>,

    /// Board section or origin tag of the creating source.
    pub section: String,
    /// True once the index has confirmed this address. Fingerprint-only
    /// records stay unverified placeholders until then.
    pub verified: bool,
    /// Set by the demotion pass when the index reports `listed=false`
    /// for a confirmed-graduated record. Excluded from ranking.
    pub demoted: bool,
    pub provenance: Provenance,
}

impl TokenRecord {
    /// A bare record for an address observed with no metadata yet.
    /// The name holds the address until identity is resolved.
    pub fn bare(address: &str, section: &str) -> Self {
        let address = address.to_lowercase();
        Self {
            name: address.clone(),
            ticker: String::new(),
            address,
            image: None,
            description: None,
            website: None,
            twitter: None,
            telegram: None,
            creator: None,
            beneficiary: None,
            created_at: None,
            price_usd: 0.0,
            market_cap_usd: 0.0,
            liquidity_usd: 0.0,
            volume_24h_usd: 0.0,
            price_change_24h: 0.0,
            buys_24h: 0,
            sells_24h: 0,
            holders: 0,
            dex_url: None,
            reserve: 0.0,
            bonding_progress_pct: 0.0,
            tax_rate_pct: 0.0,
            dev_hold_pct: 0.0,
            burn_pct: 0.0,
            listed: false,
            bonding_curve_active: false,
            graduated: false,
            confirmed_graduated: false,
            graduated_at: None,
            graduation_block: None,
            dex_paid: false,
            dex_paid_detected_at: None,
            section: section.to_string(),
            verified: false,
            demoted: false,
            provenance: Provenance::default(),
        }
    }

    /// Unresolved placeholder awaiting index verification?
    pub fn is_placeholder(&self) -> bool {
        !self.verified
    }

    /// True when the name is no longer just an address.
    pub fn has_resolved_identity(&self) -> bool {
        !self.name.is_empty()
            && !self.name.eq_ignore_ascii_case(&self.address)
            && !is_address_shaped(&self.name)
    }

    /// Any evidence the token actually trades somewhere.
    pub fn has_activity_signal(&self) -> bool {
        self.dex_url.is_some() || self.liquidity_usd > 0.0 || self.volume_24h_usd > 0.0
    }

    /// Ranking key: graduation time, falling back to creation time.
    pub fn effective_graduation_time(&self) -> Option<DateTime<Utc>> {
        self.graduated_at.or(self.created_at)
    }

    /// Merge an index candidate. Authoritative for identity, bonding
    /// state and the `listed` flag; never touches graduation timing.
    pub fn apply_index(&mut self, c: &TokenCandidate) -> bool {
        let mut changed = false;
        let tier = Confidence::IndexMetadata;

        changed |= write_name(
            &mut self.name,
            &self.address,
            self.provenance.identity,
            tier,
            &c.name,
        );
        changed |= write_str(&mut self.ticker, self.provenance.identity, tier, &c.ticker);
        changed |= write_opt(&mut self.image, self.provenance.identity, tier, &c.image);
        changed |= write_opt(&mut self.description, self.provenance.identity, tier, &c.description);
        changed |= write_opt(&mut self.website, self.provenance.identity, tier, &c.website);
        changed |= write_opt(&mut self.twitter, self.provenance.identity, tier, &c.twitter);
        changed |= write_opt(&mut self.telegram, self.provenance.identity, tier, &c.telegram);
        changed |= write_opt(&mut self.creator, self.provenance.identity, tier, &c.creator);
        changed |= write_opt(&mut self.beneficiary, self.provenance.identity, tier, &c.beneficiary);
        changed |= write_time(&mut self.created_at, self.provenance.identity, tier, c.created_at);

        changed |= write_f64(&mut self.price_usd, self.provenance.identity, tier, c.price_usd);
        changed |= write_f64(
            &mut self.market_cap_usd,
            self.provenance.identity,
            tier,
            c.market_cap_usd,
        );
        changed |= write_u32(&mut self.holders, self.provenance.identity, tier, c.holders);

        changed |= write_f64(&mut self.reserve, self.provenance.identity, tier, c.reserve);
        changed |= write_f64(
            &mut self.bonding_progress_pct,
            self.provenance.identity,
            tier,
            c.bonding_progress_pct,
        );
        changed |= write_f64(
            &mut self.tax_rate_pct,
            self.provenance.identity,
            tier,
            c.tax_rate_pct,
        );
        changed |= write_f64(
            &mut self.dev_hold_pct,
            self.provenance.identity,
            tier,
            c.dev_hold_pct,
        );
        changed |= write_f64(&mut self.burn_pct, self.provenance.identity, tier, c.burn_pct);

        if let Some(listed) = c.listed {
            if self.listed != listed {
                self.listed = listed;
                changed = true;
            }
            let bonding = !listed && c.reserve.unwrap_or(0.0) >= 1.0;
            if self.bonding_curve_active != bonding {
                self.bonding_curve_active = bonding;
                changed = true;
            }
            if listed {
                // The index re-confirming a listing clears any earlier
                // false-positive demotion.
                if self.demoted {
                    self.demoted = false;
                    changed = true;
                }
                if !self.graduated {
                    self.graduated = true;
                    changed = true;
                }
            }
        }
        if c.graduated && !self.graduated && !self.demoted {
            self.graduated = true;
            changed = true;
        }

        if !self.verified {
            self.verified = true;
            changed = true;
        }
        if changed {
            self.provenance.identity = self.provenance.identity.max(tier);
            if !c.section.is_empty() && self.section != c.section {
                self.section = c.section.clone();
            }
        }
        changed
    }

    /// Merge a market-search candidate. Wins for liquidity/volume style
    /// fields; fills identity gaps; supplies a graduation-time estimate
    /// only when no timing exists at all.
    pub fn apply_market(&mut self, c: &TokenCandidate, observed_at: DateTime<Utc>) -> bool {
        let mut changed = false;
        let tier = Confidence::MarketEstimate;

        changed |= write_f64(
            &mut self.liquidity_usd,
            self.provenance.market,
            tier,
            c.liquidity_usd,
        );
        changed |= write_f64(
            &mut self.volume_24h_usd,
            self.provenance.market,
            tier,
            c.volume_24h_usd,
        );
        if let Some(change) = c.price_change_24h {
            if self.price_change_24h != change {
                self.price_change_24h = change;
                changed = true;
            }
        }
        changed |= write_u32(&mut self.buys_24h, self.provenance.market, tier, c.buys_24h);
        changed |= write_u32(&mut self.sells_24h, self.provenance.market, tier, c.sells_24h);
        changed |= write_opt(&mut self.dex_url, self.provenance.market, tier, &c.dex_url);

        // Price and market cap are index-owned; the market source may
        // only fill them while the index has never reported.
        changed |= write_f64(&mut self.price_usd, self.provenance.identity, tier, c.price_usd);
        changed |= write_f64(
            &mut self.market_cap_usd,
            self.provenance.identity,
            tier,
            c.market_cap_usd,
        );

        // Identity gaps only.
        changed |= write_name(
            &mut self.name,
            &self.address,
            self.provenance.identity,
            tier,
            &c.name,
        );
        changed |= write_str(&mut self.ticker, self.provenance.identity, tier, &c.ticker);
        changed |= write_opt(&mut self.image, self.provenance.identity, tier, &c.image);
        changed |= write_opt(&mut self.website, self.provenance.identity, tier, &c.website);
        changed |= write_opt(&mut self.twitter, self.provenance.identity, tier, &c.twitter);
        changed |= write_opt(&mut self.telegram, self.provenance.identity, tier, &c.telegram);

        if c.dex_paid == Some(true) {
            if !self.dex_paid {
                self.dex_paid = true;
                changed = true;
            }
            if self.dex_paid_detected_at.is_none() {
                self.dex_paid_detected_at = Some(observed_at);
                changed = true;
            }
        }

        if let Some(estimate) = c.graduated_at_estimate {
            if self.provenance.timing == Confidence::None && self.graduated_at.is_none() {
                self.graduated_at = Some(estimate);
                self.provenance.timing = tier;
                if !self.demoted {
                    self.graduated = true;
                }
                changed = true;
            }
        }

        if changed {
            self.provenance.market = self.provenance.market.max(tier);
        }
        changed
    }

    /// Merge a decoded chain graduation event. Always wins for timing
    /// and confirmation; clears a prior demotion.
    pub fn apply_chain_event(&mut self, ev: &GraduationEvent) -> bool {
        let mut changed = false;

        if tier_allows(
            self.provenance.timing,
            Confidence::ChainLog,
            self.graduated_at.is_some(),
            true,
        ) && self.graduated_at != Some(ev.graduated_at)
        {
            self.graduated_at = Some(ev.graduated_at);
            changed = true;
        }
        if self.graduation_block != Some(ev.block_number) {
            self.graduation_block = Some(ev.block_number);
            changed = true;
        }
        if !self.graduated || !self.confirmed_graduated || self.demoted {
            self.graduated = true;
            self.confirmed_graduated = true;
            self.demoted = false;
            changed = true;
        }
        if changed {
            self.provenance.timing = Confidence::ChainLog;
        }
        changed
    }

    /// Demotion pass: the index explicitly reports the token as still
    /// bonding, so the earlier confirmation was a false positive.
    pub fn demote(&mut self) -> bool {
        if !self.confirmed_graduated && self.demoted {
            return false;
        }
        self.confirmed_graduated = false;
        self.demoted = true;
        true
    }
}

/// Does `s` look like a bare hex address (`0x` + 40 hex digits)?
pub fn is_address_shaped(s: &str) -> bool {
    let hex = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(rest) => rest,
        None => return false,
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

// Field writers. Each returns true when the record changed.

fn write_opt(
    field: &mut Option<String>,
    current: Confidence,
    incoming: Confidence,
    value: &Option<String>,
) -> bool {
    let incoming_set = value.as_deref().is_some_and(|v| !v.is_empty());
    if tier_allows(current, incoming, field.is_some(), incoming_set) && *field != *value {
        *field = value.clone();
        return true;
    }
    false
}

fn write_str(
    field: &mut String,
    current: Confidence,
    incoming: Confidence,
    value: &Option<String>,
) -> bool {
    match value {
        Some(v) if tier_allows(current, incoming, !field.is_empty(), !v.is_empty()) => {
            if *field != *v {
                *field = v.clone();
                return true;
            }
            false
        }
        _ => false,
    }
}

/// Like [`write_str`], but an address-shaped existing name counts as
/// unset so any real name can replace it.
fn write_name(
    field: &mut String,
    address: &str,
    current: Confidence,
    incoming: Confidence,
    value: &Option<String>,
) -> bool {
    let existing_set = !field.is_empty()
        && !field.eq_ignore_ascii_case(address)
        && !is_address_shaped(field);
    match value {
        Some(v) if tier_allows(current, incoming, existing_set, !v.is_empty()) => {
            if *field != *v {
                *field = v.clone();
                return true;
            }
            false
        }
        _ => false,
    }
}

fn write_f64(
    field: &mut f64,
    current: Confidence,
    incoming: Confidence,
    value: Option<f64>,
) -> bool {
    match value {
        Some(v) if tier_allows(current, incoming, *field != 0.0, v != 0.0) => {
            if *field != v {
                *field = v;
                return true;
            }
            false
        }
        _ => false,
    }
}

fn write_u32(
    field: &mut u32,
    current: Confidence,
    incoming: Confidence,
    value: Option<u32>,
) -> bool {
    match value {
        Some(v) if tier_allows(current, incoming, *field != 0, v != 0) => {
            if *field != v {
                *field = v;
                return true;
            }
            false
        }
        _ => false,
    }
}

fn write_time(
    field: &mut Option<DateTime<Utc>>,
    current: Confidence,
    incoming: Confidence,
    value: Option<DateTime<Utc>>,
) -> bool {
    if tier_allows(current, incoming, field.is_some(), value.is_some()) && *field != value {
        *field = value;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ADDR: &str = "0x00000000000000000000000000000000dead1a9f";

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn index_candidate() -> TokenCandidate {
        TokenCandidate {
            name: Some("Bubble".into()),
            ticker: Some("BBL".into()),
            holders: Some(120),
            listed: Some(true),
            graduated: true,
            price_usd: Some(0.0004),
            market_cap_usd: Some(400_000.0),
            tax_rate_pct: Some(2.0),
            ..TokenCandidate::new(ADDR, "listed")
        }
    }

    #[test]
    fn confidence_ordering() {
        assert!(Confidence::ChainLog > Confidence::IndexMetadata);
        assert!(Confidence::IndexMetadata > Confidence::MarketEstimate);
        assert!(Confidence::MarketEstimate > Confidence::None);
    }

    #[test]
    fn tier_allows_rules() {
        use Confidence::*;
        // Higher tier always wins.
        assert!(tier_allows(MarketEstimate, IndexMetadata, true, true));
        // Equal tier: non-empty incoming wins.
        assert!(tier_allows(IndexMetadata, IndexMetadata, true, true));
        // Equal tier: empty incoming never clears.
        assert!(!tier_allows(IndexMetadata, IndexMetadata, true, false));
        // Lower tier only fills gaps.
        assert!(!tier_allows(IndexMetadata, MarketEstimate, true, true));
        assert!(tier_allows(IndexMetadata, MarketEstimate, false, true));
    }

    #[test]
    fn address_shape_detection() {
        assert!(is_address_shaped(ADDR));
        assert!(!is_address_shaped("Bubble"));
        assert!(!is_address_shaped("0x1234"));
        assert!(!is_address_shaped("00000000000000000000000000000000dead1a9f"));
    }

    #[test]
    fn index_apply_sets_identity_and_verifies() {
        let mut rec = TokenRecord::bare(ADDR, "chainlog");
        assert!(rec.is_placeholder());
        assert!(rec.apply_index(&index_candidate()));
        assert!(rec.verified);
        assert!(rec.listed);
        assert!(rec.graduated);
        assert_eq!(rec.name, "Bubble");
        assert_eq!(rec.holders, 120);
        assert!(rec.has_resolved_identity());
        assert_eq!(rec.provenance.identity, Confidence::IndexMetadata);
    }

    #[test]
    fn chain_timestamp_beats_market_estimate() {
        let mut rec = TokenRecord::bare(ADDR, "market");
        let chain_time = ts(1_700_000_000);
        rec.apply_chain_event(&GraduationEvent {
            address: ADDR.into(),
            block_number: 42,
            tx_hash: None,
            graduated_at: chain_time,
        });
        assert!(rec.confirmed_graduated);
        assert_eq!(rec.graduated_at, Some(chain_time));

        // A later, different market estimate must not move the timestamp.
        let mut est = TokenCandidate::new(ADDR, "market");
        est.graduated_at_estimate = Some(ts(1_700_009_999));
        rec.apply_market(&est, ts(1_700_010_000));
        assert_eq!(rec.graduated_at, Some(chain_time));
        assert_eq!(rec.provenance.timing, Confidence::ChainLog);
    }

    #[test]
    fn market_estimate_fills_missing_timing_only() {
        let mut rec = TokenRecord::bare(ADDR, "market");
        let mut est = TokenCandidate::new(ADDR, "market");
        est.graduated_at_estimate = Some(ts(1_000));
        rec.apply_market(&est, ts(2_000));
        assert_eq!(rec.graduated_at, Some(ts(1_000)));
        assert_eq!(rec.provenance.timing, Confidence::MarketEstimate);

        // A second, different estimate does not churn the field.
        est.graduated_at_estimate = Some(ts(1_500));
        rec.apply_market(&est, ts(2_500));
        assert_eq!(rec.graduated_at, Some(ts(1_000)));
    }

    #[test]
    fn market_never_downgrades_index_identity() {
        let mut rec = TokenRecord::bare(ADDR, "listed");
        rec.apply_index(&index_candidate());

        let mut mkt = TokenCandidate::new(ADDR, "market");
        mkt.name = Some("Imposter".into());
        mkt.price_usd = Some(9.9);
        mkt.liquidity_usd = Some(55_000.0);
        rec.apply_market(&mkt, ts(0));

        assert_eq!(rec.name, "Bubble");
        assert_eq!(rec.price_usd, 0.0004);
        // But the market-owned field group is updated.
        assert_eq!(rec.liquidity_usd, 55_000.0);
    }

    #[test]
    fn dex_paid_detected_at_is_first_write_wins() {
        let mut rec = TokenRecord::bare(ADDR, "market");
        let mut mkt = TokenCandidate::new(ADDR, "market");
        mkt.dex_paid = Some(true);
        rec.apply_market(&mkt, ts(100));
        assert_eq!(rec.dex_paid_detected_at, Some(ts(100)));

        rec.apply_market(&mkt, ts(200));
        assert_eq!(rec.dex_paid_detected_at, Some(ts(100)));
    }

    #[test]
    fn demotion_and_reconfirmation() {
        let mut rec = TokenRecord::bare(ADDR, "chainlog");
        rec.apply_chain_event(&GraduationEvent {
            address: ADDR.into(),
            block_number: 1,
            tx_hash: None,
            graduated_at: ts(10),
        });
        assert!(rec.confirmed_graduated);

        assert!(rec.demote());
        assert!(!rec.confirmed_graduated);
        assert!(rec.demoted);

        // Index reporting listed=true re-admits the record.
        rec.apply_index(&index_candidate());
        assert!(!rec.demoted);

        // A fresh chain event restores confirmation too.
        rec.demote();
        rec.apply_chain_event(&GraduationEvent {
            address: ADDR.into(),
            block_number: 2,
            tx_hash: None,
            graduated_at: ts(10),
        });
        assert!(rec.confirmed_graduated);
        assert!(!rec.demoted);
    }

    #[test]
    fn empty_index_values_preserve_prior_state() {
        let mut rec = TokenRecord::bare(ADDR, "listed");
        rec.apply_index(&index_candidate());

        let sparse = TokenCandidate::new(ADDR, "listed");
        rec.apply_index(&sparse);
        assert_eq!(rec.name, "Bubble");
        assert_eq!(rec.holders, 120);
    }

    #[test]
    fn effective_graduation_time_falls_back_to_creation() {
        let mut rec = TokenRecord::bare(ADDR, "listed");
        assert_eq!(rec.effective_graduation_time(), None);
        rec.created_at = Some(ts(5));
        assert_eq!(rec.effective_graduation_time(), Some(ts(5)));
        rec.graduated_at = Some(ts(9));
        assert_eq!(rec.effective_graduation_time(), Some(ts(9)));
    }
}
