//! The reconciliation engine.
//!
//! One cycle pulls all three sources, merges them into the registry in
//! confidence order, resolves pending placeholders, persists the delta
//! and publishes fresh snapshots. Cycles run strictly one at a time on
//! an explicit loop; a slow cycle delays the next, never overlaps it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::service::TrackerHandle;
use crate::domain::{build_ranked_view, RegistryState, ViewConfig};
use crate::ports::sources::{ChainLogSource, IndexSource, MarketSource};
use crate::storage::{RegistryStore, StorageError};

pub struct Reconciler<I, M, C> {
    index: I,
    market: M,
    chain: C,
    state: RegistryState,
    store: Arc<RegistryStore>,
    checkpoint: Option<u64>,
    view_cfg: ViewConfig,
    interval: Duration,
    placeholder_budget: usize,
    handle: TrackerHandle,
    trigger_rx: mpsc::Receiver<()>,
}

impl<I, M, C> Reconciler<I, M, C>
where
    I: IndexSource,
    M: MarketSource,
    C: ChainLogSource,
{
    /// Load persisted state and wire up the read-side handle. The
    /// pre-cycle snapshot is published immediately so consumers see
    /// yesterday's registry rather than nothing while the first cycle
    /// runs.
    pub fn new(
        index: I,
        market: M,
        chain: C,
        store: Arc<RegistryStore>,
        view_cfg: ViewConfig,
        interval_secs: u64,
        placeholder_budget: usize,
    ) -> Result<(Self, TrackerHandle), StorageError> {
        let state = RegistryState::load(store.load_all()?);
        let checkpoint = store.checkpoint()?;
        info!(
            records = state.len(),
            checkpoint = ?checkpoint,
            "reconciler initialized"
        );

        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let handle = TrackerHandle::new(trigger_tx);
        handle.publish(build_ranked_view(&state, &view_cfg), state.snapshot());

        let reconciler = Self {
            index,
            market,
            chain,
            state,
            store,
            checkpoint,
            view_cfg,
            interval: Duration::from_secs(interval_secs.max(1)),
            placeholder_budget,
            handle: handle.clone(),
            trigger_rx,
        };
        Ok((reconciler, handle))
    }

    pub fn checkpoint(&self) -> Option<u64> {
        self.checkpoint
    }

    /// The underlying index source. Sources use interior mutability, so
    /// a shared reference is enough to reprogram a mock between cycles.
    pub fn index(&self) -> &I {
        &self.index
    }

    /// One full reconciliation pass. Source failures are logged and
    /// degrade the cycle; they never abort it.
    pub async fn run_cycle(&mut self) {
        let started = Instant::now();

        // 1. Index board: authoritative identity and the listed flag.
        let mut known: HashSet<String> = HashSet::new();
        let mut listed_flags: HashMap<String, bool> = HashMap::new();
        let mut index_ok = false;
        match self.index.fetch_board().await {
            Ok(candidates) => {
                for c in &candidates {
                    known.insert(c.address.clone());
                    if let Some(listed) = c.listed {
                        listed_flags.insert(c.address.clone(), listed);
                    }
                }
                self.state.apply_index_candidates(&candidates);
                index_ok = true;
            }
            Err(err) => {
                warn!(error = %err, "index board fetch failed, keeping prior state");
            }
        }

        // 2. Chain logs: authoritative graduation timing.
        match self.chain.scan(self.checkpoint).await {
            Ok(outcome) => {
                self.state.apply_chain_events(&outcome.events, &known);
                // Monotonic: a scan can never move the checkpoint back.
                let next = self
                    .checkpoint
                    .map_or(outcome.checkpoint, |cp| cp.max(outcome.checkpoint));
                self.checkpoint = Some(next);
            }
            Err(err) => {
                warn!(error = %err, "chain scan failed, checkpoint unchanged");
            }
        }

        // 3. Market search: gap-filling market data and estimates.
        match self.market.search_graduated().await {
            Ok(candidates) => {
                self.state.apply_market_candidates(&candidates, Utc::now());
            }
            Err(err) => {
                warn!(error = %err, "market search failed, skipping merge");
            }
        }

        // 4. Demotion needs an index answer this cycle; a silent index
        // must not un-graduate anything.
        if index_ok {
            self.state.demote_unlisted(&listed_flags);
        }

        // 5. Retry a bounded slice of unresolved placeholders.
        self.resolve_placeholders().await;

        // 6. Persist the delta and the checkpoint.
        let dirty = self.state.take_dirty();
        if let Err(err) = self.store.upsert(&dirty) {
            error!(error = %err, count = dirty.len(), "failed to persist registry delta");
        }
        if let Some(cp) = self.checkpoint {
            if let Err(err) = self.store.set_checkpoint(cp) {
                error!(error = %err, "failed to persist scan checkpoint");
            }
        }

        // 7. Publish fresh snapshots.
        let ranked = build_ranked_view(&self.state, &self.view_cfg);
        debug!(
            ranked = ranked.len(),
            records = self.state.len(),
            changed = dirty.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reconcile cycle complete"
        );
        self.handle.publish(ranked, self.state.snapshot());
    }

    async fn resolve_placeholders(&mut self) {
        let pending = self.state.unresolved_placeholders(self.placeholder_budget);
        for address in pending {
            match self.index.lookup(&address).await {
                Ok(Some(candidate)) => {
                    info!(address = %address, "placeholder resolved via index lookup");
                    self.state.resolve_placeholder(&address, &candidate);
                }
                Ok(None) => {
                    // Index does not know it yet; retried next cycle.
                    debug!(address = %address, "placeholder still unknown to index");
                }
                Err(err) => {
                    // Index is struggling; stop burning the budget.
                    warn!(error = %err, "placeholder lookup failed, deferring rest");
                    break;
                }
            }
        }
    }

    /// Run cycles forever. The delay between cycles starts after the
    /// previous one finishes, so cycles can stretch but never stack.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "reconciler loop started");
        loop {
            self.run_cycle().await;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                triggered = self.trigger_rx.recv() => {
                    if triggered.is_some() {
                        debug!("on-demand reconcile requested");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{MockChainSource, MockIndexSource, MockMarketSource};
    use crate::ports::models::{ChainScanOutcome, GraduationEvent, SourceError, TokenCandidate};
    use chrono::TimeZone;
    use tempfile::tempdir;

    const ADDR: &str = "0xaaaa00000000000000000000000000000000f1a9";

    fn listed_candidate(address: &str, name: &str) -> TokenCandidate {
        TokenCandidate {
            name: Some(name.into()),
            ticker: Some(name.to_uppercase()),
            listed: Some(true),
            graduated: true,
            ..TokenCandidate::new(address, "listed")
        }
    }

    fn market_candidate(address: &str) -> TokenCandidate {
        TokenCandidate {
            liquidity_usd: Some(10_000.0),
            volume_24h_usd: Some(2_500.0),
            dex_url: Some("https://dex.example/pair".into()),
            graduated: true,
            ..TokenCandidate::new(address, "market")
        }
    }

    fn outcome(address: &str, block: u64, secs: i64, checkpoint: u64) -> ChainScanOutcome {
        ChainScanOutcome {
            events: vec![GraduationEvent {
                address: address.to_lowercase(),
                block_number: block,
                tx_hash: Some("0xabc".into()),
                graduated_at: Utc.timestamp_opt(secs, 0).unwrap(),
            }],
            checkpoint,
        }
    }

    fn store() -> (tempfile::TempDir, Arc<RegistryStore>) {
        let dir = tempdir().unwrap();
        let store = Arc::new(RegistryStore::open(dir.path().join("r.db"), 50).unwrap());
        (dir, store)
    }

    #[tokio::test]
    async fn cycle_merges_index_and_chain_into_confirmed_record() {
        let (_dir, store) = store();
        let index = MockIndexSource::with_board(vec![listed_candidate(ADDR, "Bubble")]);
        let chain = MockChainSource::with_outcomes(vec![outcome(ADDR, 100, 1_700_000_000, 100)]);
        let (mut rec, handle) = Reconciler::new(
            index,
            MockMarketSource::with_results(vec![market_candidate(ADDR)]),
            chain,
            store,
            ViewConfig::default(),
            20,
            12,
        )
        .unwrap();

        rec.run_cycle().await;

        let view = handle.ranked_view();
        assert_eq!(view.len(), 1);
        let token = &view[0];
        assert!(token.confirmed_graduated);
        assert_eq!(token.graduated_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(token.graduation_block, Some(100));
        assert_eq!(rec.checkpoint(), Some(100));
    }

    #[tokio::test]
    async fn index_outage_degrades_cycle_without_losing_state() {
        let (_dir, store) = store();
        let index = MockIndexSource::with_board(vec![listed_candidate(ADDR, "Bubble")]);
        let chain = MockChainSource::with_outcomes(vec![outcome(ADDR, 10, 1_000, 10)]);
        let (mut rec, handle) = Reconciler::new(
            index,
            MockMarketSource::with_results(vec![market_candidate(ADDR)]),
            chain,
            store,
            ViewConfig::default(),
            20,
            12,
        )
        .unwrap();
        rec.run_cycle().await;
        assert_eq!(handle.ranked_view().len(), 1);

        // Index goes dark: the record must survive untouched.
        *rec.index.board.lock() = Err(SourceError::Transport("down".into()));
        rec.run_cycle().await;
        let view = handle.ranked_view();
        assert_eq!(view.len(), 1);
        assert!(view[0].confirmed_graduated);
    }

    #[tokio::test]
    async fn checkpoint_is_monotonic_and_survives_empty_scans() {
        let (_dir, store) = store();
        let chain = MockChainSource::with_outcomes(vec![
            outcome(ADDR, 100, 1_000, 100),
            // A later outcome reporting an older checkpoint must not win.
            ChainScanOutcome {
                events: Vec::new(),
                checkpoint: 40,
            },
        ]);
        let (mut rec, _handle) = Reconciler::new(
            MockIndexSource::default(),
            MockMarketSource::default(),
            chain,
            Arc::clone(&store),
            ViewConfig::default(),
            20,
            12,
        )
        .unwrap();

        rec.run_cycle().await;
        assert_eq!(rec.checkpoint(), Some(100));
        rec.run_cycle().await;
        assert_eq!(rec.checkpoint(), Some(100));
        // Queue drained: empty scan keeps it in place.
        rec.run_cycle().await;
        assert_eq!(rec.checkpoint(), Some(100));
        assert_eq!(store.checkpoint().unwrap(), Some(100));
    }

    #[tokio::test]
    async fn placeholders_resolve_through_index_lookup() {
        let (_dir, store) = store();
        let index = MockIndexSource::default();
        index.add_lookup(listed_candidate(ADDR, "Late"));
        let chain = MockChainSource::with_outcomes(vec![outcome(ADDR, 5, 1_000, 5)]);
        let (mut rec, handle) = Reconciler::new(
            index,
            MockMarketSource::with_results(vec![market_candidate(ADDR)]),
            chain,
            store,
            ViewConfig::default(),
            20,
            12,
        )
        .unwrap();

        rec.run_cycle().await;

        // Chain event landed and the lookup verified it within the cycle.
        let token = handle.lookup(ADDR).unwrap();
        assert!(!token.is_placeholder());
        assert!(handle.ranked_view().iter().any(|r| r.address == ADDR));
    }

    #[tokio::test]
    async fn state_survives_restart_via_storage() {
        let (_dir, store) = store();
        {
            let index = MockIndexSource::with_board(vec![listed_candidate(ADDR, "Durable")]);
            let chain =
                MockChainSource::with_outcomes(vec![outcome(ADDR, 7, 1_700_000_000, 7)]);
            let (mut rec, _handle) = Reconciler::new(
                index,
                MockMarketSource::default(),
                chain,
                Arc::clone(&store),
                ViewConfig::default(),
                20,
                12,
            )
            .unwrap();
            rec.run_cycle().await;
        }

        // Fresh reconciler over the same store: the pre-cycle snapshot
        // already carries the confirmed record and checkpoint.
        let (rec, handle) = Reconciler::new(
            MockIndexSource::default(),
            MockMarketSource::default(),
            MockChainSource::default(),
            store,
            ViewConfig::default(),
            20,
            12,
        )
        .unwrap();
        assert_eq!(rec.checkpoint(), Some(7));
        let token = handle.lookup(ADDR).unwrap();
        assert!(token.confirmed_graduated);
        assert_eq!(token.graduated_at.unwrap().timestamp(), 1_700_000_000);
    }
}
