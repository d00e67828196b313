//! Deterministic in-memory source implementations for tests.
//!
//! Each mock serves preset responses (or errors) and counts calls, so
//! reconciler behavior can be verified without any network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::models::{ChainScanOutcome, SourceError, TokenCandidate};
use super::sources::{ChainLogSource, IndexSource, MarketSource};

fn clone_err(err: &SourceError) -> SourceError {
    match err {
        SourceError::Transport(m) => SourceError::Transport(m.clone()),
        SourceError::Service(m) => SourceError::Service(m.clone()),
        SourceError::RateLimited(m) => SourceError::RateLimited(m.clone()),
        SourceError::Decode(m) => SourceError::Decode(m.clone()),
    }
}

/// Mock index: a fixed board plus a lookup table.
pub struct MockIndexSource {
    pub board: Mutex<Result<Vec<TokenCandidate>, SourceError>>,
    pub lookups: Mutex<HashMap<String, TokenCandidate>>,
    pub board_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
}

impl Default for MockIndexSource {
    fn default() -> Self {
        Self {
            board: Mutex::new(Ok(Vec::new())),
            lookups: Mutex::new(HashMap::new()),
            board_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }
}

impl MockIndexSource {
    pub fn with_board(board: Vec<TokenCandidate>) -> Self {
        let mock = Self::default();
        *mock.board.lock() = Ok(board);
        mock
    }

    pub fn failing(err: SourceError) -> Self {
        let mock = Self::default();
        *mock.board.lock() = Err(err);
        mock
    }

    pub fn add_lookup(&self, candidate: TokenCandidate) {
        self.lookups
            .lock()
            .insert(candidate.address.clone(), candidate);
    }
}

#[async_trait]
impl IndexSource for MockIndexSource {
    async fn fetch_board(&self) -> Result<Vec<TokenCandidate>, SourceError> {
        self.board_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.board.lock() {
            Ok(board) => Ok(board.clone()),
            Err(err) => Err(clone_err(err)),
        }
    }

    async fn lookup(&self, address: &str) -> Result<Option<TokenCandidate>, SourceError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookups.lock().get(&address.to_lowercase()).cloned())
    }
}

/// Mock market search with preset candidates.
#[derive(Default)]
pub struct MockMarketSource {
    pub results: Mutex<Vec<TokenCandidate>>,
    pub fail: Mutex<Option<SourceError>>,
    pub calls: AtomicUsize,
}

impl MockMarketSource {
    pub fn with_results(results: Vec<TokenCandidate>) -> Self {
        Self {
            results: Mutex::new(results),
            ..Self::default()
        }
    }
}

#[async_trait]
impl MarketSource for MockMarketSource {
    async fn search_graduated(&self) -> Result<Vec<TokenCandidate>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &*self.fail.lock() {
            return Err(clone_err(err));
        }
        Ok(self.results.lock().clone())
    }
}

/// Mock chain scanner: serves queued scan outcomes, then empty scans
/// that keep the checkpoint where it is.
#[derive(Default)]
pub struct MockChainSource {
    pub outcomes: Mutex<Vec<ChainScanOutcome>>,
    pub calls: AtomicUsize,
    pub last_checkpoint_arg: Mutex<Option<Option<u64>>>,
}

impl MockChainSource {
    pub fn with_outcomes(outcomes: Vec<ChainScanOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChainLogSource for MockChainSource {
    async fn scan(&self, checkpoint: Option<u64>) -> Result<ChainScanOutcome, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_checkpoint_arg.lock() = Some(checkpoint);
        let mut outcomes = self.outcomes.lock();
        if outcomes.is_empty() {
            // No new blocks: checkpoint unchanged.
            Ok(ChainScanOutcome {
                events: Vec::new(),
                checkpoint: checkpoint.unwrap_or(0),
            })
        } else {
            Ok(outcomes.remove(0))
        }
    }
}
