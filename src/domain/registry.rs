//! In-memory registry working set.
//!
//! `RegistryState` owns every known [`TokenRecord`], keyed by canonical
//! lowercase address. It is mutated only by the reconciler's merge
//! passes, which funnel through the `apply_*` methods here; dirty
//! addresses are tracked so persistence can upsert deltas only.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::ports::models::{GraduationEvent, TokenCandidate};
use crate::domain::token::TokenRecord;

#[derive(Debug, Default)]
pub struct RegistryState {
    records: HashMap<String, TokenRecord>,
    dirty: HashSet<String>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the working set from persisted records at startup.
    pub fn load(records: Vec<TokenRecord>) -> Self {
        let mut map = HashMap::with_capacity(records.len());
        for rec in records {
            map.insert(rec.address.clone(), rec);
        }
        info!(count = map.len(), "registry loaded from storage");
        Self {
            records: map,
            dirty: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&TokenRecord> {
        self.records.get(&address.to_lowercase())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.records.contains_key(&address.to_lowercase())
    }

    pub fn records(&self) -> impl Iterator<Item = &TokenRecord> {
        self.records.values()
    }

    /// Snapshot copy of the whole map for lock-free concurrent reads.
    pub fn snapshot(&self) -> HashMap<String, TokenRecord> {
        self.records.clone()
    }

    /// Drain the dirty set, returning the changed records for upsert.
    pub fn take_dirty(&mut self) -> Vec<TokenRecord> {
        let addresses: Vec<String> = self.dirty.drain().collect();
        addresses
            .into_iter()
            .filter_map(|a| self.records.get(&a).cloned())
            .collect()
    }

    /// Merge index board output. Records are created only for candidates
    /// carrying a graduation signal; existing records are refreshed
    /// regardless, so bonding-progress updates keep flowing.
    pub fn apply_index_candidates(&mut self, candidates: &[TokenCandidate]) {
        let mut created = 0usize;
        let mut updated = 0usize;
        for c in candidates {
            let key = c.address.to_lowercase();
            if let Some(rec) = self.records.get_mut(&key) {
                if rec.apply_index(c) {
                    self.dirty.insert(key);
                    updated += 1;
                }
            } else if c.graduated {
                let mut rec = TokenRecord::bare(&key, &c.section);
                rec.apply_index(c);
                self.records.insert(key.clone(), rec);
                self.dirty.insert(key);
                created += 1;
            }
        }
        debug!(created, updated, "index merge pass done");
    }

    /// Merge chain graduation events. `known` holds addresses the index
    /// vouched for this cycle; events for unknown addresses are admitted
    /// as unverified placeholders, never dropped.
    pub fn apply_chain_events(&mut self, events: &[GraduationEvent], known: &HashSet<String>) {
        let mut placeholders = 0usize;
        for ev in events {
            let key = ev.address.to_lowercase();
            let rec = self.records.entry(key.clone()).or_insert_with(|| {
                let mut rec = TokenRecord::bare(&key, "chainlog");
                if known.contains(&key) {
                    rec.verified = true;
                } else {
                    placeholders += 1;
                }
                rec
            });
            if known.contains(&key) && !rec.verified {
                rec.verified = true;
                self.dirty.insert(key.clone());
            }
            if rec.apply_chain_event(ev) {
                self.dirty.insert(key);
            }
        }
        if placeholders > 0 {
            info!(placeholders, "chain events admitted as placeholders pending verification");
        }
    }

    /// Merge market-search output. Unknown fingerprint matches become
    /// unverified placeholders.
    pub fn apply_market_candidates(
        &mut self,
        candidates: &[TokenCandidate],
        observed_at: DateTime<Utc>,
    ) {
        for c in candidates {
            let key = c.address.to_lowercase();
            let rec = self
                .records
                .entry(key.clone())
                .or_insert_with(|| TokenRecord::bare(&key, &c.section));
            if rec.apply_market(c, observed_at) {
                self.dirty.insert(key);
            }
        }
    }

    /// Demotion pass: reset confirmation on records the index explicitly
    /// reports as not listed. Returns the demoted addresses.
    pub fn demote_unlisted(&mut self, listed_flags: &HashMap<String, bool>) -> Vec<String> {
        let mut demoted = Vec::new();
        for (address, rec) in self.records.iter_mut() {
            if !rec.confirmed_graduated {
                continue;
            }
            if listed_flags.get(address) == Some(&false) && rec.demote() {
                demoted.push(address.clone());
                self.dirty.insert(address.clone());
            }
        }
        if !demoted.is_empty() {
            info!(count = demoted.len(), "demoted false-positive graduations");
        }
        demoted
    }

    /// Up to `limit` unresolved placeholder addresses, oldest-graduation
    /// first so long-pending ones are retried before fresh arrivals.
    pub fn unresolved_placeholders(&self, limit: usize) -> Vec<String> {
        let mut pending: Vec<&TokenRecord> = self
            .records
            .values()
            .filter(|r| r.is_placeholder())
            .collect();
        pending.sort_by_key(|r| r.graduated_at);
        pending
            .into_iter()
            .take(limit)
            .map(|r| r.address.clone())
            .collect()
    }

    /// Resolve one placeholder with an index lookup result.
    pub fn resolve_placeholder(&mut self, address: &str, candidate: &TokenCandidate) {
        let key = address.to_lowercase();
        if let Some(rec) = self.records.get_mut(&key) {
            if rec.apply_index(candidate) {
                self.dirty.insert(key);
            }
        }
    }
}
