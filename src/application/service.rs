//! Read-side handle over the reconciler's published state.
//!
//! The reconciler owns the registry exclusively; consumers get cheap
//! copy-on-write snapshots through this handle. Reads are synchronous
//! and never contend with a running cycle beyond an `Arc` swap.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use super::notifier::ChangeNotifier;
use crate::domain::TokenRecord;

#[derive(Clone)]
pub struct TrackerHandle {
    ranked: Arc<RwLock<Arc<Vec<TokenRecord>>>>,
    registry: Arc<RwLock<Arc<HashMap<String, TokenRecord>>>>,
    notifier: ChangeNotifier,
    trigger: mpsc::Sender<()>,
}

impl TrackerHandle {
    pub(crate) fn new(trigger: mpsc::Sender<()>) -> Self {
        Self {
            ranked: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            registry: Arc::new(RwLock::new(Arc::new(HashMap::new()))),
            notifier: ChangeNotifier::default(),
            trigger,
        }
    }

    /// Current ranked view. The returned snapshot is immutable; later
    /// cycles publish fresh ones rather than mutating it.
    pub fn ranked_view(&self) -> Arc<Vec<TokenRecord>> {
        Arc::clone(&self.ranked.read())
    }

    /// Any known record by address, including placeholders and demoted
    /// records the ranked view filters out.
    pub fn lookup(&self, address: &str) -> Option<TokenRecord> {
        self.registry.read().get(&address.to_lowercase()).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Subscribe to ranked-view updates, one message per completed cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<TokenRecord>>> {
        self.notifier.subscribe()
    }

    /// Ask the reconciler to start a cycle as soon as the current one
    /// (if any) finishes. Cycles never overlap; if a request is already
    /// queued this is a no-op.
    pub fn reconcile_now(&self) {
        if self.trigger.try_send(()).is_err() {
            debug!("reconcile trigger already pending");
        }
    }

    pub(crate) fn publish(
        &self,
        ranked: Vec<TokenRecord>,
        registry: HashMap<String, TokenRecord>,
    ) {
        let ranked = Arc::new(ranked);
        *self.ranked.write() = Arc::clone(&ranked);
        *self.registry.write() = Arc::new(registry);
        self.notifier.publish(ranked);
    }
}
