//! Application layer: the reconciliation loop, the read-side handle and
//! push notifications.

mod notifier;
mod reconciler;
mod service;

pub use notifier::ChangeNotifier;
pub use reconciler::Reconciler;
pub use service::TrackerHandle;
