//! Ports layer: trait abstractions over the three external data
//! sources, plus the normalized candidate models they all emit.
//!
//! Adapters under `crate::adapters` implement these traits; tests use
//! the in-crate mocks instead.

pub mod mocks;
pub mod models;
pub mod sources;

pub use models::{ChainScanOutcome, GraduationEvent, SourceError, TokenCandidate};
pub use sources::{ChainLogSource, IndexSource, MarketSource};
