//! Gradwatch - Graduation Detection & Token State Reconciliation
//!
//! Tracks bonding-curve launchpad tokens through graduation by
//! reconciling three unreliable sources in confidence order: decoded
//! chain logs, the launchpad's own index, and public DEX search.
//!
//! # Modules
//!
//! - `domain`: Core logic (TokenRecord, merge precedence, registry, ranked view)
//! - `ports`: Trait abstractions over the data sources, plus test mocks
//! - `adapters`: External implementations (index GraphQL, DEX search, chain RPC, oracle, CLI)
//! - `application`: The reconciliation loop, read-side handle and notifications
//! - `storage`: SQLite-backed registry and scan checkpoint
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod storage;
