//! DEX aggregator search adapter.

mod client;
mod types;

pub use client::MarketClient;
