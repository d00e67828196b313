//! Launchpad index adapter (GraphQL).

mod client;
mod types;

pub use client::IndexClient;
