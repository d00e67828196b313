//! Core domain logic: token records, merge precedence, registry state
//! and the ranked display view. No I/O lives here.

pub mod ranking;
pub mod registry;
pub mod token;

pub use ranking::{build_ranked_view, ViewConfig};
pub use registry::RegistryState;
pub use token::{Confidence, Provenance, TokenRecord};
