//! Durable state: the token registry and the chain-scan checkpoint.

mod registry_store;

pub use registry_store::{RegistryStore, StorageError};
