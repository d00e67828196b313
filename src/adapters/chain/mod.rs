//! Chain log scanning adapter.

mod rpc;
mod scanner;

pub use scanner::LogScanner;
