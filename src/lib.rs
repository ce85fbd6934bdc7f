//! Binary size diff reconciliation.
//!
//! Pairs the sections, libraries, compilands, symbols and waste items of two
//! builds of the same binary into canonical diff objects, one per logical
//! pairing for the lifetime of a [`DiffSession`].

/// Cooperative cancellation
pub mod cancel;
/// Session configuration
pub mod config;
/// Core data types module
pub mod core;
/// Diff objects, identity cache and factory
pub mod diff;
/// Error types
pub mod error;
/// Logging and tracing setup
pub mod logging;
/// Diff sessions and the binary reader boundary
pub mod session;
/// Path similarity heuristics
pub mod similarity;
/// Reconciliation tasks
pub mod tasks;

pub use cancel::{with_cancellation, CancellationToken};
pub use config::DiffConfig;
pub use error::{DiffError, Result};
pub use session::{BinarySession, DiffSession, DiffSessionCache, SymbolListKey};
pub use tasks::{ProgressSink, TaskProgress};
