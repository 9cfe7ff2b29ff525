//! Pundi Core - position reconciliation for a personal multi-asset
//! portfolio (stocks, crypto, gold, cash) reported in IDR.
//!
//! The crate owns no I/O: transactions, live prices and the FX rate are
//! pushed in by external collaborators, and every state change fans out to
//! subscribers as an owned snapshot. [`StateManager`] is the entry point.

pub mod constants;
pub mod errors;
pub mod fx;
pub mod portfolio;
pub mod quotes;
pub mod transactions;

// Re-export common types from the transaction and portfolio modules
pub use portfolio::*;
pub use transactions::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
