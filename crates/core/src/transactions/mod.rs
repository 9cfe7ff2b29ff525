//! Transactions module - the append-only log's domain models and partitioning.

mod partition;
mod transactions_constants;
mod transactions_model;



pub use partition::{PartitionKey, PartitionKeyResolver};
pub use transactions_constants::*;
pub use transactions_model::{
    parse_decimal_string_tolerant, AssetClass, NewTransaction, Transaction, TransactionType,
};
