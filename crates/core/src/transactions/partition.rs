//! Partition key resolution.
//!
//! Every holding is reconciled independently. A partition is identified by the
//! asset class plus a normalized key of symbol, broker/exchange qualifier and,
//! for gold, the brand. The same symbol held at two brokers never aggregates.

use crate::transactions::{AssetClass, Transaction};
use log::warn;
use std::collections::HashMap;

/// Identity of one independently reconciled holding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub asset_class: AssetClass,
    pub key: String,
}

/// Derives partition keys and valuation lookup symbols from transactions.
#[derive(Debug, Clone, Default)]
pub struct PartitionKeyResolver;

impl PartitionKeyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the partition key for a transaction, or `None` when the
    /// transaction carries no usable symbol.
    pub fn resolve(&self, tx: &Transaction) -> Option<PartitionKey> {
        let symbol = tx.symbol.trim();
        if symbol.is_empty() {
            return None;
        }

        let mut key = symbol.to_uppercase();
        if let Some(qualifier) = tx.qualifier().map(str::trim).filter(|q| !q.is_empty()) {
            key.push('|');
            key.push_str(&qualifier.to_uppercase());
        }
        if tx.asset_class == AssetClass::Gold {
            if let Some(brand) = tx.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
                key.push('|');
                key.push_str(&brand.to_uppercase());
            }
        }

        Some(PartitionKey {
            asset_class: tx.asset_class,
            key,
        })
    }

    /// Derives the price-map lookup symbol for a transaction's holding.
    /// Gold quotes are brand-specific (`SYMBOL:BRAND`); everything else is
    /// quoted by bare symbol.
    pub fn quote_symbol(&self, tx: &Transaction) -> String {
        let symbol = tx.symbol.trim().to_uppercase();
        if tx.asset_class == AssetClass::Gold {
            if let Some(brand) = tx.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
                return format!("{}:{}", symbol, brand.to_uppercase());
            }
        }
        symbol
    }

    /// Groups transactions by partition. Transactions that cannot be keyed
    /// (blank symbol) are skipped with a warning; one bad record never stops
    /// the reconciliation pass.
    pub fn group<'a>(
        &self,
        transactions: &'a [Transaction],
    ) -> HashMap<PartitionKey, Vec<&'a Transaction>> {
        let mut partitions: HashMap<PartitionKey, Vec<&'a Transaction>> = HashMap::new();

        for tx in transactions {
            match self.resolve(tx) {
                Some(key) => partitions.entry(key).or_default().push(tx),
                None => {
                    warn!(
                        "Transaction {} has no symbol for asset class {}. Skipped.",
                        tx.id,
                        tx.asset_class.as_str()
                    );
                }
            }
        }

        partitions
    }
}
