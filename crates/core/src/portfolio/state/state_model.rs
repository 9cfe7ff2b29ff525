//! Canonical portfolio state and its change-detection fingerprint.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::portfolio::positions::Position;
use crate::quotes::PriceQuote;
use crate::transactions::{AssetClass, Transaction};

/// The reconciled portfolio.
///
/// Positions are derived, never edited: every transaction change rebuilds
/// them from the log, and price or FX changes revalue them in place.
/// Subscribers receive owned clones of this struct.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    pub assets_by_class: HashMap<AssetClass, Vec<Position>>,
    /// The reconciled transaction log, deduplicated by id.
    pub transactions: Vec<Transaction>,
    /// Live quotes keyed by quote symbol.
    pub prices: HashMap<String, PriceQuote>,
    /// Base units per one foreign unit; `None` until the FX collaborator
    /// reports one.
    pub exchange_rate: Option<Decimal>,
    pub last_update: Option<DateTime<Utc>>,
    /// Monotonic change counter; bumps once per committed mutation and
    /// never resets.
    pub version: u64,
    pub is_initialized: bool,
}

impl PortfolioState {
    /// All positions across classes, in no particular order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.assets_by_class.values().flatten()
    }

    pub fn position_count(&self) -> usize {
        self.assets_by_class.values().map(Vec::len).sum()
    }
}

/// Cheap structural fingerprint of a transaction set.
///
/// Two sets with equal fingerprints are treated as identical and skip the
/// rebuild. The fingerprint is deliberately loose (count plus the extremes
/// of the set, not a content hash); an in-place edit that keeps the count,
/// the last id and the newest timestamp would slip past it, which the
/// append-only log upstream never produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionsSignature {
    pub count: usize,
    pub last_id: Option<String>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl TransactionsSignature {
    pub fn of(transactions: &[Transaction]) -> Self {
        TransactionsSignature {
            count: transactions.len(),
            last_id: transactions.last().map(|tx| tx.id.clone()),
            last_timestamp: transactions.iter().map(|tx| tx.timestamp).max(),
        }
    }
}
