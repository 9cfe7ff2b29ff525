//! Portfolio valuation domain models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::transactions::AssetClass;

/// One asset class's share of the portfolio, in the base currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassAllocation {
    pub asset_class: AssetClass,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub gain: Decimal,
    /// Share of total portfolio value, on a 0-100 scale.
    pub weight: Decimal,
}

/// Portfolio-level aggregates in the base currency.
///
/// Cash counts toward `total_value` but stays out of `total_cost` and
/// `total_gain`: a cash balance is not an investment with a P&L.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub base_currency: String,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub total_gain: Decimal,
    /// Gain over invested cost, on a 0-100 scale.
    pub total_gain_percentage: Decimal,
    /// Per-class breakdown, sorted by descending market value.
    pub allocations: Vec<ClassAllocation>,
    pub position_count: usize,
}

impl PortfolioSummary {
    pub fn empty(base_currency: impl Into<String>) -> Self {
        PortfolioSummary {
            base_currency: base_currency.into(),
            total_value: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            total_gain: Decimal::ZERO,
            total_gain_percentage: Decimal::ZERO,
            allocations: Vec::new(),
            position_count: 0,
        }
    }
}
