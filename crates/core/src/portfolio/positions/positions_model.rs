use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::QUANTITY_THRESHOLD;
use crate::transactions::AssetClass;

/// Quantities below the threshold are treated as zero so dust left over from
/// decimal arithmetic never survives as a phantom holding.
pub fn is_quantity_significant(quantity: &Decimal) -> bool {
    let threshold =
        Decimal::from_str_radix(QUANTITY_THRESHOLD, 10).unwrap_or_else(|_| Decimal::new(1, 9));
    quantity.abs() >= threshold
}

/// A value carried in both the asset's native currency and the portfolio's
/// base currency.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonetaryValue {
    pub local: Decimal,
    pub base: Decimal,
}

impl MonetaryValue {
    pub fn zero() -> Self {
        MonetaryValue {
            local: Decimal::ZERO,
            base: Decimal::ZERO,
        }
    }
}

/// A reconciled holding, fully derived from the transaction log.
///
/// Positions are never persisted or edited directly; every rebuild recreates
/// them from scratch. Alongside the valuation output they carry the inputs
/// needed to revalue cheaply when only a price or the FX rate changes:
/// `quote_symbol` (price-map lookup key), `manual_price` (override carried on
/// the partition's latest transaction) and `last_transaction_price` (the
/// final price fallback).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    // Identity
    pub id: String,
    pub asset_class: AssetClass,
    pub symbol: String,
    pub qualifier: Option<String>, // Broker or exchange, as written in the log
    pub brand: Option<String>,     // Gold only
    pub quote_symbol: String,

    // Reconciled quantities, in the asset's native currency
    pub currency: String,
    pub quantity: Decimal,
    /// Average cost per unit. Changes only on BUY (weighted average) or
    /// UPDATE (overwrite); SELL relieves cost at this price without moving it.
    pub average_cost: Decimal,
    pub cost_basis: MonetaryValue,

    // Valuation
    pub current_price: Decimal,
    pub market_value: MonetaryValue,
    pub gain: MonetaryValue,
    pub gain_percentage: Decimal,

    // Revaluation inputs
    pub manual_price: Option<Decimal>,
    pub last_transaction_price: Decimal,
    pub last_transaction_at: DateTime<Utc>,
}

impl Position {
    /// Creates a position with identity set and all economics zeroed; the
    /// builder and valuation engine fill in the rest.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        asset_class: AssetClass,
        symbol: String,
        qualifier: Option<String>,
        brand: Option<String>,
        quote_symbol: String,
        currency: String,
        last_transaction_at: DateTime<Utc>,
    ) -> Self {
        Position {
            id,
            asset_class,
            symbol,
            qualifier,
            brand,
            quote_symbol,
            currency,
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            cost_basis: MonetaryValue::zero(),
            current_price: Decimal::ZERO,
            market_value: MonetaryValue::zero(),
            gain: MonetaryValue::zero(),
            gain_percentage: Decimal::ZERO,
            manual_price: None,
            last_transaction_price: Decimal::ZERO,
            last_transaction_at,
        }
    }

    /// Gold has no face value: when no price resolves through the fallback
    /// chain the holding cannot be presented and is excluded from output.
    pub fn lacks_required_price(&self) -> bool {
        self.asset_class == AssetClass::Gold && self.current_price <= Decimal::ZERO
    }
}
