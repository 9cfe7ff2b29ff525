use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::constants::DECIMAL_PRECISION;
use crate::fx::CurrencyConverter;
use crate::portfolio::positions::Position;
use crate::portfolio::valuation::valuation_model::{ClassAllocation, PortfolioSummary};
use crate::transactions::AssetClass;

/// Prices positions and aggregates portfolio-level totals.
///
/// The same engine runs on both paths that touch market values: the full
/// rebuild after a transaction change and the in-place revaluation after a
/// price or FX change. A position priced twice with the same inputs always
/// carries the same numbers.
#[derive(Debug, Clone, Default)]
pub struct ValuationEngine;

impl ValuationEngine {
    pub fn new() -> Self {
        ValuationEngine
    }

    /// Fallback price when no manual, live, or transaction price is usable.
    /// A cash unit is always worth one unit of its own currency.
    fn default_price(asset_class: AssetClass) -> Decimal {
        match asset_class {
            AssetClass::Cash => Decimal::ONE,
            _ => Decimal::ZERO,
        }
    }

    /// Resolves the effective price for a position.
    ///
    /// Precedence: manual override, then the live quote, then the price of
    /// the most recent transaction, then the class default. A candidate only
    /// wins when it is strictly positive.
    pub fn resolve_price(&self, position: &Position, live_price: Option<Decimal>) -> Decimal {
        position
            .manual_price
            .filter(|price| *price > Decimal::ZERO)
            .or_else(|| live_price.filter(|price| *price > Decimal::ZERO))
            .or_else(|| {
                Some(position.last_transaction_price)
                    .filter(|price| *price > Decimal::ZERO)
            })
            .unwrap_or_else(|| Self::default_price(position.asset_class))
    }

    /// Prices one position in place: resolves the effective price, then
    /// recomputes market value, base-currency cost, and gains.
    ///
    /// Cash positions get no P&L. Their cost basis is forced to the market
    /// value so gain and gain percentage stay at zero.
    pub fn apply(
        &self,
        position: &mut Position,
        live_price: Option<Decimal>,
        converter: &CurrencyConverter,
    ) {
        let price = self.resolve_price(position, live_price);
        position.current_price = price;

        position.market_value.local = position.quantity * price;
        position.market_value.base =
            converter.to_base(position.market_value.local, &position.currency);

        if position.asset_class == AssetClass::Cash {
            position.cost_basis = position.market_value.clone();
            position.gain.local = Decimal::ZERO;
            position.gain.base = Decimal::ZERO;
            position.gain_percentage = Decimal::ZERO;
            return;
        }

        position.cost_basis.base = converter.to_base(position.cost_basis.local, &position.currency);
        position.gain.local = position.market_value.local - position.cost_basis.local;
        position.gain.base = position.market_value.base - position.cost_basis.base;
        position.gain_percentage = if position.cost_basis.local > Decimal::ZERO {
            (position.gain.local / position.cost_basis.local * Decimal::ONE_HUNDRED)
                .round_dp(DECIMAL_PRECISION)
        } else {
            Decimal::ZERO
        };
    }

    /// Aggregates already-priced positions into base-currency totals.
    ///
    /// Every class contributes to `total_value`. Cash is left out of
    /// `total_cost` and `total_gain` so a large idle balance does not dilute
    /// the investment return.
    pub fn summarize(
        &self,
        assets_by_class: &HashMap<AssetClass, Vec<Position>>,
        base_currency: &str,
    ) -> PortfolioSummary {
        let mut summary = PortfolioSummary::empty(base_currency);

        for (asset_class, positions) in assets_by_class {
            if positions.is_empty() {
                continue;
            }

            let mut class_value = Decimal::ZERO;
            let mut class_cost = Decimal::ZERO;
            let mut class_gain = Decimal::ZERO;
            for position in positions {
                class_value += position.market_value.base;
                class_cost += position.cost_basis.base;
                class_gain += position.gain.base;
            }

            summary.total_value += class_value;
            summary.position_count += positions.len();
            if *asset_class != AssetClass::Cash {
                summary.total_cost += class_cost;
                summary.total_gain += class_gain;
            }

            summary.allocations.push(ClassAllocation {
                asset_class: *asset_class,
                market_value: class_value,
                cost_basis: class_cost,
                gain: class_gain,
                weight: Decimal::ZERO,
            });
        }

        summary.total_gain_percentage = if summary.total_cost > Decimal::ZERO {
            (summary.total_gain / summary.total_cost * Decimal::ONE_HUNDRED)
                .round_dp(DECIMAL_PRECISION)
        } else {
            Decimal::ZERO
        };

        if summary.total_value > Decimal::ZERO {
            for allocation in &mut summary.allocations {
                allocation.weight = (allocation.market_value / summary.total_value
                    * Decimal::ONE_HUNDRED)
                    .round_dp(DECIMAL_PRECISION);
            }
        }

        summary
            .allocations
            .sort_by(|a, b| b.market_value.cmp(&a.market_value).then(a.asset_class.cmp(&b.asset_class)));

        summary
    }
}
