//! Price quote domain model.
//!
//! Quotes arrive from an external price collaborator as a partial map of
//! quote symbol to [`PriceQuote`]. The engine never fetches prices itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A current price for one quote symbol, in the asset's native currency.
///
/// Gold quotes are keyed per brand (`GOLD:ANTAM`); everything else is keyed
/// by bare uppercased symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub price: Decimal,
    pub currency: String,
}

impl PriceQuote {
    pub fn new(price: Decimal, currency: impl Into<String>) -> Self {
        Self {
            price,
            currency: currency.into(),
        }
    }

    /// A quote only participates in valuation when its price is positive.
    pub fn is_usable(&self) -> bool {
        self.price > Decimal::ZERO
    }
}
