//! Currency conversion against the portfolio's base currency.
//!
//! The engine values everything twice: once in the asset's native currency
//! and once in the base (reporting) currency. Exactly one foreign currency is
//! cross-valued, using a single nullable scalar rate supplied by the external
//! FX collaborator (base units per one foreign unit, e.g. IDR per USD).

use log::warn;
use rust_decimal::Decimal;

/// Converts native-currency amounts into the base currency.
///
/// A missing or non-positive rate converts to ZERO, never NaN and never a
/// panic; the native-currency figures stay intact either way.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    base_currency: String,
    foreign_currency: String,
    rate: Option<Decimal>,
}

impl CurrencyConverter {
    pub fn new(
        base_currency: impl Into<String>,
        foreign_currency: impl Into<String>,
        rate: Option<Decimal>,
    ) -> Self {
        Self {
            base_currency: base_currency.into(),
            foreign_currency: foreign_currency.into(),
            rate,
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Returns the usable rate, if any. Zero and negative rates are treated
    /// as absent.
    pub fn usable_rate(&self) -> Option<Decimal> {
        self.rate.filter(|r| *r > Decimal::ZERO)
    }

    /// Converts an amount in `currency` to the base currency.
    pub fn to_base(&self, amount: Decimal, currency: &str) -> Decimal {
        if currency == self.base_currency {
            return amount;
        }

        if currency == self.foreign_currency {
            return match self.usable_rate() {
                Some(rate) => amount * rate,
                None => {
                    warn!(
                        "No usable {}->{} rate. Base-currency value set to ZERO.",
                        self.foreign_currency, self.base_currency
                    );
                    Decimal::ZERO
                }
            };
        }

        warn!(
            "Unsupported currency '{}' (expected {} or {}). Base-currency value set to ZERO.",
            currency, self.base_currency, self.foreign_currency
        );
        Decimal::ZERO
    }
}
