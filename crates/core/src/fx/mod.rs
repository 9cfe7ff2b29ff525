//! FX (Foreign Exchange) module - base-currency conversion.

mod currency_converter;

pub use currency_converter::CurrencyConverter;
