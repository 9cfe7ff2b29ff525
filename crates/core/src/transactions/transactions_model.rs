//! Transaction domain models.

use crate::errors::ValidationError;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Helper function to parse a string into a Decimal,
/// with support for scientific notation.
///
/// Malformed input falls back to ZERO rather than erroring, so a single bad
/// record in the log never aborts a reconciliation pass.
pub fn parse_decimal_string_tolerant(value_str: &str, field_name: &str) -> Decimal {
    match Decimal::from_str(value_str) {
        Ok(d) => d,
        Err(e_decimal) => match Decimal::from_scientific(value_str) {
            Ok(d) => d,
            Err(e_scientific) => {
                log::error!(
                    "Failed to parse {} '{}': as Decimal (err: {}), and as scientific (err: {}). Falling back to ZERO.",
                    field_name, value_str, e_decimal, e_scientific
                );
                Decimal::ZERO
            }
        },
    }
}

/// Enum representing the supported transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Buy,
    Sell,
    Update, // Absolute correction: overwrites quantity and average cost
    Delete, // Removal marker: clears the holding as of its timestamp
    Unknown,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        use crate::transactions::transactions_constants::*;
        match self {
            TransactionType::Buy => TRANSACTION_TYPE_BUY,
            TransactionType::Sell => TRANSACTION_TYPE_SELL,
            TransactionType::Update => TRANSACTION_TYPE_UPDATE,
            TransactionType::Delete => TRANSACTION_TYPE_DELETE,
            TransactionType::Unknown => TRANSACTION_TYPE_UNKNOWN,
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use crate::transactions::transactions_constants::*;
        match s {
            s if s == TRANSACTION_TYPE_BUY => Ok(TransactionType::Buy),
            s if s == TRANSACTION_TYPE_SELL => Ok(TransactionType::Sell),
            s if s == TRANSACTION_TYPE_UPDATE => Ok(TransactionType::Update),
            s if s == TRANSACTION_TYPE_DELETE => Ok(TransactionType::Delete),
            s if s == TRANSACTION_TYPE_UNKNOWN => Ok(TransactionType::Unknown),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// Asset classes tracked by the portfolio
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    Stock,
    Crypto,
    Gold,
    Cash,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        use crate::transactions::transactions_constants::*;
        match self {
            AssetClass::Stock => ASSET_CLASS_STOCK,
            AssetClass::Crypto => ASSET_CLASS_CRYPTO,
            AssetClass::Gold => ASSET_CLASS_GOLD,
            AssetClass::Cash => ASSET_CLASS_CASH,
        }
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use crate::transactions::transactions_constants::*;
        match s {
            s if s == ASSET_CLASS_STOCK => Ok(AssetClass::Stock),
            s if s == ASSET_CLASS_CRYPTO => Ok(AssetClass::Crypto),
            s if s == ASSET_CLASS_GOLD => Ok(AssetClass::Gold),
            s if s == ASSET_CLASS_CASH => Ok(AssetClass::Cash),
            _ => Err(format!("Unknown asset class: {}", s)),
        }
    }
}

/// Domain model representing one entry in the append-only transaction log.
///
/// Entries are immutable once written; corrections arrive as new UPDATE
/// transactions rather than edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    // Identity
    pub id: String,

    // Classification
    pub transaction_type: String, // Canonical type (BUY/SELL/UPDATE/DELETE)
    pub asset_class: AssetClass,

    // Holding identity
    pub symbol: String, // Ticker / crypto symbol / bank name
    pub broker: Option<String>,
    pub exchange: Option<String>,
    pub market: Option<String>, // e.g. IDX vs US; informational only
    #[serde(default)]
    #[serde(alias = "subtype")]
    pub brand: Option<String>, // Gold only (e.g. ANTAM, UBS)

    // Economics
    #[serde(default)]
    #[serde(deserialize_with = "decimal_input_format::deserialize")]
    pub amount: Decimal, // Quantity; always unsigned, sign implied by type
    #[serde(default)]
    #[serde(deserialize_with = "decimal_input_format::deserialize")]
    pub price: Decimal, // Unit price in the asset's native currency
    pub currency: String,

    // Valuation override
    #[serde(default)]
    pub use_manual_price: bool,
    #[serde(
        default,
        deserialize_with = "decimal_input_format::deserialize_option_decimal"
    )]
    pub manual_price: Option<Decimal>,

    // Timing
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Returns the typed transaction kind; unmapped strings come back as
    /// `Unknown` and are skipped by the reconciliation fold.
    pub fn kind(&self) -> TransactionType {
        TransactionType::from_str(&self.transaction_type).unwrap_or(TransactionType::Unknown)
    }

    /// Returns the partition qualifier: broker if set, else exchange.
    pub fn qualifier(&self) -> Option<&str> {
        self.broker.as_deref().or(self.exchange.as_deref())
    }

    /// Returns the manual valuation override carried by this transaction,
    /// if one is set and positive.
    pub fn manual_price_override(&self) -> Option<Decimal> {
        if self.use_manual_price {
            self.manual_price.filter(|p| *p > Decimal::ZERO)
        } else {
            None
        }
    }
}

/// Input model for creating a new transaction
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub id: Option<String>,
    pub transaction_type: String,
    pub asset_class: AssetClass,
    pub symbol: String,
    pub broker: Option<String>,
    pub exchange: Option<String>,
    pub market: Option<String>,
    #[serde(default)]
    #[serde(alias = "subtype")]
    pub brand: Option<String>,
    #[serde(
        default,
        deserialize_with = "decimal_input_format::deserialize_option_decimal"
    )]
    pub amount: Option<Decimal>,
    #[serde(
        default,
        deserialize_with = "decimal_input_format::deserialize_option_decimal"
    )]
    pub price: Option<Decimal>,
    pub currency: String,
    pub use_manual_price: Option<bool>,
    #[serde(
        default,
        deserialize_with = "decimal_input_format::deserialize_option_decimal"
    )]
    pub manual_price: Option<Decimal>,
    /// RFC3339 or YYYY-MM-DD; defaults to now when omitted.
    pub timestamp: Option<String>,
}

impl NewTransaction {
    /// Validates the new transaction data
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::MissingField("symbol".to_string()));
        }

        match TransactionType::from_str(self.transaction_type.trim()) {
            Ok(TransactionType::Unknown) | Err(_) => {
                return Err(ValidationError::InvalidInput(format!(
                    "Unsupported transaction type: {}",
                    self.transaction_type
                )));
            }
            Ok(_) => {}
        }

        if let Some(amount) = self.amount {
            if amount < Decimal::ZERO {
                return Err(ValidationError::InvalidInput(
                    "Amount cannot be negative; the sign is implied by the transaction type"
                        .to_string(),
                ));
            }
        }

        if let Some(ts) = &self.timestamp {
            if DateTime::parse_from_rfc3339(ts).is_err()
                && NaiveDate::parse_from_str(ts, "%Y-%m-%d").is_err()
            {
                return Err(ValidationError::InvalidInput(
                    "Invalid timestamp format. Expected ISO 8601/RFC3339 or YYYY-MM-DD"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Validates and converts the input into a log-ready [`Transaction`],
    /// assigning a fresh id when none was supplied.
    pub fn into_transaction(self) -> std::result::Result<Transaction, ValidationError> {
        self.validate()?;

        let timestamp = match &self.timestamp {
            Some(ts) => parse_flexible_timestamp(ts)?,
            None => Utc::now(),
        };

        Ok(Transaction {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            transaction_type: self.transaction_type.trim().to_uppercase(),
            asset_class: self.asset_class,
            symbol: self.symbol.trim().to_string(),
            broker: self.broker,
            exchange: self.exchange,
            market: self.market,
            brand: self.brand,
            amount: self.amount.unwrap_or(Decimal::ZERO),
            price: self.price.unwrap_or(Decimal::ZERO),
            currency: self.currency,
            use_manual_price: self.use_manual_price.unwrap_or(false),
            manual_price: self.manual_price,
            timestamp,
        })
    }
}

/// Parses RFC3339 or date-only (midnight UTC) timestamps.
fn parse_flexible_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()))
}

// Custom serialization for timestamps to ensure consistent ISO 8601 formatting
mod timestamp_format {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // First try parsing as RFC3339/ISO8601
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return Ok(dt.with_timezone(&Utc));
        }

        // Then try as date-only format
        if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            // Use midnight UTC for date-only values
            return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
        }

        Err(serde::de::Error::custom(format!(
            "Invalid timestamp format: {}. Expected ISO 8601/RFC3339 or YYYY-MM-DD",
            s
        )))
    }
}

// Custom deserialization for Decimal inputs to support strings, numbers, nulls,
// and scientific notation. Malformed values coerce to ZERO instead of failing
// the whole record.
mod decimal_input_format {
    use super::parse_decimal_string_tolerant;
    use rust_decimal::Decimal;
    use serde::{self, Deserialize, Deserializer};
    use serde_json::Number;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DecimalInput {
        String(String),
        Number(Number),
        Null,
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<DecimalInput>::deserialize(deserializer)?;
        match raw {
            None | Some(DecimalInput::Null) => Ok(Decimal::ZERO),
            Some(DecimalInput::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(Decimal::ZERO);
                }
                Ok(parse_decimal_string_tolerant(trimmed, "decimal field"))
            }
            Some(DecimalInput::Number(n)) => {
                Ok(parse_decimal_string_tolerant(&n.to_string(), "decimal field"))
            }
        }
    }

    pub fn deserialize_option_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<DecimalInput>::deserialize(deserializer)?;
        match raw {
            None | Some(DecimalInput::Null) => Ok(None),
            Some(DecimalInput::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                Ok(Some(parse_decimal_string_tolerant(
                    trimmed,
                    "decimal field",
                )))
            }
            Some(DecimalInput::Number(n)) => Ok(Some(parse_decimal_string_tolerant(
                &n.to_string(),
                "decimal field",
            ))),
        }
    }
}
