/// Transaction types
///
/// Each constant represents one of the supported transaction log entries.

/// Acquisition of an asset. Increases quantity; average cost becomes the
/// weighted average of the prior basis and the new lot.
pub const TRANSACTION_TYPE_BUY: &str = "BUY";

/// Disposal of an asset. Decreases quantity at the current average cost;
/// never changes the average cost itself.
pub const TRANSACTION_TYPE_SELL: &str = "SELL";

/// Absolute correction. Overwrites quantity and average cost with the
/// transaction's own values (last write wins).
pub const TRANSACTION_TYPE_UPDATE: &str = "UPDATE";

/// Removal marker. Clears the holding as of its timestamp; a later BUY or
/// UPDATE starts the holding over from scratch.
pub const TRANSACTION_TYPE_DELETE: &str = "DELETE";

/// Unknown or unmapped transaction type. Skipped during reconciliation.
pub const TRANSACTION_TYPE_UNKNOWN: &str = "UNKNOWN";

/// Asset classes
///
/// Listed stocks (IDX, US, ...).
pub const ASSET_CLASS_STOCK: &str = "STOCK";

/// Crypto assets.
pub const ASSET_CLASS_CRYPTO: &str = "CRYPTO";

/// Physical gold, tracked per brand (e.g. ANTAM, UBS).
pub const ASSET_CLASS_GOLD: &str = "GOLD";

/// Cash balances held at a bank, keyed by bank name.
pub const ASSET_CLASS_CASH: &str = "CASH";

/// Transaction types that change a holding's quantity or basis.
pub const MUTATING_TRANSACTION_TYPES: [&str; 4] = [
    TRANSACTION_TYPE_BUY,
    TRANSACTION_TYPE_SELL,
    TRANSACTION_TYPE_UPDATE,
    TRANSACTION_TYPE_DELETE,
];

/// Checks whether a transaction type participates in reconciliation.
pub fn is_mutating_transaction(transaction_type: &str) -> bool {
    MUTATING_TRANSACTION_TYPES.contains(&transaction_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mutating_transaction_returns_true_for_known_types() {
        assert!(is_mutating_transaction(TRANSACTION_TYPE_BUY));
        assert!(is_mutating_transaction(TRANSACTION_TYPE_SELL));
        assert!(is_mutating_transaction(TRANSACTION_TYPE_UPDATE));
        assert!(is_mutating_transaction(TRANSACTION_TYPE_DELETE));
    }

    #[test]
    fn test_is_mutating_transaction_returns_false_for_unknown_types() {
        assert!(!is_mutating_transaction(TRANSACTION_TYPE_UNKNOWN));
        assert!(!is_mutating_transaction("DIVIDEND"));
        assert!(!is_mutating_transaction(""));
        assert!(!is_mutating_transaction("buy")); // lowercase
    }
}
