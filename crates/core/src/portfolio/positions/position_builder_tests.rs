#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::fx::CurrencyConverter;
    use crate::portfolio::positions::{Position, PositionBuilder};
    use crate::transactions::{AssetClass, PartitionKey, Transaction};

    fn ts(value: &str) -> DateTime<Utc> {
        value.parse::<DateTime<Utc>>().unwrap()
    }

    fn create_test_transaction(
        id: &str,
        transaction_type: &str,
        asset_class: AssetClass,
        symbol: &str,
        amount: Decimal,
        price: Decimal,
        timestamp: &str,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            transaction_type: transaction_type.to_string(),
            asset_class,
            symbol: symbol.to_string(),
            broker: Some("Mirae".to_string()),
            exchange: None,
            market: None,
            brand: None,
            amount,
            price,
            currency: "IDR".to_string(),
            use_manual_price: false,
            manual_price: None,
            timestamp: ts(timestamp),
        }
    }

    fn stock_buy(id: &str, amount: Decimal, price: Decimal, timestamp: &str) -> Transaction {
        create_test_transaction(id, "BUY", AssetClass::Stock, "BBCA", amount, price, timestamp)
    }

    fn stock_sell(id: &str, amount: Decimal, timestamp: &str) -> Transaction {
        create_test_transaction(
            id,
            "SELL",
            AssetClass::Stock,
            "BBCA",
            amount,
            dec!(9000),
            timestamp,
        )
    }

    fn stock_key() -> PartitionKey {
        PartitionKey {
            asset_class: AssetClass::Stock,
            key: "BBCA|MIRAE".to_string(),
        }
    }

    fn build_stock(transactions: &[&Transaction], live_price: Option<Decimal>) -> Option<Position> {
        let builder = PositionBuilder::new();
        let converter = CurrencyConverter::new("IDR", "USD", Some(dec!(15000)));
        builder.build(&stock_key(), "BBCA", transactions, live_price, &converter)
    }

    // ==================== Buys and weighted average cost ====================

    #[test]
    fn test_buys_accumulate_weighted_average_cost() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let buy2 = stock_buy("tx-2", dec!(100), dec!(7000), "2024-02-10T10:00:00Z");

        let position = build_stock(&[&buy1, &buy2], None).unwrap();

        assert_eq!(position.quantity, dec!(200));
        assert_eq!(position.average_cost, dec!(6000));
        assert_eq!(position.cost_basis.local, dec!(1200000));
    }

    #[test]
    fn test_built_position_is_priced_and_valued() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let buy2 = stock_buy("tx-2", dec!(100), dec!(7000), "2024-02-10T10:00:00Z");

        let position = build_stock(&[&buy1, &buy2], Some(dec!(10000))).unwrap();

        assert_eq!(position.current_price, dec!(10000));
        assert_eq!(position.market_value.local, dec!(2000000));
        assert_eq!(position.gain.local, dec!(800000));
        assert_eq!(position.gain_percentage, dec!(66.666667));
    }

    #[test]
    fn test_position_identity_fields() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");

        let position = build_stock(&[&buy], None).unwrap();

        assert_eq!(position.id, "STOCK:BBCA|MIRAE");
        assert_eq!(position.asset_class, AssetClass::Stock);
        assert_eq!(position.symbol, "BBCA");
        assert_eq!(position.qualifier.as_deref(), Some("Mirae"));
        assert_eq!(position.brand, None);
        assert_eq!(position.quote_symbol, "BBCA");
        assert_eq!(position.currency, "IDR");
        assert_eq!(position.last_transaction_at, ts("2024-01-10T10:00:00Z"));
        assert_eq!(position.last_transaction_price, dec!(5000));
    }

    // ==================== Sells ====================

    #[test]
    fn test_sell_reduces_at_average_cost_without_changing_it() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let buy2 = stock_buy("tx-2", dec!(100), dec!(7000), "2024-02-10T10:00:00Z");
        let sell = stock_sell("tx-3", dec!(150), "2024-03-10T10:00:00Z");

        let position = build_stock(&[&buy1, &buy2, &sell], None).unwrap();

        assert_eq!(position.quantity, dec!(50));
        assert_eq!(position.average_cost, dec!(6000));
        assert_eq!(position.cost_basis.local, dec!(300000));
    }

    #[test]
    fn test_full_sell_suppresses_position() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let sell = stock_sell("tx-2", dec!(100), "2024-02-10T10:00:00Z");

        assert!(build_stock(&[&buy, &sell], None).is_none());
    }

    #[test]
    fn test_oversell_clamps_to_open_quantity() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let sell = stock_sell("tx-2", dec!(150), "2024-02-10T10:00:00Z");
        let buy2 = stock_buy("tx-3", dec!(50), dec!(8000), "2024-03-10T10:00:00Z");

        // The oversell closes the position; quantity never goes negative,
        // so the later buy starts from a clean slate.
        let position = build_stock(&[&buy1, &sell, &buy2], None).unwrap();

        assert_eq!(position.quantity, dec!(50));
        assert_eq!(position.average_cost, dec!(8000));
        assert_eq!(position.cost_basis.local, dec!(400000));
    }

    #[test]
    fn test_sell_with_no_open_quantity_is_skipped() {
        let sell = stock_sell("tx-1", dec!(100), "2024-01-10T10:00:00Z");
        assert!(build_stock(&[&sell], None).is_none());

        let buy = stock_buy("tx-2", dec!(100), dec!(5000), "2024-02-10T10:00:00Z");
        let position = build_stock(&[&sell, &buy], None).unwrap();

        assert_eq!(position.quantity, dec!(100));
        assert_eq!(position.average_cost, dec!(5000));
    }

    // ==================== Updates ====================

    #[test]
    fn test_update_overwrites_quantity_and_cost() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let update = create_test_transaction(
            "tx-2",
            "UPDATE",
            AssetClass::Stock,
            "BBCA",
            dec!(250),
            dec!(4500),
            "2024-02-10T10:00:00Z",
        );

        let position = build_stock(&[&buy, &update], None).unwrap();

        assert_eq!(position.quantity, dec!(250));
        assert_eq!(position.average_cost, dec!(4500));
        assert_eq!(position.cost_basis.local, dec!(1125000));
    }

    #[test]
    fn test_update_to_zero_quantity_suppresses_position() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let update = create_test_transaction(
            "tx-2",
            "UPDATE",
            AssetClass::Stock,
            "BBCA",
            Decimal::ZERO,
            dec!(4500),
            "2024-02-10T10:00:00Z",
        );

        assert!(build_stock(&[&buy, &update], None).is_none());
    }

    // ==================== Deletes ====================

    #[test]
    fn test_trailing_delete_removes_position() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let delete = create_test_transaction(
            "tx-2",
            "DELETE",
            AssetClass::Stock,
            "BBCA",
            Decimal::ZERO,
            Decimal::ZERO,
            "2024-02-10T10:00:00Z",
        );

        assert!(build_stock(&[&buy, &delete], None).is_none());
    }

    #[test]
    fn test_buy_after_delete_starts_fresh() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let delete = create_test_transaction(
            "tx-2",
            "DELETE",
            AssetClass::Stock,
            "BBCA",
            Decimal::ZERO,
            Decimal::ZERO,
            "2024-02-10T10:00:00Z",
        );
        let buy2 = stock_buy("tx-3", dec!(10), dec!(8000), "2024-03-10T10:00:00Z");

        let position = build_stock(&[&buy1, &delete, &buy2], None).unwrap();

        // Nothing from before the delete leaks into the resurrected position.
        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.average_cost, dec!(8000));
        assert_eq!(position.cost_basis.local, dec!(80000));
        assert_eq!(position.last_transaction_at, ts("2024-03-10T10:00:00Z"));
    }

    #[test]
    fn test_update_after_delete_starts_fresh() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let delete = create_test_transaction(
            "tx-2",
            "DELETE",
            AssetClass::Stock,
            "BBCA",
            Decimal::ZERO,
            Decimal::ZERO,
            "2024-02-10T10:00:00Z",
        );
        let update = create_test_transaction(
            "tx-3",
            "UPDATE",
            AssetClass::Stock,
            "BBCA",
            dec!(40),
            dec!(6000),
            "2024-03-10T10:00:00Z",
        );

        let position = build_stock(&[&buy, &delete, &update], None).unwrap();

        assert_eq!(position.quantity, dec!(40));
        assert_eq!(position.average_cost, dec!(6000));
    }

    #[test]
    fn test_sell_after_delete_does_not_resurrect() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let delete = create_test_transaction(
            "tx-2",
            "DELETE",
            AssetClass::Stock,
            "BBCA",
            Decimal::ZERO,
            Decimal::ZERO,
            "2024-02-10T10:00:00Z",
        );
        let sell = stock_sell("tx-3", dec!(10), "2024-03-10T10:00:00Z");

        assert!(build_stock(&[&buy, &delete, &sell], None).is_none());
    }

    // ==================== Ordering ====================

    #[test]
    fn test_out_of_order_input_matches_sorted_input() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let buy2 = stock_buy("tx-2", dec!(100), dec!(7000), "2024-02-10T10:00:00Z");
        let sell = stock_sell("tx-3", dec!(150), "2024-03-10T10:00:00Z");

        let sorted = build_stock(&[&buy1, &buy2, &sell], Some(dec!(10000))).unwrap();
        let shuffled = build_stock(&[&sell, &buy2, &buy1], Some(dec!(10000))).unwrap();

        assert_eq!(sorted, shuffled);
    }

    #[test]
    fn test_equal_timestamps_keep_log_order() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let sell = stock_sell("tx-2", dec!(100), "2024-01-10T10:00:00Z");

        // Buy first in the log: the sell closes the position.
        assert!(build_stock(&[&buy, &sell], None).is_none());

        // Sell first in the log: it finds no open quantity and is skipped,
        // leaving the buy in force.
        let position = build_stock(&[&sell, &buy], None).unwrap();
        assert_eq!(position.quantity, dec!(100));
    }

    // ==================== Malformed input ====================

    #[test]
    fn test_unrecognized_type_is_skipped() {
        let buy = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let bogus = create_test_transaction(
            "tx-2",
            "SPLIT",
            AssetClass::Stock,
            "BBCA",
            dec!(2),
            Decimal::ZERO,
            "2024-02-10T10:00:00Z",
        );

        let position = build_stock(&[&buy, &bogus], None).unwrap();

        assert_eq!(position.quantity, dec!(100));
        assert_eq!(position.average_cost, dec!(5000));
        // A skipped transaction leaves no trace in the bookkeeping either.
        assert_eq!(position.last_transaction_at, ts("2024-01-10T10:00:00Z"));
    }

    #[test]
    fn test_non_positive_amounts_and_negative_prices_are_skipped() {
        let good = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let zero_buy = stock_buy("tx-2", Decimal::ZERO, dec!(5000), "2024-02-10T10:00:00Z");
        let negative_price = stock_buy("tx-3", dec!(10), dec!(-5), "2024-03-10T10:00:00Z");
        let negative_update = create_test_transaction(
            "tx-4",
            "UPDATE",
            AssetClass::Stock,
            "BBCA",
            dec!(-20),
            dec!(5000),
            "2024-04-10T10:00:00Z",
        );
        let zero_sell = stock_sell("tx-5", Decimal::ZERO, "2024-05-10T10:00:00Z");

        let position = build_stock(
            &[&good, &zero_buy, &negative_price, &negative_update, &zero_sell],
            None,
        )
        .unwrap();

        assert_eq!(position.quantity, dec!(100));
        assert_eq!(position.average_cost, dec!(5000));
    }

    #[test]
    fn test_currency_mismatch_keeps_first_currency() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let mut buy2 = stock_buy("tx-2", dec!(100), dec!(7000), "2024-02-10T10:00:00Z");
        buy2.currency = "USD".to_string();

        let position = build_stock(&[&buy1, &buy2], None).unwrap();

        assert_eq!(position.currency, "IDR");
        assert_eq!(position.quantity, dec!(200));
    }

    // ==================== Pricing ====================

    #[test]
    fn test_manual_price_rides_latest_transaction() {
        let buy1 = stock_buy("tx-1", dec!(100), dec!(5000), "2024-01-10T10:00:00Z");
        let mut buy2 = stock_buy("tx-2", dec!(100), dec!(7000), "2024-02-10T10:00:00Z");
        buy2.use_manual_price = true;
        buy2.manual_price = Some(dec!(9500));

        let position = build_stock(&[&buy1, &buy2], Some(dec!(8000))).unwrap();
        assert_eq!(position.manual_price, Some(dec!(9500)));
        assert_eq!(position.current_price, dec!(9500));

        // A later transaction without the override switches back to the
        // live quote.
        let buy3 = stock_buy("tx-3", dec!(10), dec!(7500), "2024-03-10T10:00:00Z");
        let position = build_stock(&[&buy1, &buy2, &buy3], Some(dec!(8000))).unwrap();
        assert_eq!(position.manual_price, None);
        assert_eq!(position.current_price, dec!(8000));
    }

    #[test]
    fn test_gold_without_any_price_is_excluded() {
        let builder = PositionBuilder::new();
        let converter = CurrencyConverter::new("IDR", "USD", None);
        let key = PartitionKey {
            asset_class: AssetClass::Gold,
            key: "GOLD|PEGADAIAN|ANTAM".to_string(),
        };

        let mut update = create_test_transaction(
            "tx-1",
            "UPDATE",
            AssetClass::Gold,
            "GOLD",
            dec!(5),
            Decimal::ZERO,
            "2024-01-10T10:00:00Z",
        );
        update.broker = Some("Pegadaian".to_string());
        update.brand = Some("ANTAM".to_string());

        assert!(builder
            .build(&key, "GOLD:ANTAM", &[&update], None, &converter)
            .is_none());

        // With a live quote the same holding is presentable.
        let position = builder
            .build(&key, "GOLD:ANTAM", &[&update], Some(dec!(1150000)), &converter)
            .unwrap();
        assert_eq!(position.brand.as_deref(), Some("ANTAM"));
        assert_eq!(position.market_value.local, dec!(5750000));
    }

    #[test]
    fn test_cash_defaults_to_unit_price() {
        let builder = PositionBuilder::new();
        let converter = CurrencyConverter::new("IDR", "USD", Some(dec!(15000)));
        let key = PartitionKey {
            asset_class: AssetClass::Cash,
            key: "IDR|BCA".to_string(),
        };

        let mut update = create_test_transaction(
            "tx-1",
            "UPDATE",
            AssetClass::Cash,
            "IDR",
            dec!(2500000),
            Decimal::ZERO,
            "2024-01-10T10:00:00Z",
        );
        update.broker = Some("BCA".to_string());

        let position = builder
            .build(&key, "IDR", &[&update], None, &converter)
            .unwrap();

        assert_eq!(position.current_price, Decimal::ONE);
        assert_eq!(position.market_value.local, dec!(2500000));
        assert_eq!(position.gain.local, Decimal::ZERO);
    }
}
