use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;

use crate::fx::CurrencyConverter;
use crate::portfolio::positions::positions_model::{is_quantity_significant, Position};
use crate::portfolio::valuation::ValuationEngine;
use crate::transactions::{AssetClass, PartitionKey, Transaction, TransactionType};

/// Rebuilds one partition's position by folding its transactions in
/// timestamp order, then pricing the result.
///
/// The fold is pure: the output depends only on the transaction set, the
/// live price and the FX rate. No clock reads, no I/O, no shared state.
#[derive(Debug, Clone, Default)]
pub struct PositionBuilder {
    valuation: ValuationEngine,
}

/// Running reconciliation state for a single partition.
#[derive(Debug, Default)]
struct FoldState {
    quantity: Decimal,
    total_cost: Decimal,
    average_cost: Decimal,
    symbol: Option<String>,
    currency: Option<String>,
    qualifier: Option<String>,
    brand: Option<String>,
    manual_price: Option<Decimal>,
    last_price: Decimal,
    last_at: Option<DateTime<Utc>>,
    deleted: bool,
}

impl PositionBuilder {
    pub fn new() -> Self {
        PositionBuilder {
            valuation: ValuationEngine::new(),
        }
    }

    /// Folds a partition's transactions into a position.
    ///
    /// Transactions are sorted by timestamp internally; equal timestamps
    /// keep their relative order from the log, so callers may pass the log
    /// in any order. Returns `None` when the partition ends deleted, ends
    /// with zero or insignificant quantity, or is gold with no resolvable
    /// price.
    pub fn build(
        &self,
        key: &PartitionKey,
        quote_symbol: &str,
        transactions: &[&Transaction],
        live_price: Option<Decimal>,
        converter: &CurrencyConverter,
    ) -> Option<Position> {
        let mut ordered: Vec<&Transaction> = transactions.to_vec();
        ordered.sort_by_key(|tx| tx.timestamp);

        let mut state = FoldState::default();
        for tx in &ordered {
            match tx.kind() {
                TransactionType::Buy => self.apply_buy(&mut state, tx),
                TransactionType::Sell => self.apply_sell(&mut state, tx),
                TransactionType::Update => self.apply_update(&mut state, tx),
                TransactionType::Delete => self.apply_delete(&mut state),
                TransactionType::Unknown => {
                    warn!(
                        "Transaction {} has unrecognized type '{}'. Skipped.",
                        tx.id, tx.transaction_type
                    );
                }
            }
        }

        self.assemble(key, quote_symbol, state, live_price, converter)
    }

    /// BUY adds quantity at the transaction price and re-derives the
    /// weighted average cost. A buy on a deleted partition starts it over.
    fn apply_buy(&self, state: &mut FoldState, tx: &Transaction) {
        if tx.amount <= Decimal::ZERO {
            warn!(
                "BUY {} has non-positive amount {}. Skipped.",
                tx.id, tx.amount
            );
            return;
        }
        if tx.price < Decimal::ZERO {
            warn!("BUY {} has negative price {}. Skipped.", tx.id, tx.price);
            return;
        }

        self.note_transaction(state, tx);
        state.deleted = false;
        state.total_cost += tx.price * tx.amount;
        state.quantity += tx.amount;
        state.average_cost = state.total_cost / state.quantity;
    }

    /// SELL reduces quantity and relieves cost at the current average cost.
    /// The average itself never moves on a sell. Overselling is clamped to
    /// the open quantity.
    fn apply_sell(&self, state: &mut FoldState, tx: &Transaction) {
        if tx.amount <= Decimal::ZERO {
            warn!(
                "SELL {} has non-positive amount {}. Skipped.",
                tx.id, tx.amount
            );
            return;
        }
        if state.quantity <= Decimal::ZERO || !is_quantity_significant(&state.quantity) {
            warn!(
                "SELL {} for {} arrived with no open quantity. Skipped.",
                tx.id, tx.symbol
            );
            return;
        }

        self.note_transaction(state, tx);
        let mut sell_quantity = tx.amount;
        if sell_quantity > state.quantity {
            warn!(
                "SELL {} quantity {} exceeds open quantity {}. Selling the open quantity instead.",
                tx.id, sell_quantity, state.quantity
            );
            sell_quantity = state.quantity;
        }

        state.total_cost -= state.average_cost * sell_quantity;
        state.quantity -= sell_quantity;
        if state.quantity <= Decimal::ZERO || !is_quantity_significant(&state.quantity) {
            state.quantity = Decimal::ZERO;
            state.total_cost = Decimal::ZERO;
            state.average_cost = Decimal::ZERO;
        }
    }

    /// UPDATE is an absolute statement of fact: quantity and average cost
    /// are overwritten, not accumulated. An update on a deleted partition
    /// starts it over.
    fn apply_update(&self, state: &mut FoldState, tx: &Transaction) {
        if tx.amount < Decimal::ZERO {
            warn!(
                "UPDATE {} has negative amount {}. Skipped.",
                tx.id, tx.amount
            );
            return;
        }
        if tx.price < Decimal::ZERO {
            warn!("UPDATE {} has negative price {}. Skipped.", tx.id, tx.price);
            return;
        }

        self.note_transaction(state, tx);
        state.deleted = false;
        state.quantity = tx.amount;
        state.average_cost = tx.price;
        state.total_cost = tx.amount * tx.price;
    }

    /// DELETE resets the partition to nothing as of its point in the
    /// timeline. Only a later BUY or UPDATE brings it back.
    fn apply_delete(&self, state: &mut FoldState) {
        *state = FoldState::default();
        state.deleted = true;
    }

    /// Bookkeeping shared by every transaction that takes effect: identity
    /// fields, the manual price override and the last-transaction price all
    /// follow the most recent effective transaction.
    fn note_transaction(&self, state: &mut FoldState, tx: &Transaction) {
        if state.symbol.is_none() {
            state.symbol = Some(tx.symbol.trim().to_uppercase());
        }
        match &state.currency {
            None => state.currency = Some(tx.currency.clone()),
            Some(currency) if *currency != tx.currency => {
                warn!(
                    "Transaction {} currency {} differs from position currency {}. Keeping {}.",
                    tx.id, tx.currency, currency, currency
                );
            }
            _ => {}
        }
        state.qualifier = tx.qualifier().map(|q| q.to_string());
        if tx.asset_class == AssetClass::Gold {
            state.brand = tx.brand.clone().filter(|b| !b.trim().is_empty());
        }
        state.manual_price = tx.manual_price_override();
        state.last_price = tx.price;
        state.last_at = Some(tx.timestamp);
    }

    fn assemble(
        &self,
        key: &PartitionKey,
        quote_symbol: &str,
        state: FoldState,
        live_price: Option<Decimal>,
        converter: &CurrencyConverter,
    ) -> Option<Position> {
        if state.deleted {
            return None;
        }
        if state.quantity <= Decimal::ZERO || !is_quantity_significant(&state.quantity) {
            return None;
        }

        let mut position = Position::new(
            format!("{}:{}", key.asset_class.as_str(), key.key),
            key.asset_class,
            state.symbol?,
            state.qualifier,
            state.brand,
            quote_symbol.to_string(),
            state.currency?,
            state.last_at?,
        );
        position.quantity = state.quantity;
        position.average_cost = state.average_cost;
        position.cost_basis.local = state.total_cost;
        position.manual_price = state.manual_price;
        position.last_transaction_price = state.last_price;

        self.valuation.apply(&mut position, live_price, converter);

        if position.lacks_required_price() {
            warn!(
                "No price resolved for gold position {}. Excluded from output.",
                position.id
            );
            return None;
        }

        Some(position)
    }
}
