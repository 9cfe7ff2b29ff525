use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use log::{debug, error, warn};
use rust_decimal::Decimal;

use crate::constants::{DEFAULT_BASE_CURRENCY, DEFAULT_FOREIGN_CURRENCY};
use crate::fx::CurrencyConverter;
use crate::portfolio::positions::{Position, PositionBuilder};
use crate::portfolio::state::state_model::{PortfolioState, TransactionsSignature};
use crate::portfolio::state::subscriptions::{
    panic_message, SnapshotSubscriber, SubscriberRegistry, Subscription,
};
use crate::portfolio::valuation::{PortfolioSummary, ValuationEngine};
use crate::quotes::PriceQuote;
use crate::transactions::{
    AssetClass, NewTransaction, PartitionKeyResolver, Transaction, TRANSACTION_TYPE_DELETE,
};

/// A state change waiting its turn in the single-flight queue.
enum Mutation {
    Initialize {
        assets: HashMap<AssetClass, Vec<Position>>,
        transactions: Vec<Transaction>,
    },
    ReplaceTransactions(Vec<Transaction>),
    AppendTransaction(Transaction),
    MergePrices(HashMap<String, PriceQuote>),
    SetExchangeRate(Option<Decimal>),
    Rebuild,
    Reset,
}

impl Mutation {
    fn describe(&self) -> &'static str {
        match self {
            Mutation::Initialize { .. } => "initialize",
            Mutation::ReplaceTransactions(_) => "replace transactions",
            Mutation::AppendTransaction(_) => "append transaction",
            Mutation::MergePrices(_) => "merge prices",
            Mutation::SetExchangeRate(_) => "set exchange rate",
            Mutation::Rebuild => "rebuild",
            Mutation::Reset => "reset",
        }
    }
}

struct MutationQueue {
    pending: VecDeque<Mutation>,
    in_flight: bool,
}

struct ManagerInner {
    base_currency: String,
    foreign_currency: String,
    resolver: PartitionKeyResolver,
    builder: PositionBuilder,
    valuation: ValuationEngine,
    state: RwLock<PortfolioState>,
    /// Fingerprint of the last reconciled transaction set.
    signature: Mutex<Option<TransactionsSignature>>,
    queue: Mutex<MutationQueue>,
    subscribers: Arc<SubscriberRegistry>,
}

/// Owns the canonical portfolio state and serializes every change to it.
///
/// All mutating operations funnel through a mutex-guarded FIFO queue with an
/// in-flight flag: the caller that flips the flag drains the queue to empty
/// on its own thread, and callers arriving mid-drain (including subscriber
/// callbacks reentering during notify) enqueue and return. At most one
/// rebuild runs at a time, no accepted mutation is ever dropped, and queued
/// mutations execute in submission order.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct StateManager {
    inner: Arc<ManagerInner>,
}

impl StateManager {
    pub fn new(base_currency: impl Into<String>, foreign_currency: impl Into<String>) -> Self {
        StateManager {
            inner: Arc::new(ManagerInner {
                base_currency: base_currency.into(),
                foreign_currency: foreign_currency.into(),
                resolver: PartitionKeyResolver::new(),
                builder: PositionBuilder::new(),
                valuation: ValuationEngine::new(),
                state: RwLock::new(PortfolioState::default()),
                signature: Mutex::new(None),
                queue: Mutex::new(MutationQueue {
                    pending: VecDeque::new(),
                    in_flight: false,
                }),
                subscribers: Arc::new(SubscriberRegistry::new()),
            }),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.inner.base_currency
    }

    // ==================== Public operations ====================

    /// One-shot seed of the portfolio from persisted data. Replaces the
    /// whole state, marks the manager initialized and notifies subscribers.
    ///
    /// The seeded positions are displayed as-is until the next transaction
    /// mutation rebuilds them; the rebuild-skipping fingerprint is cleared so
    /// that mutation always runs.
    pub fn initialize(
        &self,
        assets: HashMap<AssetClass, Vec<Position>>,
        transactions: Vec<Transaction>,
    ) {
        self.submit(Mutation::Initialize {
            assets,
            transactions,
        });
    }

    /// Replaces the transaction log and rebuilds every position.
    ///
    /// Duplicate ids keep their first occurrence. A set whose fingerprint
    /// matches the last reconciled one is skipped entirely.
    pub fn update_transactions(&self, transactions: Vec<Transaction>) {
        self.submit(Mutation::ReplaceTransactions(transactions));
    }

    /// Merges live quotes into the price cache and revalues in place.
    /// Quotes identical to the cached entry are ignored; if nothing changed
    /// the whole call is a no-op.
    pub fn update_prices(&self, prices: HashMap<String, PriceQuote>) {
        self.submit(Mutation::MergePrices(prices));
    }

    /// Sets the foreign-to-base exchange rate and revalues in place.
    /// `None` means no rate is available: base-currency figures of foreign
    /// positions drop to ZERO until a rate arrives.
    pub fn update_exchange_rate(&self, rate: Option<Decimal>) {
        self.submit(Mutation::SetExchangeRate(rate));
    }

    /// Forces a full rebuild from the current transaction log.
    pub fn rebuild_portfolio(&self) {
        self.submit(Mutation::Rebuild);
    }

    /// Validates the input, appends it to the log and rebuilds. Returns the
    /// transaction id, or `None` when validation failed (logged, no panic).
    pub fn add_transaction(&self, input: NewTransaction) -> Option<String> {
        match input.into_transaction() {
            Ok(transaction) => {
                let id = transaction.id.clone();
                self.submit(Mutation::AppendTransaction(transaction));
                Some(id)
            }
            Err(err) => {
                warn!("Rejected new transaction: {}", err);
                None
            }
        }
    }

    /// Appends a DELETE for the addressed partition, removing it from
    /// output until a later BUY or UPDATE starts it over. For gold the
    /// brand is part of the address.
    pub fn delete_asset(
        &self,
        asset_class: AssetClass,
        symbol: &str,
        qualifier: Option<&str>,
        brand: Option<&str>,
    ) {
        if symbol.trim().is_empty() {
            warn!("delete_asset called with a blank symbol. Ignored.");
            return;
        }

        let transaction = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            transaction_type: TRANSACTION_TYPE_DELETE.to_string(),
            asset_class,
            symbol: symbol.trim().to_string(),
            broker: qualifier.map(str::to_string),
            exchange: None,
            market: None,
            brand: brand.map(str::to_string),
            amount: Decimal::ZERO,
            price: Decimal::ZERO,
            currency: self.inner.base_currency.clone(),
            use_manual_price: false,
            manual_price: None,
            timestamp: Utc::now(),
        };
        debug!(
            "Appending DELETE for {} {}.",
            asset_class.as_str(),
            symbol.trim()
        );
        self.submit(Mutation::AppendTransaction(transaction));
    }

    /// Clears the portfolio to empty. `is_initialized` survives; a reset
    /// portfolio is empty, not uninitialized.
    pub fn reset(&self) {
        self.submit(Mutation::Reset);
    }

    /// Registers a subscriber and synchronously delivers the current
    /// snapshot to it before returning.
    pub fn subscribe(&self, subscriber: Arc<dyn SnapshotSubscriber>) -> Subscription {
        let id = self.inner.subscribers.subscribe(subscriber.clone());
        let snapshot = self.snapshot();
        SubscriberRegistry::deliver(subscriber.as_ref(), &snapshot);
        Subscription::new(id, Arc::downgrade(&self.inner.subscribers))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.count()
    }

    /// Owned copy of the canonical state.
    pub fn snapshot(&self) -> PortfolioState {
        self.inner.state.read().unwrap().clone()
    }

    /// Base-currency aggregates over the current positions.
    pub fn summary(&self) -> PortfolioSummary {
        let state = self.inner.state.read().unwrap();
        self.inner
            .valuation
            .summarize(&state.assets_by_class, &self.inner.base_currency)
    }

    // ==================== Queue ====================

    fn submit(&self, mutation: Mutation) {
        {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.pending.push_back(mutation);
            if queue.in_flight {
                debug!(
                    "Mutation queued behind an active drain ({} pending).",
                    queue.pending.len()
                );
                return;
            }
            queue.in_flight = true;
        }
        self.drain();
    }

    /// Runs queued mutations to exhaustion. Exactly one thread drains at a
    /// time; the queue lock is released while a mutation executes so other
    /// threads (and reentrant subscribers) can enqueue freely.
    fn drain(&self) {
        loop {
            let mutation = {
                let mut queue = self.inner.queue.lock().unwrap();
                match queue.pending.pop_front() {
                    Some(mutation) => mutation,
                    None => {
                        queue.in_flight = false;
                        return;
                    }
                }
            };

            let label = mutation.describe();
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.execute(mutation))) {
                let dropped = {
                    let mut queue = self.inner.queue.lock().unwrap();
                    let dropped = queue.pending.len();
                    queue.pending.clear();
                    queue.in_flight = false;
                    dropped
                };
                error!(
                    "Mutation '{}' panicked: {}. Dropped {} pending mutation(s) to avoid a retry loop.",
                    label,
                    panic_message(panic.as_ref()),
                    dropped
                );
                return;
            }
        }
    }

    fn execute(&self, mutation: Mutation) {
        let changed = match mutation {
            Mutation::Initialize {
                assets,
                transactions,
            } => self.apply_initialize(assets, transactions),
            Mutation::ReplaceTransactions(transactions) => self.apply_transactions(transactions),
            Mutation::AppendTransaction(transaction) => self.apply_append(transaction),
            Mutation::MergePrices(prices) => self.apply_prices(prices),
            Mutation::SetExchangeRate(rate) => self.apply_exchange_rate(rate),
            Mutation::Rebuild => {
                self.rebuild();
                true
            }
            Mutation::Reset => self.apply_reset(),
        };

        if changed {
            self.notify();
        }
    }

    // ==================== Mutation application ====================

    fn apply_initialize(
        &self,
        assets: HashMap<AssetClass, Vec<Position>>,
        transactions: Vec<Transaction>,
    ) -> bool {
        {
            let mut state = self.inner.state.write().unwrap();
            let version = state.version + 1;
            *state = PortfolioState {
                assets_by_class: assets,
                transactions,
                prices: HashMap::new(),
                exchange_rate: None,
                last_update: Some(Utc::now()),
                version,
                is_initialized: true,
            };
        }
        *self.inner.signature.lock().unwrap() = None;
        true
    }

    fn apply_transactions(&self, transactions: Vec<Transaction>) -> bool {
        let mut seen = HashSet::new();
        let mut deduped = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            if seen.insert(transaction.id.clone()) {
                deduped.push(transaction);
            } else {
                warn!(
                    "Duplicate transaction id {} in update. Keeping the first occurrence.",
                    transaction.id
                );
            }
        }

        let signature = TransactionsSignature::of(&deduped);
        {
            let mut last = self.inner.signature.lock().unwrap();
            if last.as_ref() == Some(&signature) {
                debug!("Transaction set unchanged. Rebuild skipped.");
                return false;
            }
            *last = Some(signature);
        }

        self.inner.state.write().unwrap().transactions = deduped;
        self.rebuild();
        true
    }

    fn apply_append(&self, transaction: Transaction) -> bool {
        let signature = {
            let mut state = self.inner.state.write().unwrap();
            if state
                .transactions
                .iter()
                .any(|existing| existing.id == transaction.id)
            {
                warn!(
                    "Transaction {} is already in the log. Ignored.",
                    transaction.id
                );
                return false;
            }
            state.transactions.push(transaction);
            TransactionsSignature::of(&state.transactions)
        };
        *self.inner.signature.lock().unwrap() = Some(signature);

        self.rebuild();
        true
    }

    fn apply_prices(&self, incoming: HashMap<String, PriceQuote>) -> bool {
        let mut changed = Vec::new();
        {
            let mut state = self.inner.state.write().unwrap();
            for (symbol, quote) in incoming {
                match state.prices.get(&symbol) {
                    Some(existing) if *existing == quote => {}
                    _ => {
                        state.prices.insert(symbol.clone(), quote);
                        changed.push(symbol);
                    }
                }
            }
        }

        if changed.is_empty() {
            debug!("Price update carried no material changes. Skipped.");
            return false;
        }

        if self.needs_rebuild_for(&changed) {
            self.rebuild();
        } else {
            self.revalue();
        }
        true
    }

    fn apply_exchange_rate(&self, rate: Option<Decimal>) -> bool {
        {
            let mut state = self.inner.state.write().unwrap();
            if state.exchange_rate == rate {
                debug!("Exchange rate unchanged. Skipped.");
                return false;
            }
            state.exchange_rate = rate;
        }
        self.revalue();
        true
    }

    fn apply_reset(&self) -> bool {
        {
            let mut state = self.inner.state.write().unwrap();
            let is_initialized = state.is_initialized;
            let version = state.version + 1;
            *state = PortfolioState::default();
            state.is_initialized = is_initialized;
            state.version = version;
            state.last_update = Some(Utc::now());
        }
        *self.inner.signature.lock().unwrap() = None;
        true
    }

    // ==================== Reconciliation paths ====================

    /// Full path: partition the log, fold every partition, price the
    /// results. Positions are computed on a copy of the inputs and committed
    /// in one write at the end.
    fn rebuild(&self) {
        let (transactions, prices, rate) = {
            let state = self.inner.state.read().unwrap();
            (
                state.transactions.clone(),
                state.prices.clone(),
                state.exchange_rate,
            )
        };

        let converter = self.converter(rate);
        let groups = self.inner.resolver.group(&transactions);

        let mut assets_by_class: HashMap<AssetClass, Vec<Position>> = HashMap::new();
        for (key, group) in &groups {
            let quote_symbol = self.inner.resolver.quote_symbol(group[0]);
            let live_price = prices
                .get(&quote_symbol)
                .filter(|quote| quote.is_usable())
                .map(|quote| quote.price);

            if let Some(position) =
                self.inner
                    .builder
                    .build(key, &quote_symbol, group, live_price, &converter)
            {
                assets_by_class
                    .entry(key.asset_class)
                    .or_default()
                    .push(position);
            }
        }
        for positions in assets_by_class.values_mut() {
            positions.sort_by(|a, b| a.id.cmp(&b.id));
        }

        let mut state = self.inner.state.write().unwrap();
        state.assets_by_class = assets_by_class;
        state.version += 1;
        state.last_update = Some(Utc::now());
    }

    /// Cheap path: reprice the positions that already exist, keeping the
    /// reconciled quantities untouched. Gold that loses its last usable
    /// price drops out of the output here as well.
    fn revalue(&self) {
        let mut state = self.inner.state.write().unwrap();
        let converter = self.converter(state.exchange_rate);
        let prices = state.prices.clone();

        for positions in state.assets_by_class.values_mut() {
            for position in positions.iter_mut() {
                let live_price = prices
                    .get(&position.quote_symbol)
                    .filter(|quote| quote.is_usable())
                    .map(|quote| quote.price);
                self.inner.valuation.apply(position, live_price, &converter);
            }
            positions.retain(|position| {
                if position.lacks_required_price() {
                    warn!(
                        "No price resolved for gold position {}. Excluded from output.",
                        position.id
                    );
                    return false;
                }
                true
            });
        }
        state
            .assets_by_class
            .retain(|_, positions| !positions.is_empty());

        state.version += 1;
        state.last_update = Some(Utc::now());
    }

    /// A newly priced symbol can belong to a partition that was suppressed
    /// for lack of a price (gold). Those only reappear through a full
    /// rebuild; the in-place path never creates positions.
    fn needs_rebuild_for(&self, changed_symbols: &[String]) -> bool {
        let state = self.inner.state.read().unwrap();
        for symbol in changed_symbols {
            let has_position = state
                .positions()
                .any(|position| position.quote_symbol == *symbol);
            if has_position {
                continue;
            }
            let has_transactions = state
                .transactions
                .iter()
                .any(|tx| self.inner.resolver.quote_symbol(tx) == *symbol);
            if has_transactions {
                return true;
            }
        }
        false
    }

    fn converter(&self, rate: Option<Decimal>) -> CurrencyConverter {
        CurrencyConverter::new(
            self.inner.base_currency.clone(),
            self.inner.foreign_currency.clone(),
            rate,
        )
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        self.inner.subscribers.notify(&snapshot);
    }
}

impl Default for StateManager {
    fn default() -> Self {
        StateManager::new(DEFAULT_BASE_CURRENCY, DEFAULT_FOREIGN_CURRENCY)
    }
}
