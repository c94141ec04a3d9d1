//! The ledger engine: buy/sell execution and portfolio aggregation.
//!
//! Every trade runs its full read, validate, mutate, persist and append
//! sequence under the owning user's lock, so two concurrent trades for one
//! user can never both approve against the same stale balance. The quote is
//! captured once per trade before the critical section and reused throughout.

use chrono::{Local, NaiveDateTime};
use log::{debug, info};
use std::sync::Arc;

use super::error::LedgerError;
use super::locks::UserLocks;
use super::portfolio::{Holding, Portfolio};
use super::quote::Quote;
use super::settings::LedgerSettings;
use super::transaction::{TradeKind, Transaction};
use crate::ports::journal_port::TransactionJournal;
use crate::ports::price_port::PriceOracle;
use crate::ports::store_port::PortfolioStore;

/// Read-only aggregation of one portfolio returned by
/// [`LedgerEngine::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub balance: f64,
    pub holdings: Vec<Holding>,
    pub total_invested: f64,
    pub total_value: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percent: f64,
}

pub struct LedgerEngine {
    store: Arc<dyn PortfolioStore>,
    journal: Arc<dyn TransactionJournal>,
    oracle: Arc<dyn PriceOracle>,
    locks: UserLocks,
    starting_balance: f64,
}

impl LedgerEngine {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        journal: Arc<dyn TransactionJournal>,
        oracle: Arc<dyn PriceOracle>,
        settings: &LedgerSettings,
    ) -> Self {
        LedgerEngine {
            store,
            journal,
            oracle,
            locks: UserLocks::new(settings.lock_timeout),
            starting_balance: settings.starting_balance,
        }
    }

    fn resolve_quote(&self, ticker: &str) -> Result<Quote, LedgerError> {
        self.oracle
            .resolve(ticker)?
            .ok_or_else(|| LedgerError::InstrumentNotFound {
                ticker: ticker.to_string(),
            })
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    /// Buy `shares` of `ticker` at the oracle's current price.
    ///
    /// Fails with `InvalidQuantity`, `InstrumentNotFound` or
    /// `InsufficientFunds` without touching any state. On success the
    /// debit, holding update, portfolio write and journal append commit as
    /// one unit under the user's lock, and the executed trade's record is
    /// returned.
    pub fn execute_buy(
        &self,
        user_id: &str,
        ticker: &str,
        shares: i64,
        channel: &str,
    ) -> Result<Transaction, LedgerError> {
        if shares <= 0 {
            return Err(LedgerError::InvalidQuantity { shares });
        }
        let quote = self.resolve_quote(ticker)?;

        self.locks.with_user(user_id, || {
            let mut portfolio = self.store.get_or_create(user_id, self.starting_balance)?;

            let required = shares as f64 * quote.price;
            if required > portfolio.balance {
                return Err(LedgerError::InsufficientFunds {
                    required,
                    available: portfolio.balance,
                });
            }

            let executed_at = Self::now();
            portfolio.apply_buy(&quote, shares, executed_at.date());
            self.store.put(&portfolio)?;

            let transaction =
                Transaction::record(user_id, TradeKind::Buy, &quote, shares, executed_at, channel);
            self.journal.append(&transaction)?;

            info!(
                "buy executed: user={} ticker={} shares={} unit_price={:.2} total={:.2} balance={:.2}",
                user_id, quote.ticker, shares, quote.price, transaction.total_value, portfolio.balance
            );
            Ok(transaction)
        })
    }

    /// Sell `shares` of `ticker` at the oracle's current price.
    ///
    /// Fails with `InvalidQuantity`, `InstrumentNotFound`, `NoSuchHolding`
    /// or `InsufficientShares` without touching any state. Selling the full
    /// position removes the holding; a partial sell leaves `avg_cost`
    /// unchanged.
    pub fn execute_sell(
        &self,
        user_id: &str,
        ticker: &str,
        shares: i64,
        channel: &str,
    ) -> Result<Transaction, LedgerError> {
        if shares <= 0 {
            return Err(LedgerError::InvalidQuantity { shares });
        }
        let quote = self.resolve_quote(ticker)?;

        self.locks.with_user(user_id, || {
            let mut portfolio = self.store.get_or_create(user_id, self.starting_balance)?;

            let held = match portfolio.holding(&quote.ticker) {
                Some(holding) => holding.shares,
                None => {
                    return Err(LedgerError::NoSuchHolding {
                        ticker: quote.ticker.clone(),
                    });
                }
            };
            if shares > held {
                return Err(LedgerError::InsufficientShares {
                    ticker: quote.ticker.clone(),
                    requested: shares,
                    held,
                });
            }

            portfolio.apply_sell(&quote, shares);
            self.store.put(&portfolio)?;

            let transaction = Transaction::record(
                user_id,
                TradeKind::Sell,
                &quote,
                shares,
                Self::now(),
                channel,
            );
            self.journal.append(&transaction)?;

            info!(
                "sell executed: user={} ticker={} shares={} unit_price={:.2} total={:.2} balance={:.2}",
                user_id, quote.ticker, shares, quote.price, transaction.total_value, portfolio.balance
            );
            Ok(transaction)
        })
    }

    /// Aggregate the user's portfolio, refreshing `last_known_price` for
    /// each holding from the oracle. An instrument the oracle no longer
    /// resolves keeps its stored price rather than failing the snapshot.
    /// The refreshed prices are written back.
    pub fn snapshot(&self, user_id: &str) -> Result<PortfolioSummary, LedgerError> {
        self.locks.with_user(user_id, || {
            let mut portfolio = self.store.get_or_create(user_id, self.starting_balance)?;
            self.refresh_holdings(&mut portfolio)?;
            self.store.put(&portfolio)?;

            let total_invested = portfolio.total_invested();
            let total_value = portfolio.total_value();
            let total_gain_loss = total_value - total_invested;
            let total_gain_loss_percent = if total_invested > 0.0 {
                total_gain_loss / total_invested * 100.0
            } else {
                0.0
            };

            Ok(PortfolioSummary {
                balance: portfolio.balance,
                holdings: portfolio.holdings_sorted(),
                total_invested,
                total_value,
                total_gain_loss,
                total_gain_loss_percent,
            })
        })
    }

    /// The user's holdings with refreshed prices, sorted by ticker.
    pub fn holdings(&self, user_id: &str) -> Result<Vec<Holding>, LedgerError> {
        Ok(self.snapshot(user_id)?.holdings)
    }

    /// The user's cash balance. Provisions lazily like every other read.
    pub fn balance(&self, user_id: &str) -> Result<f64, LedgerError> {
        self.locks.with_user(user_id, || {
            let portfolio = self.store.get_or_create(user_id, self.starting_balance)?;
            Ok(portfolio.balance)
        })
    }

    /// The user's trade history, newest first. Reads under the user lock so
    /// a listing never interleaves with an in-flight trade's journal append.
    pub fn history(&self, user_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.locks
            .with_user(user_id, || self.journal.list_by_user(user_id))
    }

    /// The oracle's quote board.
    pub fn quotes(&self) -> Result<Vec<Quote>, LedgerError> {
        self.oracle.list_quotes()
    }

    /// Resolve one instrument, failing for unknown tickers.
    pub fn quote(&self, ticker: &str) -> Result<Quote, LedgerError> {
        self.resolve_quote(ticker)
    }

    fn refresh_holdings(&self, portfolio: &mut Portfolio) -> Result<(), LedgerError> {
        let tickers: Vec<String> = portfolio.holdings.keys().cloned().collect();
        for ticker in tickers {
            match self.oracle.resolve(&ticker)? {
                Some(quote) => portfolio.refresh_price(&quote),
                None => debug!(
                    "no quote for held instrument {}, keeping last known price",
                    ticker
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::MemoryStore;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mutable quote board for scripting price moves.
    struct BoardOracle {
        quotes: Mutex<HashMap<String, Quote>>,
    }

    impl BoardOracle {
        fn with_quotes(quotes: Vec<Quote>) -> Self {
            BoardOracle {
                quotes: Mutex::new(
                    quotes
                        .into_iter()
                        .map(|q| (q.ticker.clone(), q))
                        .collect(),
                ),
            }
        }

        fn set_price(&self, ticker: &str, price: f64) {
            if let Some(q) = self.quotes.lock().unwrap().get_mut(ticker) {
                q.price = price;
            }
        }

        fn remove(&self, ticker: &str) {
            self.quotes.lock().unwrap().remove(ticker);
        }
    }

    impl PriceOracle for BoardOracle {
        fn resolve(&self, ticker: &str) -> Result<Option<Quote>, LedgerError> {
            Ok(self.quotes.lock().unwrap().get(ticker).cloned())
        }

        fn list_quotes(&self) -> Result<Vec<Quote>, LedgerError> {
            let mut quotes: Vec<Quote> = self.quotes.lock().unwrap().values().cloned().collect();
            quotes.sort_by(|a, b| a.ticker.cmp(&b.ticker));
            Ok(quotes)
        }
    }

    fn settings(starting_balance: f64) -> LedgerSettings {
        LedgerSettings {
            starting_balance,
            lock_timeout: Duration::from_secs(5),
            ..LedgerSettings::default()
        }
    }

    fn engine_with(
        starting_balance: f64,
        quotes: Vec<Quote>,
    ) -> (LedgerEngine, Arc<MemoryStore>, Arc<BoardOracle>) {
        let store = Arc::new(MemoryStore::new());
        let oracle = Arc::new(BoardOracle::with_quotes(quotes));
        let engine = LedgerEngine::new(
            Arc::clone(&store) as Arc<dyn PortfolioStore>,
            Arc::clone(&store) as Arc<dyn TransactionJournal>,
            Arc::clone(&oracle) as Arc<dyn PriceOracle>,
            &settings(starting_balance),
        );
        (engine, store, oracle)
    }

    fn board() -> Vec<Quote> {
        vec![
            Quote::new("LAFISE", "LAFISE Nicaragua", 100.0, 5.1),
            Quote::new("BANCEN", "Banco Central", 96.8, -3.5),
        ]
    }

    #[test]
    fn buy_debits_balance_and_creates_holding() {
        let (engine, store, _) = engine_with(1000.0, board());

        let tx = engine.execute_buy("u1", "LAFISE", 5, "BAC Nicaragua").unwrap();
        assert_eq!(tx.kind, TradeKind::Buy);
        assert_relative_eq!(tx.total_value, 500.0);

        let portfolio = store.get("u1").unwrap().unwrap();
        assert_relative_eq!(portfolio.balance, 500.0);
        let holding = portfolio.holding("LAFISE").unwrap();
        assert_eq!(holding.shares, 5);
        assert_relative_eq!(holding.avg_cost, 100.0);

        let history = engine.history("u1").unwrap();
        assert_eq!(history.len(), 1);
        assert_relative_eq!(history[0].total_value, 500.0);
    }

    #[test]
    fn buy_rejects_non_positive_quantity() {
        let (engine, store, _) = engine_with(1000.0, board());
        assert!(matches!(
            engine.execute_buy("u1", "LAFISE", 0, "BAC"),
            Err(LedgerError::InvalidQuantity { shares: 0 })
        ));
        assert!(matches!(
            engine.execute_buy("u1", "LAFISE", -3, "BAC"),
            Err(LedgerError::InvalidQuantity { shares: -3 })
        ));
        // Rejected before provisioning: no portfolio was created.
        assert!(store.get("u1").unwrap().is_none());
    }

    #[test]
    fn buy_unknown_ticker_leaves_no_trace() {
        let (engine, store, _) = engine_with(1000.0, board());
        assert!(matches!(
            engine.execute_buy("u1", "GHOST", 1, "BAC"),
            Err(LedgerError::InstrumentNotFound { ref ticker }) if ticker == "GHOST"
        ));
        assert!(store.get("u1").unwrap().is_none());
        assert!(engine.history("u1").unwrap().is_empty());
    }

    #[test]
    fn buy_beyond_balance_reports_required_and_available() {
        let (engine, store, _) = engine_with(1000.0, board());
        let err = engine.execute_buy("u1", "LAFISE", 11, "BAC").unwrap_err();
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                assert_relative_eq!(required, 1100.0);
                assert_relative_eq!(available, 1000.0);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The failed buy still provisioned the portfolio but moved nothing.
        let portfolio = store.get("u1").unwrap().unwrap();
        assert_relative_eq!(portfolio.balance, 1000.0);
        assert_eq!(portfolio.holding_count(), 0);
        assert!(engine.history("u1").unwrap().is_empty());
    }

    #[test]
    fn repeat_buys_blend_average_at_current_price() {
        let (engine, store, oracle) = engine_with(100_000.0, board());
        oracle.set_price("LAFISE", 140.5);
        engine.execute_buy("u1", "LAFISE", 50, "BAC").unwrap();
        oracle.set_price("LAFISE", 160.0);
        engine.execute_buy("u1", "LAFISE", 10, "BAC").unwrap();

        let portfolio = store.get("u1").unwrap().unwrap();
        let holding = portfolio.holding("LAFISE").unwrap();
        assert_eq!(holding.shares, 60);
        assert_relative_eq!(holding.avg_cost, 143.75);
    }

    #[test]
    fn sell_everything_removes_holding() {
        let (engine, store, oracle) = engine_with(10_000.0, board());
        engine.execute_buy("u1", "LAFISE", 35, "BAC").unwrap();
        oracle.set_price("LAFISE", 110.0);

        let tx = engine.execute_sell("u1", "LAFISE", 35, "BAC").unwrap();
        assert_eq!(tx.kind, TradeKind::Sell);
        assert_relative_eq!(tx.total_value, 35.0 * 110.0);

        let portfolio = store.get("u1").unwrap().unwrap();
        assert!(!portfolio.has_holding("LAFISE"));
        assert_relative_eq!(portfolio.balance, 10_000.0 - 3500.0 + 35.0 * 110.0);
    }

    #[test]
    fn partial_sell_keeps_cost_basis() {
        let (engine, store, oracle) = engine_with(10_000.0, board());
        engine.execute_buy("u1", "LAFISE", 50, "BAC").unwrap();
        oracle.set_price("LAFISE", 150.0);
        engine.execute_sell("u1", "LAFISE", 20, "BAC").unwrap();

        let holding = store.get("u1").unwrap().unwrap().holding("LAFISE").cloned().unwrap();
        assert_eq!(holding.shares, 30);
        assert_relative_eq!(holding.avg_cost, 100.0);
    }

    #[test]
    fn oversell_mutates_nothing() {
        let (engine, store, _) = engine_with(10_000.0, board());
        engine.execute_buy("u1", "LAFISE", 35, "BAC").unwrap();
        let before = store.get("u1").unwrap().unwrap();

        let err = engine.execute_sell("u1", "LAFISE", 40, "BAC").unwrap_err();
        match err {
            LedgerError::InsufficientShares {
                ticker,
                requested,
                held,
            } => {
                assert_eq!(ticker, "LAFISE");
                assert_eq!(requested, 40);
                assert_eq!(held, 35);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(store.get("u1").unwrap().unwrap(), before);
        assert_eq!(engine.history("u1").unwrap().len(), 1);
    }

    #[test]
    fn sell_without_position_fails_with_no_such_holding() {
        let (engine, _, _) = engine_with(10_000.0, board());
        assert!(matches!(
            engine.execute_sell("u1", "BANCEN", 1, "BAC"),
            Err(LedgerError::NoSuchHolding { ref ticker }) if ticker == "BANCEN"
        ));
    }

    #[test]
    fn snapshot_aggregates_and_refreshes_prices() {
        let (engine, _, oracle) = engine_with(100_000.0, board());
        oracle.set_price("LAFISE", 140.5);
        engine.execute_buy("u1", "LAFISE", 50, "BAC").unwrap();
        engine.execute_buy("u1", "BANCEN", 35, "BAC").unwrap();

        oracle.set_price("LAFISE", 148.2);
        let summary = engine.snapshot("u1").unwrap();

        let invested = 50.0 * 140.5 + 35.0 * 96.8;
        let value = 50.0 * 148.2 + 35.0 * 96.8;
        assert_relative_eq!(summary.total_invested, invested);
        assert_relative_eq!(summary.total_value, value);
        assert_relative_eq!(summary.total_gain_loss, value - invested);
        assert_relative_eq!(
            summary.total_gain_loss_percent,
            (value - invested) / invested * 100.0
        );
        assert_eq!(summary.holdings.len(), 2);
    }

    #[test]
    fn snapshot_of_empty_portfolio_avoids_division_by_zero() {
        let (engine, _, _) = engine_with(1000.0, board());
        let summary = engine.snapshot("fresh-user").unwrap();
        assert_relative_eq!(summary.balance, 1000.0);
        assert_relative_eq!(summary.total_invested, 0.0);
        assert_relative_eq!(summary.total_gain_loss_percent, 0.0);
        assert!(summary.total_gain_loss_percent.is_finite());
    }

    #[test]
    fn snapshot_keeps_stored_price_for_delisted_instrument() {
        let (engine, _, oracle) = engine_with(100_000.0, board());
        engine.execute_buy("u1", "LAFISE", 10, "BAC").unwrap();
        oracle.remove("LAFISE");

        let summary = engine.snapshot("u1").unwrap();
        assert_eq!(summary.holdings.len(), 1);
        assert_relative_eq!(summary.holdings[0].last_known_price, 100.0);
    }

    #[test]
    fn repeated_snapshot_is_stable_without_trades() {
        let (engine, _, _) = engine_with(100_000.0, board());
        engine.execute_buy("u1", "LAFISE", 10, "BAC").unwrap();
        let first = engine.snapshot("u1").unwrap();
        let second = engine.snapshot("u1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn balance_provisions_with_starting_amount() {
        let (engine, store, _) = engine_with(2500.0, board());
        assert_relative_eq!(engine.balance("newcomer").unwrap(), 2500.0);
        assert!(store.get("newcomer").unwrap().is_some());
    }

    #[test]
    fn history_lists_newest_first() {
        let (engine, _, _) = engine_with(100_000.0, board());
        engine.execute_buy("u1", "LAFISE", 1, "BAC").unwrap();
        engine.execute_buy("u1", "BANCEN", 2, "BAC").unwrap();
        engine.execute_sell("u1", "LAFISE", 1, "BAC").unwrap();

        let history = engine.history("u1").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].kind, TradeKind::Sell);
        assert_eq!(history[1].ticker, "BANCEN");
        assert_eq!(history[2].ticker, "LAFISE");
    }

    /// Store whose `put` parks until released, keeping the caller inside
    /// the user's critical section.
    struct StallingStore {
        inner: MemoryStore,
        entered: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl PortfolioStore for StallingStore {
        fn get(&self, user_id: &str) -> Result<Option<Portfolio>, LedgerError> {
            self.inner.get(user_id)
        }

        fn put(&self, portfolio: &Portfolio) -> Result<(), LedgerError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            self.inner.put(portfolio)
        }
    }

    impl TransactionJournal for StallingStore {
        fn append(&self, transaction: &Transaction) -> Result<(), LedgerError> {
            self.inner.append(transaction)
        }

        fn list_by_user(&self, user_id: &str) -> Result<Vec<Transaction>, LedgerError> {
            self.inner.list_by_user(user_id)
        }
    }

    #[test]
    fn history_waits_for_in_flight_trade() {
        use std::sync::mpsc;

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(StallingStore {
            inner: MemoryStore::new(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let oracle = Arc::new(BoardOracle::with_quotes(board()));
        let engine = Arc::new(LedgerEngine::new(
            Arc::clone(&store) as Arc<dyn PortfolioStore>,
            Arc::clone(&store) as Arc<dyn TransactionJournal>,
            oracle as Arc<dyn PriceOracle>,
            &LedgerSettings {
                starting_balance: 1000.0,
                lock_timeout: Duration::from_millis(50),
                ..LedgerSettings::default()
            },
        ));

        let buyer = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.execute_buy("u1", "LAFISE", 1, "BAC"))
        };

        // The buyer is parked inside its critical section.
        entered_rx.recv().unwrap();
        assert!(matches!(
            engine.history("u1"),
            Err(LedgerError::LockTimeout { .. })
        ));

        // One release per store write: provisioning, then the trade itself.
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        buyer.join().unwrap().unwrap();
        assert_eq!(engine.history("u1").unwrap().len(), 1);
    }

    #[test]
    fn quote_fails_for_unknown_ticker() {
        let (engine, _, _) = engine_with(1000.0, board());
        assert!(engine.quote("LAFISE").is_ok());
        assert!(matches!(
            engine.quote("GHOST"),
            Err(LedgerError::InstrumentNotFound { .. })
        ));
    }

    proptest! {
        /// The blended average cost always lies within the price range of
        /// the contributing lots, and cost basis is conserved exactly:
        /// basis == Σ lot value.
        #[test]
        fn weighted_average_stays_within_lot_bounds(
            lots in proptest::collection::vec((1i64..500, 1.0f64..1000.0), 1..8)
        ) {
            let (engine, store, oracle) = engine_with(f64::MAX / 2.0, board());

            let mut spent = 0.0;
            let mut min_price = f64::INFINITY;
            let mut max_price = f64::NEG_INFINITY;
            for (shares, price) in &lots {
                oracle.set_price("LAFISE", *price);
                engine.execute_buy("u1", "LAFISE", *shares, "BAC").unwrap();
                spent += *shares as f64 * price;
                min_price = min_price.min(*price);
                max_price = max_price.max(*price);
            }

            let portfolio = store.get("u1").unwrap().unwrap();
            let holding = portfolio.holding("LAFISE").unwrap();
            let total_shares: i64 = lots.iter().map(|(s, _)| s).sum();
            prop_assert_eq!(holding.shares, total_shares);
            prop_assert!(holding.avg_cost >= min_price - 1e-9);
            prop_assert!(holding.avg_cost <= max_price + 1e-9);
            prop_assert!((holding.cost_basis() - spent).abs() < 1e-6 * spent.max(1.0));
        }

        /// Selling any partial amount never moves the average cost.
        #[test]
        fn sells_never_change_average_cost(
            buy_shares in 2i64..500,
            buy_price in 1.0f64..1000.0,
            sell_price in 1.0f64..1000.0,
        ) {
            let (engine, store, oracle) = engine_with(f64::MAX / 2.0, board());
            oracle.set_price("LAFISE", buy_price);
            engine.execute_buy("u1", "LAFISE", buy_shares, "BAC").unwrap();

            oracle.set_price("LAFISE", sell_price);
            engine.execute_sell("u1", "LAFISE", buy_shares / 2, "BAC").unwrap();

            let portfolio = store.get("u1").unwrap().unwrap();
            let holding = portfolio.holding("LAFISE").unwrap();
            prop_assert!((holding.avg_cost - buy_price).abs() < 1e-9);
        }
    }
}
