#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cartera::adapters::memory_store::MemoryStore;
use cartera::domain::error::LedgerError;
use cartera::domain::ledger::LedgerEngine;
use cartera::domain::quote::Quote;
use cartera::domain::settings::LedgerSettings;
use cartera::ports::journal_port::TransactionJournal;
use cartera::ports::price_port::PriceOracle;
use cartera::ports::store_port::PortfolioStore;

/// Scripted oracle: a mutable quote board plus optional per-ticker
/// failures to exercise the oracle error path.
pub struct MockOracle {
    quotes: Mutex<HashMap<String, Quote>>,
    errors: Mutex<HashMap<String, String>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            quotes: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_quote(self, ticker: &str, company: &str, price: f64) -> Self {
        self.quotes
            .lock()
            .unwrap()
            .insert(ticker.to_string(), Quote::new(ticker, company, price, 0.0));
        self
    }

    pub fn with_error(self, ticker: &str, reason: &str) -> Self {
        self.errors
            .lock()
            .unwrap()
            .insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn set_error(&self, ticker: &str, reason: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(ticker.to_string(), reason.to_string());
    }

    pub fn set_price(&self, ticker: &str, price: f64) {
        if let Some(quote) = self.quotes.lock().unwrap().get_mut(ticker) {
            quote.price = price;
        }
    }
}

impl PriceOracle for MockOracle {
    fn resolve(&self, ticker: &str) -> Result<Option<Quote>, LedgerError> {
        if let Some(reason) = self.errors.lock().unwrap().get(ticker) {
            return Err(LedgerError::Store {
                reason: reason.clone(),
            });
        }
        Ok(self.quotes.lock().unwrap().get(ticker).cloned())
    }

    fn list_quotes(&self) -> Result<Vec<Quote>, LedgerError> {
        let mut quotes: Vec<Quote> = self.quotes.lock().unwrap().values().cloned().collect();
        quotes.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(quotes)
    }
}

pub fn settings(starting_balance: f64) -> LedgerSettings {
    LedgerSettings {
        starting_balance,
        lock_timeout: Duration::from_secs(10),
        ..LedgerSettings::default()
    }
}

/// Engine over the in-memory adapters, returning the shared store for
/// state assertions.
pub fn memory_engine(
    starting_balance: f64,
    oracle: MockOracle,
) -> (Arc<LedgerEngine>, Arc<MemoryStore>, Arc<MockOracle>) {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(oracle);
    let engine = LedgerEngine::new(
        Arc::clone(&store) as Arc<dyn PortfolioStore>,
        Arc::clone(&store) as Arc<dyn TransactionJournal>,
        Arc::clone(&oracle) as Arc<dyn PriceOracle>,
        &settings(starting_balance),
    );
    (Arc::new(engine), store, oracle)
}

pub fn standard_board() -> MockOracle {
    MockOracle::new()
        .with_quote("LAFISE", "LAFISE Nicaragua", 148.2)
        .with_quote("BANCEN", "Banco Central", 96.8)
        .with_quote("AGRI", "Agrícola Nicaragua", 54.8)
}
