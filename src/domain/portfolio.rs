//! Portfolio state: cash balance and per-instrument holdings.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::quote::Quote;

/// A position in one instrument. Invariant: `shares > 0` — a holding whose
/// share count reaches zero is removed from the portfolio, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub company: String,
    pub shares: i64,
    /// Volume-weighted average purchase price of the shares currently held.
    /// Recomputed on buys only; sells leave it untouched.
    pub avg_cost: f64,
    /// Most recently observed market price, refreshed opportunistically.
    pub last_known_price: f64,
    /// Date of first acquisition; later buys do not update it.
    pub acquired_on: NaiveDate,
}

impl Holding {
    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.avg_cost
    }

    pub fn market_value(&self) -> f64 {
        self.shares as f64 * self.last_known_price
    }
}

/// One per user. Invariants: `balance >= 0` at every observable point, no
/// two holdings share a ticker, every holding has `shares > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub user_id: String,
    pub balance: f64,
    pub holdings: HashMap<String, Holding>,
}

impl Portfolio {
    pub fn new(user_id: &str, balance: f64) -> Self {
        Portfolio {
            user_id: user_id.to_string(),
            balance,
            holdings: HashMap::new(),
        }
    }

    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.get(ticker)
    }

    pub fn has_holding(&self, ticker: &str) -> bool {
        self.holdings.contains_key(ticker)
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    /// Holdings sorted by ticker for stable display.
    pub fn holdings_sorted(&self) -> Vec<Holding> {
        let mut out: Vec<Holding> = self.holdings.values().cloned().collect();
        out.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        out
    }

    /// Apply a validated buy: debit cash and fold the new lot into the
    /// holding for the quote's ticker.
    ///
    /// An existing holding is recomputed as a volume-weighted blend:
    /// `new_avg = (old_shares * old_avg + shares * price) / (old_shares + shares)`.
    /// A first buy creates the holding with `avg_cost = price`. The caller
    /// has already verified that `shares > 0` and `shares * price <= balance`.
    pub fn apply_buy(&mut self, quote: &Quote, shares: i64, acquired_on: NaiveDate) {
        self.balance -= shares as f64 * quote.price;

        match self.holdings.get_mut(&quote.ticker) {
            Some(holding) => {
                let new_shares = holding.shares + shares;
                holding.avg_cost = (holding.shares as f64 * holding.avg_cost
                    + shares as f64 * quote.price)
                    / new_shares as f64;
                holding.shares = new_shares;
                holding.last_known_price = quote.price;
                holding.company = quote.company.clone();
            }
            None => {
                self.holdings.insert(
                    quote.ticker.clone(),
                    Holding {
                        ticker: quote.ticker.clone(),
                        company: quote.company.clone(),
                        shares,
                        avg_cost: quote.price,
                        last_known_price: quote.price,
                        acquired_on,
                    },
                );
            }
        }
    }

    /// Apply a validated sell: credit cash and reduce the holding. Selling
    /// every share removes the holding entirely; a partial sell decrements
    /// the count and leaves `avg_cost` unchanged. The caller has already
    /// verified that the holding exists and covers `shares`.
    pub fn apply_sell(&mut self, quote: &Quote, shares: i64) {
        self.balance += shares as f64 * quote.price;

        if let Some(holding) = self.holdings.get_mut(&quote.ticker) {
            if shares == holding.shares {
                self.holdings.remove(&quote.ticker);
            } else {
                holding.shares -= shares;
                holding.last_known_price = quote.price;
                holding.company = quote.company.clone();
            }
        }
    }

    /// Refresh `last_known_price` (and display company) from a fresh quote.
    /// No-op when the user holds no position in the quote's ticker.
    pub fn refresh_price(&mut self, quote: &Quote) {
        if let Some(holding) = self.holdings.get_mut(&quote.ticker) {
            holding.last_known_price = quote.price;
            holding.company = quote.company.clone();
        }
    }

    pub fn total_invested(&self) -> f64 {
        self.holdings.values().map(Holding::cost_basis).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.holdings.values().map(Holding::market_value).sum()
    }
}
