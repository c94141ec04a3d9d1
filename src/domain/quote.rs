//! Instrument quotes as served by the price oracle.

/// A point-in-time view of one tradable instrument. Foreign read-only state:
/// the ledger fetches a quote once per trade and never writes one back.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub ticker: String,
    pub company: String,
    pub price: f64,
    pub change_percent: f64,
}

impl Quote {
    pub fn new(ticker: &str, company: &str, price: f64, change_percent: f64) -> Self {
        Quote {
            ticker: ticker.to_string(),
            company: company.to_string(),
            price,
            change_percent,
        }
    }
}
