//! Price oracle port trait.

use crate::domain::error::LedgerError;
use crate::domain::quote::Quote;

/// Read-only source of current instrument prices. The engine captures one
/// quote per trade and reuses it for the cash movement and the journal
/// record, so a mid-operation price change cannot split the two.
pub trait PriceOracle: Send + Sync {
    /// Resolve a ticker to its current quote, `None` for an unknown
    /// instrument.
    fn resolve(&self, ticker: &str) -> Result<Option<Quote>, LedgerError>;

    /// The full quote board, sorted by ticker.
    fn list_quotes(&self) -> Result<Vec<Quote>, LedgerError>;
}
