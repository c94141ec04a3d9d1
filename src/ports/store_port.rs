//! Portfolio store port trait.

use crate::domain::error::LedgerError;
use crate::domain::portfolio::Portfolio;

/// Durable keyed storage mapping a user id to exactly one portfolio.
/// Atomicity across get/put is the engine's job: callers hold the user's
/// lock across the whole read-modify-write sequence.
pub trait PortfolioStore: Send + Sync {
    fn get(&self, user_id: &str) -> Result<Option<Portfolio>, LedgerError>;

    /// Write the portfolio back, replacing whatever was stored for that
    /// user. Holdings with zero shares are never handed in.
    fn put(&self, portfolio: &Portfolio) -> Result<(), LedgerError>;

    /// Idempotent lazy provisioning: return the stored portfolio, or create
    /// and persist an empty one with `starting_balance`. Safe under
    /// concurrent first access only while holding the user's lock.
    fn get_or_create(
        &self,
        user_id: &str,
        starting_balance: f64,
    ) -> Result<Portfolio, LedgerError> {
        if let Some(portfolio) = self.get(user_id)? {
            return Ok(portfolio);
        }
        let portfolio = Portfolio::new(user_id, starting_balance);
        self.put(&portfolio)?;
        Ok(portfolio)
    }
}
