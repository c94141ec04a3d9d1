//! Transaction journal port trait.

use crate::domain::error::LedgerError;
use crate::domain::transaction::Transaction;

/// Append-only, time-ordered log of executed trades. Records are immutable
/// once appended; the engine appends inside the owning user's critical
/// section so a reader never sees a trade without its portfolio write.
pub trait TransactionJournal: Send + Sync {
    fn append(&self, transaction: &Transaction) -> Result<(), LedgerError>;

    /// All transactions for one user, newest first.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<Transaction>, LedgerError>;
}
