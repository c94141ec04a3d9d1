//! In-process store and journal, used by tests and in-memory assemblies.

use dashmap::DashMap;
use std::sync::Mutex;

use crate::domain::error::LedgerError;
use crate::domain::portfolio::Portfolio;
use crate::domain::transaction::Transaction;
use crate::ports::journal_port::TransactionJournal;
use crate::ports::store_port::PortfolioStore;

/// Portfolios in a concurrent map, journal as a prepend-ordered vector so
/// `list_by_user` is newest first even for same-timestamp trades.
pub struct MemoryStore {
    portfolios: DashMap<String, Portfolio>,
    transactions: Mutex<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            portfolios: DashMap::new(),
            transactions: Mutex::new(Vec::new()),
        }
    }

    /// Number of journal entries across all users.
    pub fn journal_len(&self) -> usize {
        self.transactions.lock().map(|log| log.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioStore for MemoryStore {
    fn get(&self, user_id: &str) -> Result<Option<Portfolio>, LedgerError> {
        Ok(self.portfolios.get(user_id).map(|entry| entry.value().clone()))
    }

    fn put(&self, portfolio: &Portfolio) -> Result<(), LedgerError> {
        self.portfolios
            .insert(portfolio.user_id.clone(), portfolio.clone());
        Ok(())
    }
}

impl TransactionJournal for MemoryStore {
    fn append(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.transactions
            .lock()
            .map_err(|_| LedgerError::Store {
                reason: "journal lock poisoned".into(),
            })?
            .insert(0, transaction.clone());
        Ok(())
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self
            .transactions
            .lock()
            .map_err(|_| LedgerError::Store {
                reason: "journal lock poisoned".into(),
            })?
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}
