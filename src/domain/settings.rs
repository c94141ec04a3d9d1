//! Typed ledger settings and their validation.

use std::path::PathBuf;
use std::time::Duration;

use super::error::LedgerError;

pub const DEFAULT_STARTING_BALANCE: f64 = 1000.0;
pub const DEFAULT_LOCK_TIMEOUT_MS: i64 = 5000;
pub const DEFAULT_POOL_SIZE: i64 = 4;

/// Everything the assembled service needs to construct the engine and its
/// adapters. Loaded from an INI file by
/// [`crate::adapters::file_config::load_settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSettings {
    /// Balance granted when a portfolio is lazily provisioned.
    pub starting_balance: f64,
    /// Bound on per-user lock acquisition.
    pub lock_timeout: Duration,
    /// SQLite database path; required by the CLI, absent for in-memory use.
    pub db_path: Option<PathBuf>,
    pub pool_size: u32,
    /// Quote board CSV path for the price oracle.
    pub quotes_path: Option<PathBuf>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            starting_balance: DEFAULT_STARTING_BALANCE,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS as u64),
            db_path: None,
            pool_size: DEFAULT_POOL_SIZE as u32,
            quotes_path: None,
        }
    }
}

impl LedgerSettings {
    /// Range-check the settings. Paths are not checked here; adapters
    /// report missing files when they open them.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if !self.starting_balance.is_finite() || self.starting_balance < 0.0 {
            return Err(LedgerError::ConfigInvalid {
                section: "ledger".into(),
                key: "starting_balance".into(),
                reason: format!("must be a non-negative amount, got {}", self.starting_balance),
            });
        }
        if self.lock_timeout.is_zero() {
            return Err(LedgerError::ConfigInvalid {
                section: "ledger".into(),
                key: "lock_timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.pool_size == 0 {
            return Err(LedgerError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn db_path(&self) -> Result<&PathBuf, LedgerError> {
        self.db_path.as_ref().ok_or_else(|| LedgerError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        })
    }

    pub fn quotes_path(&self) -> Result<&PathBuf, LedgerError> {
        self.quotes_path
            .as_ref()
            .ok_or_else(|| LedgerError::ConfigMissing {
                section: "oracle".into(),
                key: "quotes".into(),
            })
    }
}
