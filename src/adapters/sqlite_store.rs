//! SQLite store and journal adapter.

use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::HashMap;

use crate::domain::error::LedgerError;
use crate::domain::portfolio::{Holding, Portfolio};
use crate::domain::settings::LedgerSettings;
use crate::domain::transaction::{TradeKind, Transaction};
use crate::ports::journal_port::TransactionJournal;
use crate::ports::store_port::PortfolioStore;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_settings(settings: &LedgerSettings) -> Result<Self, LedgerError> {
        let db_path = settings.db_path()?;

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| LedgerError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| LedgerError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS portfolios (
                user_id TEXT PRIMARY KEY,
                balance REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS holdings (
                user_id TEXT NOT NULL,
                ticker TEXT NOT NULL,
                company TEXT NOT NULL,
                shares INTEGER NOT NULL,
                avg_cost REAL NOT NULL,
                last_known_price REAL NOT NULL,
                acquired_on TEXT NOT NULL,
                PRIMARY KEY (user_id, ticker)
            );
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                ticker TEXT NOT NULL,
                company TEXT NOT NULL,
                shares INTEGER NOT NULL,
                unit_price REAL NOT NULL,
                total_value REAL NOT NULL,
                executed_at TEXT NOT NULL,
                channel TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_user
                ON transactions(user_id, executed_at DESC);",
        )
        .map_err(|e: rusqlite::Error| LedgerError::StoreQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool.get().map_err(|e: r2d2::Error| LedgerError::Store {
            reason: e.to_string(),
        })
    }
}

fn query_err(e: rusqlite::Error) -> LedgerError {
    LedgerError::StoreQuery {
        reason: e.to_string(),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, LedgerError> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| LedgerError::StoreQuery {
        reason: format!("invalid stored date {s}: {e}"),
    })
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, LedgerError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(|e| LedgerError::StoreQuery {
        reason: format!("invalid stored timestamp {s}: {e}"),
    })
}

impl PortfolioStore for SqliteStore {
    fn get(&self, user_id: &str) -> Result<Option<Portfolio>, LedgerError> {
        let conn = self.conn()?;

        let balance: Option<f64> = conn
            .query_row(
                "SELECT balance FROM portfolios WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(query_err(other)),
            })?;
        let Some(balance) = balance else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(
                "SELECT ticker, company, shares, avg_cost, last_known_price, acquired_on
                 FROM holdings WHERE user_id = ?1",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(query_err)?;

        let mut holdings = HashMap::new();
        for row in rows {
            let (ticker, company, shares, avg_cost, last_known_price, acquired_on) =
                row.map_err(query_err)?;
            holdings.insert(
                ticker.clone(),
                Holding {
                    ticker,
                    company,
                    shares,
                    avg_cost,
                    last_known_price,
                    acquired_on: parse_date(&acquired_on)?,
                },
            );
        }

        Ok(Some(Portfolio {
            user_id: user_id.to_string(),
            balance,
            holdings,
        }))
    }

    fn put(&self, portfolio: &Portfolio) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute(
            "INSERT OR REPLACE INTO portfolios (user_id, balance) VALUES (?1, ?2)",
            params![portfolio.user_id, portfolio.balance],
        )
        .map_err(query_err)?;

        tx.execute(
            "DELETE FROM holdings WHERE user_id = ?1",
            params![portfolio.user_id],
        )
        .map_err(query_err)?;

        for holding in portfolio.holdings.values() {
            tx.execute(
                "INSERT INTO holdings
                 (user_id, ticker, company, shares, avg_cost, last_known_price, acquired_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    portfolio.user_id,
                    holding.ticker,
                    holding.company,
                    holding.shares,
                    holding.avg_cost,
                    holding.last_known_price,
                    holding.acquired_on.format(DATE_FMT).to_string(),
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}

impl TransactionJournal for SqliteStore {
    fn append(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO transactions
             (id, user_id, kind, ticker, company, shares, unit_price, total_value, executed_at, channel)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                transaction.id,
                transaction.user_id,
                transaction.kind.as_str(),
                transaction.ticker,
                transaction.company,
                transaction.shares,
                transaction.unit_price,
                transaction.total_value,
                transaction.executed_at.format(DATETIME_FMT).to_string(),
                transaction.channel,
            ],
        )
        .map_err(query_err)?;

        Ok(())
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, kind, ticker, company, shares, unit_price, total_value, executed_at, channel
                 FROM transactions WHERE user_id = ?1
                 ORDER BY executed_at DESC, rowid DESC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })
            .map_err(query_err)?;

        let mut transactions = Vec::new();
        for row in rows {
            let (id, kind, ticker, company, shares, unit_price, total_value, executed_at, channel) =
                row.map_err(query_err)?;
            let kind = TradeKind::parse(&kind).ok_or_else(|| LedgerError::StoreQuery {
                reason: format!("invalid stored trade kind {kind}"),
            })?;
            transactions.push(Transaction {
                id,
                user_id: user_id.to_string(),
                kind,
                ticker,
                company,
                shares,
                unit_price,
                total_value,
                executed_at: parse_datetime(&executed_at)?,
                channel,
            });
        }

        Ok(transactions)
    }
}
