//! CSV quote board oracle adapter.
//!
//! Loads a fixed quote board from a `ticker,company,price,change_percent`
//! CSV file. Lookups are case-insensitive on ticker, matching the upper-
//! cased tickers the original request layer forwarded.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::domain::error::LedgerError;
use crate::domain::quote::Quote;
use crate::ports::price_port::PriceOracle;

#[derive(Debug)]
pub struct CsvOracle {
    quotes: HashMap<String, Quote>,
}

impl CsvOracle {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_csv(&content)
    }

    pub fn from_csv(content: &str) -> Result<Self, LedgerError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut quotes = HashMap::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| LedgerError::StoreQuery {
                reason: format!("quote CSV parse error: {}", e),
            })?;

            let ticker = record.get(0).ok_or_else(|| LedgerError::StoreQuery {
                reason: format!("quote record {}: missing ticker column", line + 1),
            })?;
            let company = record.get(1).ok_or_else(|| LedgerError::StoreQuery {
                reason: format!("quote record {}: missing company column", line + 1),
            })?;
            let price: f64 = record
                .get(2)
                .ok_or_else(|| LedgerError::StoreQuery {
                    reason: format!("quote record {}: missing price column", line + 1),
                })?
                .parse()
                .map_err(|e| LedgerError::StoreQuery {
                    reason: format!("quote record {}: invalid price: {}", line + 1, e),
                })?;
            let change_percent: f64 = record
                .get(3)
                .ok_or_else(|| LedgerError::StoreQuery {
                    reason: format!("quote record {}: missing change_percent column", line + 1),
                })?
                .parse()
                .map_err(|e| LedgerError::StoreQuery {
                    reason: format!("quote record {}: invalid change_percent: {}", line + 1, e),
                })?;

            let ticker = ticker.trim().to_uppercase();
            quotes.insert(
                ticker.clone(),
                Quote::new(&ticker, company.trim(), price, change_percent),
            );
        }

        Ok(CsvOracle { quotes })
    }

    pub fn from_quotes(quotes: Vec<Quote>) -> Self {
        CsvOracle {
            quotes: quotes
                .into_iter()
                .map(|q| (q.ticker.to_uppercase(), q))
                .collect(),
        }
    }
}

impl PriceOracle for CsvOracle {
    fn resolve(&self, ticker: &str) -> Result<Option<Quote>, LedgerError> {
        Ok(self.quotes.get(&ticker.trim().to_uppercase()).cloned())
    }

    fn list_quotes(&self) -> Result<Vec<Quote>, LedgerError> {
        let mut quotes: Vec<Quote> = self.quotes.values().cloned().collect();
        quotes.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(quotes)
    }
}
