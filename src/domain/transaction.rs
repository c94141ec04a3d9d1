//! Immutable records of executed trades.

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::quote::Quote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Buy,
    Sell,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Buy => "buy",
            TradeKind::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<TradeKind> {
        match s {
            "buy" => Some(TradeKind::Buy),
            "sell" => Some(TradeKind::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed trade. Never mutated after the journal append;
/// `total_value == shares as f64 * unit_price` exactly as computed at
/// execution time.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub kind: TradeKind,
    pub ticker: String,
    pub company: String,
    pub shares: i64,
    pub unit_price: f64,
    pub total_value: f64,
    pub executed_at: NaiveDateTime,
    /// Free-form settlement channel label (bank name in the original system).
    pub channel: String,
}

impl Transaction {
    /// Build a record for a trade executed at `quote.price`, stamped with a
    /// fresh v4 id.
    pub fn record(
        user_id: &str,
        kind: TradeKind,
        quote: &Quote,
        shares: i64,
        executed_at: NaiveDateTime,
        channel: &str,
    ) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            ticker: quote.ticker.clone(),
            company: quote.company.clone(),
            shares,
            unit_price: quote.price,
            total_value: shares as f64 * quote.price,
            executed_at,
            channel: channel.to_string(),
        }
    }
}
