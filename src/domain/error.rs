//! Domain error types.

/// Top-level error type for cartera.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid quantity: {shares} (must be a positive number of shares)")]
    InvalidQuantity { shares: i64 },

    #[error("instrument {ticker} not found")]
    InstrumentNotFound { ticker: String },

    #[error("insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient shares of {ticker}: requested {requested}, held {held}")]
    InsufficientShares {
        ticker: String,
        requested: i64,
        held: i64,
    },

    #[error("no holding in {ticker}")]
    NoSuchHolding { ticker: String },

    #[error("timed out waiting for the portfolio lock of user {user_id}")]
    LockTimeout { user_id: String },

    #[error("store error: {reason}")]
    Store { reason: String },

    #[error("store query error: {reason}")]
    StoreQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// `LockTimeout`, `Store` and `StoreQuery` leave no partial mutation
    /// behind, so the caller may retry the operation verbatim. Business-rule
    /// failures are deterministic and retrying them is pointless.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::LockTimeout { .. }
                | LedgerError::Store { .. }
                | LedgerError::StoreQuery { .. }
        )
    }
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Store { .. } | LedgerError::StoreQuery { .. } => 3,
            LedgerError::InvalidQuantity { .. }
            | LedgerError::InstrumentNotFound { .. }
            | LedgerError::NoSuchHolding { .. } => 4,
            LedgerError::InsufficientFunds { .. } | LedgerError::InsufficientShares { .. } => 5,
            LedgerError::LockTimeout { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
