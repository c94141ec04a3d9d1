//! INI settings adapter.
//!
//! Expected layout:
//!
//! ```ini
//! [ledger]
//! starting_balance = 1000.0
//! lock_timeout_ms = 5000
//!
//! [sqlite]
//! path = cartera.db
//! pool_size = 4
//!
//! [oracle]
//! quotes = quotes.csv
//! ```

use configparser::ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::error::LedgerError;
use crate::domain::settings::{
    DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_POOL_SIZE, DEFAULT_STARTING_BALANCE, LedgerSettings,
};

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<LedgerSettings, LedgerError> {
    let path = path.as_ref();
    let mut config = Ini::new();
    config
        .load(path)
        .map_err(|reason| LedgerError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
    settings_from_ini(&config)
}

pub fn settings_from_str(content: &str) -> Result<LedgerSettings, LedgerError> {
    let mut config = Ini::new();
    config
        .read(content.to_string())
        .map_err(|reason| LedgerError::ConfigParse {
            file: "<inline>".into(),
            reason,
        })?;
    settings_from_ini(&config)
}

fn settings_from_ini(config: &Ini) -> Result<LedgerSettings, LedgerError> {
    let starting_balance = get_double(
        config,
        "ledger",
        "starting_balance",
        DEFAULT_STARTING_BALANCE,
    )?;
    let lock_timeout_ms = get_int(config, "ledger", "lock_timeout_ms", DEFAULT_LOCK_TIMEOUT_MS)?;
    if lock_timeout_ms <= 0 {
        return Err(LedgerError::ConfigInvalid {
            section: "ledger".into(),
            key: "lock_timeout_ms".into(),
            reason: format!("must be greater than zero, got {lock_timeout_ms}"),
        });
    }
    let pool_size = get_int(config, "sqlite", "pool_size", DEFAULT_POOL_SIZE)?;
    if pool_size <= 0 || pool_size > u32::MAX as i64 {
        return Err(LedgerError::ConfigInvalid {
            section: "sqlite".into(),
            key: "pool_size".into(),
            reason: format!("must be a positive pool size, got {pool_size}"),
        });
    }

    let settings = LedgerSettings {
        starting_balance,
        lock_timeout: Duration::from_millis(lock_timeout_ms as u64),
        db_path: config.get("sqlite", "path").map(PathBuf::from),
        pool_size: pool_size as u32,
        quotes_path: config.get("oracle", "quotes").map(PathBuf::from),
    };
    settings.validate()?;
    Ok(settings)
}

fn get_double(config: &Ini, section: &str, key: &str, default: f64) -> Result<f64, LedgerError> {
    match config.getfloat(section, key) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(reason) => Err(LedgerError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason,
        }),
    }
}

fn get_int(config: &Ini, section: &str, key: &str, default: i64) -> Result<i64, LedgerError> {
    match config.getint(section, key) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(reason) => Err(LedgerError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason,
        }),
    }
}
