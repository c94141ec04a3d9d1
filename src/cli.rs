//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_oracle::CsvOracle;
use crate::adapters::file_config;
use crate::domain::error::LedgerError;
use crate::domain::ledger::PortfolioSummary;
use crate::domain::settings::LedgerSettings;
use crate::ports::price_port::PriceOracle;
use crate::domain::transaction::Transaction;

#[derive(Parser, Debug)]
#[command(name = "cartera", about = "Portfolio ledger engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Buy shares at the current quoted price
    Buy {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long)]
        shares: i64,
        /// Settlement channel label recorded on the transaction
        #[arg(long, default_value = "direct")]
        channel: String,
    },
    /// Sell shares at the current quoted price
    Sell {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long)]
        shares: i64,
        #[arg(long, default_value = "direct")]
        channel: String,
    },
    /// Show the full portfolio summary
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        user: String,
    },
    /// List current holdings
    Holdings {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        user: String,
    },
    /// Show the available cash balance
    Balance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        user: String,
    },
    /// List executed transactions, newest first
    History {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        user: String,
    },
    /// List the quote board
    Quotes {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Buy {
            config,
            user,
            ticker,
            shares,
            channel,
        } => with_engine(&config, |engine| {
            let tx = engine.execute_buy(&user, &ticker, shares, &channel)?;
            print_transaction(&tx);
            Ok(())
        }),
        Command::Sell {
            config,
            user,
            ticker,
            shares,
            channel,
        } => with_engine(&config, |engine| {
            let tx = engine.execute_sell(&user, &ticker, shares, &channel)?;
            print_transaction(&tx);
            Ok(())
        }),
        Command::Portfolio { config, user } => with_engine(&config, |engine| {
            let summary = engine.snapshot(&user)?;
            print_summary(&summary);
            Ok(())
        }),
        Command::Holdings { config, user } => with_engine(&config, |engine| {
            let holdings = engine.holdings(&user)?;
            print_holdings_table(&holdings);
            Ok(())
        }),
        Command::Balance { config, user } => with_engine(&config, |engine| {
            let balance = engine.balance(&user)?;
            println!("{balance:.2}");
            Ok(())
        }),
        Command::History { config, user } => with_engine(&config, |engine| {
            let transactions = engine.history(&user)?;
            print_history(&transactions);
            Ok(())
        }),
        Command::Quotes { config } => run_quotes(&config),
        Command::InitDb { config } => run_init_db(&config),
    }
}

pub fn load_settings(path: &PathBuf) -> Result<LedgerSettings, ExitCode> {
    file_config::load_settings(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_quotes(config_path: &PathBuf) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = settings
        .quotes_path()
        .and_then(CsvOracle::from_file)
        .and_then(|oracle| oracle.list_quotes());
    match result {
        Ok(quotes) => {
            println!("{:<8} {:<24} {:>10} {:>8}", "TICKER", "COMPANY", "PRICE", "CHG%");
            for quote in quotes {
                println!(
                    "{:<8} {:<24} {:>10.2} {:>+8.2}",
                    quote.ticker, quote.company, quote.price, quote.change_percent
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

#[cfg(feature = "sqlite")]
fn run_init_db(config_path: &PathBuf) -> ExitCode {
    use crate::adapters::sqlite_store::SqliteStore;

    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = SqliteStore::from_settings(&settings).and_then(|store| store.initialize_schema());
    match result {
        Ok(()) => {
            eprintln!("schema initialized");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

#[cfg(not(feature = "sqlite"))]
fn run_init_db(_config_path: &PathBuf) -> ExitCode {
    eprintln!("error: sqlite feature is required for init-db");
    ExitCode::from(1)
}

#[cfg(feature = "sqlite")]
fn with_engine(
    config_path: &PathBuf,
    f: impl FnOnce(&crate::domain::ledger::LedgerEngine) -> Result<(), LedgerError>,
) -> ExitCode {
    use crate::adapters::sqlite_store::SqliteStore;
    use crate::domain::ledger::LedgerEngine;
    use crate::ports::journal_port::TransactionJournal;
    use crate::ports::store_port::PortfolioStore;
    use std::sync::Arc;

    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = (|| {
        let store = Arc::new(SqliteStore::from_settings(&settings)?);
        store.initialize_schema()?;
        let oracle: Arc<dyn PriceOracle> =
            Arc::new(CsvOracle::from_file(settings.quotes_path()?)?);
        let journal: Arc<dyn TransactionJournal> = store.clone();
        let portfolios: Arc<dyn PortfolioStore> = store;
        let engine = LedgerEngine::new(portfolios, journal, oracle, &settings);
        f(&engine)
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

#[cfg(not(feature = "sqlite"))]
fn with_engine(
    _config_path: &PathBuf,
    _f: impl FnOnce(&crate::domain::ledger::LedgerEngine) -> Result<(), LedgerError>,
) -> ExitCode {
    eprintln!("error: sqlite feature is required for this command");
    ExitCode::from(1)
}

fn print_transaction(tx: &Transaction) {
    println!(
        "{} {} {} x{} @ {:.2} = {:.2} via {} [{}]",
        tx.executed_at.format("%Y-%m-%d %H:%M"),
        tx.kind,
        tx.ticker,
        tx.shares,
        tx.unit_price,
        tx.total_value,
        tx.channel,
        tx.id
    );
}

fn print_holdings_table(holdings: &[crate::domain::portfolio::Holding]) {
    println!(
        "{:<8} {:<24} {:>8} {:>10} {:>10} {:<12}",
        "TICKER", "COMPANY", "SHARES", "AVG COST", "PRICE", "ACQUIRED"
    );
    for holding in holdings {
        println!(
            "{:<8} {:<24} {:>8} {:>10.2} {:>10.2} {:<12}",
            holding.ticker,
            holding.company,
            holding.shares,
            holding.avg_cost,
            holding.last_known_price,
            holding.acquired_on.format("%Y-%m-%d")
        );
    }
}

fn print_summary(summary: &PortfolioSummary) {
    print_holdings_table(&summary.holdings);
    println!();
    println!("balance:           {:>12.2}", summary.balance);
    println!("total invested:    {:>12.2}", summary.total_invested);
    println!("total value:       {:>12.2}", summary.total_value);
    println!(
        "gain/loss:         {:>12.2} ({:+.2}%)",
        summary.total_gain_loss, summary.total_gain_loss_percent
    );
}

fn print_history(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("no transactions");
        return;
    }
    for tx in transactions {
        print_transaction(tx);
    }
}
