//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_store;
pub mod memory_store;
pub mod csv_oracle;
pub mod file_config;
