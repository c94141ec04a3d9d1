//! Core domain types and logic.

pub mod quote;
pub mod portfolio;
pub mod transaction;
pub mod ledger;
pub mod locks;
pub mod settings;
pub mod error;
