//! Port traits decoupling the ledger engine from its collaborators.

pub mod price_port;
pub mod store_port;
pub mod journal_port;
