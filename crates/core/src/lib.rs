//! Profitbook Core - FIFO position matching and profit calculation engine.
//!
//! This crate is the pure computation core of the portfolio tracker: it
//! consumes transaction and cash-flow snapshots supplied by external
//! collaborators (persistence, broker-statement parsers, quote feeds) and
//! produces matched lots, attributed income, derivative mark-to-market
//! ledgers, per-security profit summaries and money-weighted returns.
//! It owns no storage and performs no I/O.

pub mod constants;
pub mod derivatives;
pub mod errors;
pub mod fx;
pub mod interest;
pub mod performance;
pub mod positions;
pub mod profit;
pub mod report;
pub mod securities;
pub mod transactions;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
