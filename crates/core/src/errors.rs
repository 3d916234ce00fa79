//! Core error types for the profit engine.
//!
//! The engine is persistence-agnostic: collaborators convert their own
//! storage or parsing failures before data reaches this crate, so the types
//! here only describe computation failures.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::fx::FxError;
use crate::transactions::CashFlowType;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Position matching or profit calculation failed: {0}")]
    Calculation(#[from] CalculatorError),

    #[error("Fx error: {0}")]
    Fx(#[from] FxError),

    #[error("Input validation failed: {0}")]
    Validation(String),
}

/// Errors raised while matching lots and computing profits.
#[derive(Error, Debug)]
pub enum CalculatorError {
    #[error("Invalid transaction data: {0}")]
    InvalidTransaction(String),

    #[error("Security {security} cannot be closed by a {kind:?} event, only Price and Redemption close positions")]
    UnsupportedClosingEvent { security: String, kind: CashFlowType },

    #[error("Security {security} has {found} redemption events in the window, a bond redeems at most once")]
    MultipleRedemptions { security: String, found: usize },

    #[error("Position opened by transaction {transaction_id:?} holds {available} unmatched units, cannot close {count}")]
    ExcessiveClose {
        transaction_id: Option<i64>,
        available: i64,
        count: i64,
    },

    #[error("Transaction history for security {security} is incomplete: no past instant holds {count} open units before {timestamp}")]
    BookClosureNotFound {
        security: String,
        count: i64,
        timestamp: DateTime<Utc>,
    },

    #[error("Payment on security {security} cannot be allocated to a short position")]
    PaymentOnShortPosition { security: String },

    #[error("Calculation failed: {0}")]
    Calculation(String),
}
