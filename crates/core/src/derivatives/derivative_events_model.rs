use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::transactions::{CashFlowType, SecurityEventCashFlow, Transaction, TransactionCashFlow};

/// One trading day of a derivative contract's life.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DerivativeDailyEvents {
    /// The day's transactions in order, each with its cash-flow breakdown
    /// (value in quote points, value in currency, commission).
    pub daily_transactions: Vec<(Transaction, HashMap<CashFlowType, TransactionCashFlow>)>,
    /// The day's variation-margin settlement, if the contract settled.
    pub daily_profit: Option<SecurityEventCashFlow>,
    /// Running variation-margin total, carried across days without a
    /// settlement.
    pub total_profit: Decimal,
    /// Signed end-of-day position.
    pub position: i64,
}

/// Day-by-day mark-to-market ledger of one derivative contract, in calendar
/// order.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DerivativeEvents {
    pub daily_events: Vec<DerivativeDailyEvents>,
}

impl DerivativeEvents {
    /// Final cumulative variation margin; zero for an empty ledger.
    pub fn total_profit(&self) -> Decimal {
        self.daily_events
            .last()
            .map(|day| day.total_profit)
            .unwrap_or(Decimal::ZERO)
    }

    /// Final end-of-day position; zero for an empty ledger.
    pub fn final_position(&self) -> i64 {
        self.daily_events.last().map(|day| day.position).unwrap_or(0)
    }
}
