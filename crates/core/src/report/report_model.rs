use serde::Serialize;
use std::collections::HashMap;

use crate::derivatives::DerivativeEvents;
use crate::fx::ExchangeRate;
use crate::profit::{PositionProfitRow, SecurityProfitSummary};
use crate::securities::{Security, SecurityQuote};
use crate::transactions::{SecurityEventCashFlow, Transaction, TransactionCashFlow};

/// Snapshot of collaborator-supplied inputs for one report run. The engine
/// derives everything else from here; nothing is read from ambient state.
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub securities: Vec<Security>,
    /// All transactions, any order; the engine orders and groups them per
    /// security.
    pub transactions: Vec<Transaction>,
    pub transaction_cash_flows: Vec<TransactionCashFlow>,
    pub security_events: Vec<SecurityEventCashFlow>,
    /// Latest quote per security id.
    pub quotes: HashMap<String, SecurityQuote>,
    pub exchange_rates: Vec<ExchangeRate>,
}

/// Per-security results of one report run. Serialization to spreadsheets,
/// HTML or JSON is the caller's concern.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioProfitReport {
    /// One aggregate row per input security, in input order.
    pub summaries: Vec<SecurityProfitSummary>,
    /// Per-lot rows keyed by security id; absent for derivatives.
    pub position_rows: HashMap<String, Vec<PositionProfitRow>>,
    /// Daily mark-to-market ledgers keyed by contract id.
    pub derivative_ledgers: HashMap<String, DerivativeEvents>,
}
