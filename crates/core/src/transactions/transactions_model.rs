use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cash-flow classification shared by per-transaction legs and standalone
/// security events.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CashFlowType {
    /// Trade price leg of a transaction.
    Price,
    /// Bond accrued interest paid or received as part of a trade.
    AccruedInterest,
    /// Broker or exchange commission.
    Commission,
    /// Derivative trade value in currency.
    DerivativePrice,
    /// Derivative trade value in quote points.
    DerivativeQuote,
    Coupon,
    Amortization,
    Dividend,
    /// Bond principal repayment at maturity.
    Redemption,
    /// Tax withheld at source.
    Tax,
    /// Daily variation-margin settlement.
    DerivativeProfit,
}

/// A single buy or sell, or a securities deposit/withdrawal.
///
/// `id == None` marks a synthetic record: securities moved in or out of the
/// account without a trade, so no cash flows reference it. Immutable once
/// created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Option<i64>,
    pub portfolio: String,
    pub security: String,
    /// Signed unit count: positive buys, negative sells.
    pub count: i64,
    pub timestamp: DateTime<Utc>,
}

/// One monetary leg of a transaction (price, accrued interest, commission).
/// Values follow the cash perspective: money paid out is negative.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCashFlow {
    pub transaction_id: i64,
    pub kind: CashFlowType,
    pub value: Decimal,
    pub currency: String,
}

/// A security-level event: coupon, amortization, dividend, redemption,
/// withheld tax or derivative daily settlement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEventCashFlow {
    pub portfolio: String,
    pub security: String,
    pub timestamp: DateTime<Utc>,
    pub kind: CashFlowType,
    pub value: Decimal,
    pub currency: String,
    /// Unit count the event was paid for; redeemed units for redemptions.
    pub count: Option<i64>,
}

/// In-memory index of transaction cash flows keyed by transaction id.
///
/// Built once per report run from the collaborator-supplied rows and shared
/// read-only across per-security computations.
#[derive(Debug, Default, Clone)]
pub struct TransactionCashFlowIndex {
    by_transaction: HashMap<i64, Vec<TransactionCashFlow>>,
}

impl TransactionCashFlowIndex {
    pub fn new(cash_flows: &[TransactionCashFlow]) -> Self {
        let mut by_transaction: HashMap<i64, Vec<TransactionCashFlow>> = HashMap::new();
        for flow in cash_flows {
            by_transaction
                .entry(flow.transaction_id)
                .or_default()
                .push(flow.clone());
        }
        Self { by_transaction }
    }

    /// All cash flows of a transaction; empty for synthetic transactions.
    pub fn for_transaction(&self, transaction: &Transaction) -> &[TransactionCashFlow] {
        transaction
            .id
            .and_then(|id| self.by_transaction.get(&id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The flow of the given kind, if the transaction carries one.
    pub fn find(&self, transaction: &Transaction, kind: CashFlowType) -> Option<&TransactionCashFlow> {
        self.for_transaction(transaction)
            .iter()
            .find(|flow| flow.kind == kind)
    }
}
