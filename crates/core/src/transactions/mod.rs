//! Transactions module - trade records and their associated cash flows.

mod transactions_model;

pub use transactions_model::{
    CashFlowType, SecurityEventCashFlow, Transaction, TransactionCashFlow,
    TransactionCashFlowIndex,
};
