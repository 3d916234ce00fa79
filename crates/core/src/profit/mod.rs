//! Profit module - per-lot and per-security profit, commission and tax.

mod profit_model;
mod profit_service;

pub use profit_model::{PositionProfitRow, SecurityProfitSummary, TaxConfig};
pub use profit_service::ProfitService;

#[cfg(test)]
mod profit_service_tests;
