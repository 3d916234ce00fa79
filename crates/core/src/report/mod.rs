//! Report module - per-security orchestration of the profit engine.

mod report_model;
mod report_service;

pub use report_model::{PortfolioProfitReport, ReportInput};
pub use report_service::ReportService;
