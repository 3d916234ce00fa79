//! Performance module - money-weighted annualized return.

mod irr_calculator;
mod irr_service;

pub use irr_calculator::{xirr, CashFlow};
pub use irr_service::IrrService;
