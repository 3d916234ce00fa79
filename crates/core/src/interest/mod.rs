//! Interest module - links coupon, amortization, dividend and tax events to
//! the lots they were paid for.

mod paid_interest_model;
mod paid_interest_service;

pub use paid_interest_model::{PaidInterest, FICTITIOUS_POSITION_INSTANT};
pub use paid_interest_service::{PaidInterestService, PAY_TYPES};
