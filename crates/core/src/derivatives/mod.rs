//! Derivatives module - daily variation-margin ledger for futures contracts.

mod derivative_events_model;
mod derivative_events_service;

pub use derivative_events_model::{DerivativeDailyEvents, DerivativeEvents};
pub use derivative_events_service::DerivativeEventsService;

#[cfg(test)]
mod derivative_events_tests;
