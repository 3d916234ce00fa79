//! Securities module - instrument identity, typing and quotes.

mod securities_model;

pub use securities_model::{Security, SecurityQuote, SecurityType};
