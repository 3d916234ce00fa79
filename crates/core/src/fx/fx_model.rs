use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A daily exchange-rate observation for one currency pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl ExchangeRate {
    /// Parses a currency-pair code into (base, quote).
    /// Supports "USD/RUB", "USD:RUB" and concatenated "USDRUB" (plus
    /// suffixed contract codes such as "USDRUB_TOM").
    pub fn parse_pair(key: &str) -> Option<(String, String)> {
        if let Some((base, quote)) = key.split_once('/') {
            return Some((base.to_string(), quote.to_string()));
        }
        if let Some((base, quote)) = key.split_once(':') {
            return Some((base.to_string(), quote.to_string()));
        }
        if key.len() >= 6 && key.is_ascii() {
            return Some((key[..3].to_string(), key[3..6].to_string()));
        }
        None
    }
}
