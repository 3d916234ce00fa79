use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Instrument class. Determines which cash-flow types are economically
/// meaningful: only bonds pay coupons and amortize principal, only
/// derivatives settle variation margin.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SecurityType {
    Stock,
    Bond,
    Derivative,
    CurrencyPair,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    /// ISIN, ticker or contract code.
    pub id: String,
    pub kind: SecurityType,
    pub name: Option<String>,
}

impl Security {
    /// Human-readable label, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Latest known market quote of one security.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityQuote {
    pub security: String,
    pub timestamp: DateTime<Utc>,
    /// Exchange quote: price for stocks, clean price in percent of face for
    /// bonds, quote points for derivatives.
    pub quote: Decimal,
    /// Clean price in `currency`, when known.
    pub price: Option<Decimal>,
    /// Bond accrued interest in `currency`.
    pub accrued_interest: Option<Decimal>,
    pub currency: Option<String>,
}

impl SecurityQuote {
    /// Clean price plus accrued interest (the "dirty" price). `None` when
    /// the price in currency is unknown.
    pub fn dirty_price_in_currency(&self) -> Option<Decimal> {
        self.price
            .map(|price| price + self.accrued_interest.unwrap_or(Decimal::ZERO))
    }
}
