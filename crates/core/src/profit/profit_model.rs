use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::securities::{Security, SecurityType};
use crate::transactions::CashFlowType;

/// Jurisdiction-specific tax rules. The defaults reproduce the rules the
/// engine was originally written against; both rates and the base currency
/// are configuration, not behavior.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfig {
    /// Rate applied to realized capital gains when forecasting tax.
    pub capital_gains_rate: Decimal,
    /// Rate used for the foreign-income tax-liability estimate.
    pub income_tax_rate: Decimal,
    /// Currency the tax authority assesses income in. Payments in any other
    /// currency trigger the tax-liability estimate.
    pub base_currency: String,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            capital_gains_rate: dec!(0.13),
            income_tax_rate: dec!(0.13),
            base_currency: "RUB".to_string(),
        }
    }
}

/// Profit breakdown of a single lot, every monetary field in the report's
/// target currency. `None` marks a value that could not be determined (no
/// price on a deposit leg, missing cash flow), never a silent zero.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionProfitRow {
    pub security: String,
    pub open_date: DateTime<Utc>,
    /// Matched units, signed like the opening transaction.
    pub count: i64,
    /// Purchase price per unit.
    pub open_price: Option<Decimal>,
    pub open_amount: Option<Decimal>,
    pub open_accrued_interest: Option<Decimal>,
    pub open_commission: Option<Decimal>,
    pub closing_event: Option<CashFlowType>,
    pub close_date: Option<DateTime<Utc>>,
    pub close_amount: Option<Decimal>,
    pub close_accrued_interest: Option<Decimal>,
    pub close_commission: Option<Decimal>,
    pub coupon: Option<Decimal>,
    pub amortization: Option<Decimal>,
    pub dividend: Option<Decimal>,
    /// Tax withheld at source.
    pub tax: Option<Decimal>,
    /// Estimated tax top-up on income received in a foreign currency.
    pub tax_liability: Option<Decimal>,
    pub forecast_tax: Option<Decimal>,
    /// Net result of a closed lot.
    pub profit: Option<Decimal>,
    /// Annualized yield of a closed lot, percent.
    pub yield_percent: Option<Decimal>,
}

/// Aggregated per-security result row.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfitSummary {
    pub security: String,
    pub name: Option<String>,
    pub kind: SecurityType,
    pub first_transaction_date: Option<DateTime<Utc>>,
    pub last_transaction_date: Option<DateTime<Utc>>,
    pub last_event_date: Option<DateTime<Utc>>,
    /// Units bought over the window.
    pub buy_count: i64,
    /// Units sold or redeemed over the window.
    pub sell_count: i64,
    /// Currently open signed unit count.
    pub open_count: i64,
    /// Average cost per unmatched unit, open lots only.
    pub average_price: Option<Decimal>,
    pub average_accrued_interest: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub last_accrued_interest: Option<Decimal>,
    pub gross_profit: Option<Decimal>,
    pub commission: Decimal,
    pub coupon: Option<Decimal>,
    pub amortization: Option<Decimal>,
    pub dividend: Option<Decimal>,
    /// Tax withheld at source, absolute.
    pub tax: Option<Decimal>,
    pub tax_liability: Option<Decimal>,
    pub forecast_tax: Option<Decimal>,
    /// Net profit: payments plus gross profit, minus taxes and commission.
    pub profit: Option<Decimal>,
    /// Money-weighted annualized return, percent.
    pub internal_rate_of_return: Option<f64>,
    /// Present when the computation failed part-way; the other fields keep
    /// whatever was computed before the failure.
    pub error: Option<String>,
}

impl SecurityProfitSummary {
    /// A summary carrying only the security's identity.
    pub fn empty(security: &Security) -> Self {
        Self {
            security: security.id.clone(),
            name: security.name.clone(),
            kind: security.kind,
            first_transaction_date: None,
            last_transaction_date: None,
            last_event_date: None,
            buy_count: 0,
            sell_count: 0,
            open_count: 0,
            average_price: None,
            average_accrued_interest: None,
            last_price: None,
            last_accrued_interest: None,
            gross_profit: None,
            commission: Decimal::ZERO,
            coupon: None,
            amortization: None,
            dividend: None,
            tax: None,
            tax_liability: None,
            forecast_tax: None,
            profit: None,
            internal_rate_of_return: None,
            error: None,
        }
    }
}
