use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::fx::CurrencyConverter;
use crate::performance::{xirr, CashFlow};
use crate::positions::{FifoPositions, PositionsFilter};
use crate::securities::{Security, SecurityQuote, SecurityType};
use crate::transactions::{CashFlowType, SecurityEventCashFlow, TransactionCashFlowIndex};

/// Event kinds that enter the cash-flow series as money received or paid.
const PAYMENT_TYPES: [CashFlowType; 5] = [
    CashFlowType::Dividend,
    CashFlowType::Coupon,
    CashFlowType::Amortization,
    CashFlowType::Redemption,
    CashFlowType::Tax,
];

/// Money-weighted internal rate of return of the investments in one
/// security.
pub struct IrrService;

impl IrrService {
    /// `None` when the rate is undefined: derivative contracts (the margin
    /// deposit is not tracked, so there is no investment base), an open
    /// position without a dirty-price quote, or a degenerate series.
    pub fn calc(
        security: &Security,
        positions: &FifoPositions,
        index: &TransactionCashFlowIndex,
        events: &[SecurityEventCashFlow],
        quote: Option<&SecurityQuote>,
        converter: &CurrencyConverter,
        filter: &PositionsFilter,
    ) -> Option<f64> {
        if security.kind == SecurityType::Derivative {
            return None;
        }
        let count = positions.current_open_count();
        let dirty_price = quote.and_then(|quote| quote.dirty_price_in_currency());
        if count != 0 && dirty_price.is_none() {
            return None;
        }
        let to_currency = Self::transaction_currency(positions, index)?;

        let mut flows: Vec<CashFlow> = Vec::new();
        for transaction in positions.transactions() {
            // Deposits and withdrawals move no money.
            if transaction.id.is_none() {
                continue;
            }
            let date = transaction.timestamp.date_naive();
            let value: Decimal = index
                .for_transaction(transaction)
                .iter()
                .map(|flow| {
                    converter.convert_or_identity(flow.value, &flow.currency, &to_currency, date)
                })
                .sum();
            if value.is_zero() {
                continue;
            }
            flows.push(CashFlow {
                date,
                amount: value.to_f64()?,
            });
        }

        for event in events
            .iter()
            .filter(|event| PAYMENT_TYPES.contains(&event.kind) && filter.contains(event.timestamp))
        {
            let date = event.timestamp.date_naive();
            let value =
                converter.convert_or_identity(event.value, &event.currency, &to_currency, date);
            flows.push(CashFlow {
                date,
                amount: value.to_f64()?,
            });
        }

        if count != 0 {
            let quote = quote?;
            let date = quote.timestamp.date_naive();
            let currency = quote.currency.as_deref().unwrap_or(&to_currency);
            let price = converter.convert_or_identity(dirty_price?, currency, &to_currency, date);
            flows.push(CashFlow {
                date,
                amount: (Decimal::from(count) * price).to_f64()?,
            });
        }

        let rate = xirr(&flows);
        if rate.is_none() {
            debug!(
                "Money-weighted return is undefined for security {}",
                security.id
            );
        }
        rate
    }

    /// Currency of the security's trade price legs; all flows are converted
    /// into it before solving.
    fn transaction_currency(
        positions: &FifoPositions,
        index: &TransactionCashFlowIndex,
    ) -> Option<String> {
        positions.transactions().iter().find_map(|transaction| {
            index
                .find(transaction, CashFlowType::Price)
                .map(|flow| flow.currency.clone())
        })
    }
}
