use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::{DAYS_PER_YEAR, DECIMAL_PRECISION};
use crate::errors::{CalculatorError, Result};
use crate::fx::CurrencyConverter;
use crate::interest::PaidInterest;
use crate::positions::{ClosedPosition, FifoPositions, Position};
use crate::profit::{PositionProfitRow, SecurityProfitSummary, TaxConfig};
use crate::securities::{Security, SecurityQuote, SecurityType};
use crate::transactions::{
    CashFlowType, SecurityEventCashFlow, Transaction, TransactionCashFlowIndex,
};

/// Event kinds that drive the "last event" summary column.
const PAYMENT_EVENTS: [CashFlowType; 5] = [
    CashFlowType::Dividend,
    CashFlowType::Coupon,
    CashFlowType::Amortization,
    CashFlowType::Redemption,
    CashFlowType::Tax,
];

fn round6(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes per-lot profit rows and the per-security aggregate from matched
/// lots, attributed income and the current quote. Every monetary component
/// is converted to the target currency at the date it was realized, not at
/// report time.
pub struct ProfitService<'a> {
    index: &'a TransactionCashFlowIndex,
    converter: &'a CurrencyConverter,
    tax: &'a TaxConfig,
    to_currency: &'a str,
}

impl<'a> ProfitService<'a> {
    pub fn new(
        index: &'a TransactionCashFlowIndex,
        converter: &'a CurrencyConverter,
        tax: &'a TaxConfig,
        to_currency: &'a str,
    ) -> Self {
        Self {
            index,
            converter,
            tax,
            to_currency,
        }
    }

    /// One row per opened, closed and fictitious lot, in lot order.
    pub fn position_rows(
        &self,
        security: &Security,
        positions: &FifoPositions,
        paid_interest: &PaidInterest,
    ) -> Result<Vec<PositionProfitRow>> {
        let mut rows = Vec::new();
        for opened in positions.opened_positions() {
            rows.push(self.opened_row(
                security,
                &Position::Opened(opened.clone()),
                paid_interest,
            ));
        }
        for closed in positions.closed_positions() {
            rows.push(self.closed_row(security, closed, positions, paid_interest)?);
        }
        for fictitious in paid_interest.fictitious_positions() {
            rows.push(self.opened_row(
                security,
                &Position::Opened(fictitious),
                paid_interest,
            ));
        }
        Ok(rows)
    }

    /// The open-side half of a row, also used stand-alone for lots that are
    /// still open and for fictitious lots.
    fn opened_row(
        &self,
        security: &Security,
        position: &Position,
        paid_interest: &PaidInterest,
    ) -> PositionProfitRow {
        let transaction = position.open_transaction();
        let count = position.count().abs() * transaction.count.signum();

        let mut open_price = self.price_per_unit(transaction);
        if open_price.is_none() {
            if let Position::Closed(closed) = position {
                // Securities deposited rather than bought: take the sale
                // price as the purchase price so no spurious result appears.
                open_price = self.price_per_unit(&closed.close_transaction);
            }
        }
        let open_amount = open_price.map(|price| price * Decimal::from(count.abs()));

        let multiplier = count_multiplier(position.count(), transaction.count);
        let (open_accrued_interest, open_commission) = match multiplier {
            Some(m) => (
                self.transaction_flow(transaction, CashFlowType::AccruedInterest, m),
                self.transaction_flow(transaction, CashFlowType::Commission, m),
            ),
            None => (None, None),
        };

        let coupon = self.paid_interest_total(paid_interest, CashFlowType::Coupon, position);
        let amortization =
            self.paid_interest_total(paid_interest, CashFlowType::Amortization, position);
        let dividend = self.paid_interest_total(paid_interest, CashFlowType::Dividend, position);
        let tax = self.paid_interest_total(paid_interest, CashFlowType::Tax, position);
        let tax_liability = self.tax_liability(paid_interest, coupon, dividend, tax);

        PositionProfitRow {
            security: security.id.clone(),
            open_date: transaction.timestamp,
            count,
            open_price,
            open_amount,
            open_accrued_interest,
            open_commission,
            closing_event: None,
            close_date: None,
            close_amount: None,
            close_accrued_interest: None,
            close_commission: None,
            coupon,
            amortization,
            dividend,
            tax,
            tax_liability,
            forecast_tax: None,
            profit: None,
            yield_percent: None,
        }
    }

    fn closed_row(
        &self,
        security: &Security,
        closed: &ClosedPosition,
        positions: &FifoPositions,
        paid_interest: &PaidInterest,
    ) -> Result<PositionProfitRow> {
        let position = Position::Closed(closed.clone());
        let mut row = self.opened_row(security, &position, paid_interest);

        let close_transaction = &closed.close_transaction;
        let multiplier = count_multiplier(closed.count, close_transaction.count);

        let mut close_amount = match closed.closing_event {
            CashFlowType::Price => multiplier
                .and_then(|m| self.transaction_flow(close_transaction, CashFlowType::Price, m)),
            CashFlowType::Redemption => {
                multiplier.and_then(|m| self.redemption_amount(positions, m))
            }
            kind => {
                return Err(CalculatorError::UnsupportedClosingEvent {
                    security: security.id.clone(),
                    kind,
                }
                .into())
            }
        };
        if close_amount.is_none() {
            // Securities withdrawn rather than sold: take the purchase price
            // as the sale price so no spurious result appears.
            close_amount = count_multiplier(closed.count, closed.open_transaction.count)
                .and_then(|m| {
                    self.transaction_flow(&closed.open_transaction, CashFlowType::Price, m)
                });
        }

        row.closing_event = Some(closed.closing_event);
        row.close_date = Some(close_transaction.timestamp);
        row.close_amount = close_amount;
        row.close_accrued_interest = multiplier.and_then(|m| {
            self.transaction_flow(close_transaction, CashFlowType::AccruedInterest, m)
        });
        row.close_commission = multiplier
            .and_then(|m| self.transaction_flow(close_transaction, CashFlowType::Commission, m));

        let is_long = closed.is_long();
        row.forecast_tax = self.forecast_tax(&row, is_long);
        row.profit = self.closed_profit(&row, is_long);
        row.yield_percent = closed_yield(&row);
        Ok(row)
    }

    /// |flow value| scaled by the lot's share of the transaction, converted
    /// to the target currency at the transaction date. `None` for synthetic
    /// transactions and missing flows.
    fn transaction_flow(
        &self,
        transaction: &Transaction,
        kind: CashFlowType,
        multiplier: Decimal,
    ) -> Option<Decimal> {
        let flow = self.index.find(transaction, kind)?;
        let value = round6((flow.value * multiplier).abs());
        Some(self.converter.convert_or_identity(
            value,
            &flow.currency,
            self.to_currency,
            transaction.timestamp.date_naive(),
        ))
    }

    /// Trade price per unit, converted at the transaction date.
    fn price_per_unit(&self, transaction: &Transaction) -> Option<Decimal> {
        if transaction.count == 0 {
            return None;
        }
        let per_unit = Decimal::ONE / Decimal::from(transaction.count);
        self.transaction_flow(transaction, CashFlowType::Price, per_unit)
    }

    /// Redemption proceeds for the lot: the event value scaled by the lot's
    /// share of the redeemed units, converted at the event date.
    fn redemption_amount(
        &self,
        positions: &FifoPositions,
        multiplier: Decimal,
    ) -> Option<Decimal> {
        positions.redemptions().front().map(|redemption| {
            let value = round6((redemption.value * multiplier).abs());
            self.converter.convert_or_identity(
                value,
                &redemption.currency,
                self.to_currency,
                redemption.timestamp.date_naive(),
            )
        })
    }

    /// Sum of |payments| of `kind` allocated to the lot, each converted at
    /// its own event date. `None` when the lot received none.
    fn paid_interest_total(
        &self,
        paid_interest: &PaidInterest,
        kind: CashFlowType,
        position: &Position,
    ) -> Option<Decimal> {
        let pays = paid_interest.get(kind, position);
        if pays.is_empty() {
            return None;
        }
        Some(
            pays.iter()
                .map(|cash| {
                    self.converter.convert_or_identity(
                        cash.value.abs(),
                        &cash.currency,
                        self.to_currency,
                        cash.timestamp.date_naive(),
                    )
                })
                .sum(),
        )
    }

    /// Estimated tax top-up when income crossed a currency border: domestic
    /// income tax on coupons and dividends minus tax already withheld,
    /// floored at zero. `None` while everything stayed in the base currency.
    fn tax_liability(
        &self,
        paid_interest: &PaidInterest,
        coupon: Option<Decimal>,
        dividend: Option<Decimal>,
        tax: Option<Decimal>,
    ) -> Option<Decimal> {
        let base = &self.tax.base_currency;
        let foreign = !self.to_currency.eq_ignore_ascii_case(base)
            || paid_interest
                .currencies()
                .iter()
                .any(|currency| !currency.eq_ignore_ascii_case(base));
        if !foreign || (coupon.is_none() && dividend.is_none()) {
            return None;
        }
        let payments = coupon.unwrap_or(Decimal::ZERO) + dividend.unwrap_or(Decimal::ZERO);
        let liability = self.tax.income_tax_rate * payments - tax.unwrap_or(Decimal::ZERO);
        Some(round6(liability.max(Decimal::ZERO)))
    }

    /// Capital-gains tax expected on the realized result, never negative.
    fn forecast_tax(&self, row: &PositionProfitRow, is_long: bool) -> Option<Decimal> {
        let open = row.open_amount? + row.open_accrued_interest.unwrap_or(Decimal::ZERO);
        let close = row.close_amount? + row.close_accrued_interest.unwrap_or(Decimal::ZERO);
        let commission = row.open_commission.unwrap_or(Decimal::ZERO)
            + row.close_commission.unwrap_or(Decimal::ZERO);
        let amortization = row.amortization.unwrap_or(Decimal::ZERO);
        let (buy, sell) = if is_long { (open, close) } else { (close, open) };
        let taxable = sell + amortization - buy - commission;
        if taxable <= Decimal::ZERO {
            return Some(Decimal::ZERO);
        }
        Some(round6(self.tax.capital_gains_rate * taxable))
    }

    /// Net result of a closed lot: proceeds plus payments, minus cost,
    /// taxes and commission. Sides swap for a short position.
    fn closed_profit(&self, row: &PositionProfitRow, is_long: bool) -> Option<Decimal> {
        let open = row.open_amount? + row.open_accrued_interest.unwrap_or(Decimal::ZERO);
        let close = row.close_amount? + row.close_accrued_interest.unwrap_or(Decimal::ZERO);
        let commission = row.open_commission.unwrap_or(Decimal::ZERO)
            + row.close_commission.unwrap_or(Decimal::ZERO);
        let payments = row.coupon.unwrap_or(Decimal::ZERO)
            + row.amortization.unwrap_or(Decimal::ZERO)
            + row.dividend.unwrap_or(Decimal::ZERO);
        let taxes = row.tax.unwrap_or(Decimal::ZERO)
            + row.tax_liability.unwrap_or(Decimal::ZERO)
            + row.forecast_tax.unwrap_or(Decimal::ZERO);
        let (buy, sell) = if is_long { (open, close) } else { (close, open) };
        Some(round6(sell + payments - buy - taxes - commission))
    }

    /// Per-security aggregate over the matched lots and the window's events.
    #[allow(clippy::too_many_arguments)]
    pub fn summary(
        &self,
        security: &Security,
        positions: &FifoPositions,
        rows: &[PositionProfitRow],
        events: &[SecurityEventCashFlow],
        quote: Option<&SecurityQuote>,
        internal_rate_of_return: Option<f64>,
    ) -> SecurityProfitSummary {
        let mut summary = SecurityProfitSummary::empty(security);

        summary.first_transaction_date = positions
            .position_histories()
            .front()
            .map(|history| history.instant());
        summary.last_transaction_date = positions
            .position_histories()
            .back()
            .map(|history| history.instant());
        summary.last_event_date = events
            .iter()
            .filter(|event| PAYMENT_EVENTS.contains(&event.kind))
            .map(|event| event.timestamp)
            .max();

        summary.buy_count = positions
            .transactions()
            .iter()
            .map(|t| t.count)
            .filter(|count| *count > 0)
            .sum();
        summary.sell_count = positions
            .transactions()
            .iter()
            .map(|t| t.count)
            .filter(|count| *count < 0)
            .sum::<i64>()
            .abs()
            + positions
                .redemptions()
                .iter()
                .filter_map(|event| event.count)
                .sum::<i64>();
        summary.open_count = positions.current_open_count();

        summary.commission = positions
            .transactions()
            .iter()
            .filter_map(|t| self.transaction_flow(t, CashFlowType::Commission, Decimal::ONE))
            .sum();

        summary.coupon = self.event_total(events, CashFlowType::Coupon);
        summary.amortization = self.event_total(events, CashFlowType::Amortization);
        summary.dividend = self.event_total(events, CashFlowType::Dividend);
        summary.tax = self.event_total(events, CashFlowType::Tax);

        if summary.open_count != 0 {
            let (average_price, average_accrued_interest) = self.average_open_cost(positions);
            summary.average_price = average_price;
            summary.average_accrued_interest = average_accrued_interest;
        }

        if let Some(quote) = quote {
            let currency = quote.currency.as_deref().unwrap_or(self.to_currency);
            let date = quote.timestamp.date_naive();
            summary.last_price = quote
                .price
                .map(|price| self.converter.convert_or_identity(price, currency, self.to_currency, date));
            summary.last_accrued_interest = quote.accrued_interest.map(|accrued| {
                self.converter
                    .convert_or_identity(accrued, currency, self.to_currency, date)
            });
        }

        summary.gross_profit = self.gross_profit(security, &summary, rows, events);
        summary.forecast_tax = total_of(rows, |row| row.forecast_tax);
        summary.tax_liability = total_of(rows, |row| row.tax_liability);

        summary.profit = summary.gross_profit.map(|gross| {
            let payments = summary.coupon.unwrap_or(Decimal::ZERO)
                + summary.dividend.unwrap_or(Decimal::ZERO);
            let taxes = summary.tax.unwrap_or(Decimal::ZERO)
                + summary.tax_liability.unwrap_or(Decimal::ZERO)
                + summary.forecast_tax.unwrap_or(Decimal::ZERO);
            round6(payments + gross - taxes - summary.commission)
        });

        summary.internal_rate_of_return = internal_rate_of_return;
        summary
    }

    /// Exchange-rate gain or loss, by instrument class:
    /// unrealized on the open position for stocks, bonds and currency
    /// pairs; realized over the closed lots once flat; cumulative variation
    /// margin for derivatives. Amortization already received counts toward
    /// a bond's gross profit.
    fn gross_profit(
        &self,
        security: &Security,
        summary: &SecurityProfitSummary,
        rows: &[PositionProfitRow],
        events: &[SecurityEventCashFlow],
    ) -> Option<Decimal> {
        let amortization = summary.amortization.unwrap_or(Decimal::ZERO);
        match security.kind {
            SecurityType::Derivative => self.signed_event_total(events, CashFlowType::DerivativeProfit),
            SecurityType::Stock | SecurityType::Bond | SecurityType::CurrencyPair => {
                if summary.open_count != 0 {
                    let last = summary.last_price?;
                    let average = summary.average_price?;
                    let last_accrued = summary.last_accrued_interest.unwrap_or(Decimal::ZERO);
                    let average_accrued =
                        summary.average_accrued_interest.unwrap_or(Decimal::ZERO);
                    Some(round6(
                        (last + last_accrued - average - average_accrued)
                            * Decimal::from(summary.open_count)
                            + amortization,
                    ))
                } else {
                    realized_gross(rows).map(|gross| round6(gross + amortization))
                }
            }
        }
    }

    /// Average cost and accrued interest per unmatched unit, over the open
    /// lots only. Lots deposited without a price do not contribute.
    fn average_open_cost(&self, positions: &FifoPositions) -> (Option<Decimal>, Option<Decimal>) {
        let open_count = positions.current_open_count();
        if open_count == 0 {
            return (None, None);
        }
        let mut cost = Decimal::ZERO;
        let mut accrued = Decimal::ZERO;
        let mut priced = false;
        for opened in positions.opened_positions() {
            let Some(multiplier) =
                count_multiplier(opened.unclosed_count, opened.open_transaction.count)
            else {
                continue;
            };
            if let Some(value) =
                self.transaction_flow(&opened.open_transaction, CashFlowType::Price, multiplier)
            {
                cost += value;
                priced = true;
            }
            if let Some(value) = self.transaction_flow(
                &opened.open_transaction,
                CashFlowType::AccruedInterest,
                multiplier,
            ) {
                accrued += value;
            }
        }
        if !priced {
            return (None, None);
        }
        let units = Decimal::from(open_count.abs());
        (
            Some(round6(cost / units)),
            Some(round6(accrued / units)),
        )
    }

    /// Sum of events of `kind`, each converted at its own date. Withheld
    /// tax is reported as a positive magnitude.
    fn event_total(&self, events: &[SecurityEventCashFlow], kind: CashFlowType) -> Option<Decimal> {
        let matching: Vec<&SecurityEventCashFlow> =
            events.iter().filter(|event| event.kind == kind).collect();
        if matching.is_empty() {
            return None;
        }
        Some(
            matching
                .iter()
                .map(|event| {
                    self.converter.convert_or_identity(
                        event.value.abs(),
                        &event.currency,
                        self.to_currency,
                        event.timestamp.date_naive(),
                    )
                })
                .sum(),
        )
    }

    /// Signed sum of events of `kind`; variation margin keeps its sign.
    fn signed_event_total(
        &self,
        events: &[SecurityEventCashFlow],
        kind: CashFlowType,
    ) -> Option<Decimal> {
        let matching: Vec<&SecurityEventCashFlow> =
            events.iter().filter(|event| event.kind == kind).collect();
        if matching.is_empty() {
            return None;
        }
        Some(
            matching
                .iter()
                .map(|event| {
                    self.converter.convert_or_identity(
                        event.value,
                        &event.currency,
                        self.to_currency,
                        event.timestamp.date_naive(),
                    )
                })
                .sum(),
        )
    }
}

/// Share of a transaction belonging to one lot, at fixed precision.
fn count_multiplier(position_count: i64, transaction_count: i64) -> Option<Decimal> {
    if transaction_count == 0 {
        return None;
    }
    if position_count.abs() == transaction_count.abs() {
        return Some(Decimal::ONE);
    }
    Some(round6(
        Decimal::from(position_count.abs()) / Decimal::from(transaction_count.abs()),
    ))
}

/// Matched proceeds minus matched cost across closed lots with both legs
/// priced. Deposit-withdrawal lots net to zero by construction and lots
/// with no price at all are skipped.
fn realized_gross(rows: &[PositionProfitRow]) -> Option<Decimal> {
    let mut total = Decimal::ZERO;
    let mut any = false;
    for row in rows.iter().filter(|row| row.close_date.is_some()) {
        let (Some(open_amount), Some(close_amount)) = (row.open_amount, row.close_amount) else {
            continue;
        };
        let open = open_amount + row.open_accrued_interest.unwrap_or(Decimal::ZERO);
        let close = close_amount + row.close_accrued_interest.unwrap_or(Decimal::ZERO);
        total += if row.count > 0 { close - open } else { open - close };
        any = true;
    }
    any.then_some(total)
}

/// Annualized yield of a closed lot: profit over the opening outlay scaled
/// to a full year.
fn closed_yield(row: &PositionProfitRow) -> Option<Decimal> {
    let profit = row.profit?;
    let outlay = row.open_amount?
        + row.open_accrued_interest.unwrap_or(Decimal::ZERO)
        + row.open_commission.unwrap_or(Decimal::ZERO);
    if outlay.is_zero() {
        return None;
    }
    let close_date = row.close_date?;
    let days = (close_date - row.open_date).num_days().abs();
    let annualization = Decimal::from(100 * DAYS_PER_YEAR) / Decimal::from(1 + days);
    Some(round6(profit / outlay * annualization))
}

/// Sum of a per-row optional component; `None` when no row carried one.
fn total_of(
    rows: &[PositionProfitRow],
    component: impl Fn(&PositionProfitRow) -> Option<Decimal>,
) -> Option<Decimal> {
    let values: Vec<Decimal> = rows.iter().filter_map(component).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.into_iter().sum())
}
