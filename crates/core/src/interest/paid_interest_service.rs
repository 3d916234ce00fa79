use chrono::{DateTime, Duration, Utc};
use log::error;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::DECIMAL_PRECISION;
use crate::errors::CalculatorError;
use crate::interest::{PaidInterest, FICTITIOUS_POSITION_INSTANT};
use crate::positions::{FifoPositions, Position, PositionsFilter};
use crate::transactions::{CashFlowType, SecurityEventCashFlow};

/// Income event types that are attributed to lots.
pub const PAY_TYPES: [CashFlowType; 4] = [
    CashFlowType::Coupon,
    CashFlowType::Amortization,
    CashFlowType::Dividend,
    CashFlowType::Tax,
];

/// Attributes a security's income events to the lots that held the security
/// over each event's record date.
pub struct PaidInterestService;

impl PaidInterestService {
    /// `positions` must be matched over the entire history up to the report
    /// end: the record-date search walks the full position history, while
    /// only lots alive inside `filter`'s window receive allocations.
    ///
    /// Allocation never drops an event: when it cannot be tied to a real
    /// lot, it is reported against a fictitious position instead.
    pub fn attribute(
        events: &[SecurityEventCashFlow],
        positions: &FifoPositions,
        filter: &PositionsFilter,
    ) -> PaidInterest {
        let mut paid_interest = PaidInterest::default();
        for kind in PAY_TYPES {
            let typed_events = events
                .iter()
                .filter(|event| event.kind == kind && filter.contains(event.timestamp));
            for cash in typed_events {
                match Self::allocate(cash, positions, filter) {
                    Ok(allocations) => {
                        for (position, payment) in allocations {
                            paid_interest
                                .entry(kind)
                                .entry(position)
                                .or_default()
                                .push(payment);
                        }
                    }
                    Err(e) => {
                        error!(
                            "{}, the payment will be reported against a fictitious position dated {}",
                            e, FICTITIOUS_POSITION_INSTANT
                        );
                        paid_interest
                            .entry(kind)
                            .entry(PaidInterest::fictitious_position_for(cash))
                            .or_default()
                            .push(cash.clone());
                    }
                }
            }
        }
        paid_interest
    }

    /// Splits one payment across the lots held on its record date,
    /// proportionally to each lot's unit count.
    fn allocate(
        cash: &SecurityEventCashFlow,
        positions: &FifoPositions,
        filter: &PositionsFilter,
    ) -> Result<Vec<(Position, SecurityEventCashFlow)>, CalculatorError> {
        let count = cash.count.ok_or_else(|| {
            CalculatorError::InvalidTransaction(format!(
                "payment event for security {} carries no unit count",
                cash.security
            ))
        })?;
        if count <= 0 {
            return Err(CalculatorError::InvalidTransaction(format!(
                "payment event for security {} was paid for {} units",
                cash.security, count
            )));
        }

        let book_closure = Self::book_closure_date(positions, cash, count)?;

        let mut paid_positions: Vec<Position> = positions
            .closed_positions()
            .iter()
            .filter(|position| position.was_opened_at(book_closure))
            .map(|position| Position::Closed(position.clone()))
            .collect();
        paid_positions.extend(
            positions
                .opened_positions()
                .iter()
                .filter(|position| position.was_opened_at(book_closure))
                .map(|position| Position::Opened(position.clone())),
        );
        paid_positions.retain(|position| position.was_opened_between(filter.from, filter.to));

        if paid_positions.is_empty() {
            return Err(CalculatorError::Calculation(format!(
                "no lot inside the report window held security {} on its record date",
                cash.security
            )));
        }

        let pay_per_unit = (cash.value / Decimal::from(count))
            .round_dp_with_strategy(DECIMAL_PRECISION, RoundingStrategy::MidpointAwayFromZero);

        let mut allocations = Vec::with_capacity(paid_positions.len());
        for position in paid_positions {
            let position_count = position.count();
            if position_count <= 0 {
                return Err(CalculatorError::PaymentOnShortPosition {
                    security: cash.security.clone(),
                });
            }
            let pay = (pay_per_unit * Decimal::from(position_count))
                .round_dp_with_strategy(DECIMAL_PRECISION, RoundingStrategy::MidpointAwayFromZero);
            let mut payment = cash.clone();
            payment.count = Some(position_count);
            payment.value = pay;
            allocations.push((position, payment));
        }
        Ok(allocations)
    }

    /// The record date of a payment: the latest past instant at which the
    /// open position count equals the unit count the issuer paid for,
    /// resolved to the precision of the gap between adjacent transactions.
    fn book_closure_date(
        positions: &FifoPositions,
        payment: &SecurityEventCashFlow,
        pay_count: i64,
    ) -> Result<DateTime<Utc>, CalculatorError> {
        let pay_date = payment.timestamp;
        positions
            .position_histories()
            .iter()
            .rev()
            .find(|history| pay_date > history.instant() && history.opened_count == pay_count)
            .map(|history| history.instant() + Duration::nanoseconds(1))
            .ok_or(CalculatorError::BookClosureNotFound {
                security: payment.security.clone(),
                count: pay_count,
                timestamp: pay_date,
            })
    }
}
