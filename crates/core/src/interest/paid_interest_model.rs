use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

use crate::positions::{OpenedPosition, Position};
use crate::transactions::{CashFlowType, SecurityEventCashFlow, Transaction};

/// Anchor instant for fictitious lots. Income that cannot be tied to a real
/// lot (security bought before the data window, income-only holdings) is
/// attached to a synthetic zero-cost position opened at the epoch.
pub const FICTITIOUS_POSITION_INSTANT: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Income events allocated to the lots held over each event's record date.
#[derive(Debug, Default, Clone)]
pub struct PaidInterest {
    payments: HashMap<CashFlowType, HashMap<Position, Vec<SecurityEventCashFlow>>>,
}

impl PaidInterest {
    pub(crate) fn entry(
        &mut self,
        kind: CashFlowType,
    ) -> &mut HashMap<Position, Vec<SecurityEventCashFlow>> {
        self.payments.entry(kind).or_default()
    }

    /// Payments of `kind` allocated to `position`; empty when none were.
    pub fn get(&self, kind: CashFlowType, position: &Position) -> &[SecurityEventCashFlow] {
        self.payments
            .get(&kind)
            .and_then(|by_position| by_position.get(position))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distinct payment currencies, sorted.
    pub fn currencies(&self) -> Vec<String> {
        let mut currencies: Vec<String> = self
            .payments
            .values()
            .flat_map(|by_position| by_position.values())
            .flatten()
            .map(|cash| cash.currency.clone())
            .collect();
        currencies.sort();
        currencies.dedup();
        currencies
    }

    /// Lots with no known opening transaction, synthesized so payments for
    /// securities held before the transaction history are never dropped.
    pub fn fictitious_positions(&self) -> VecDeque<OpenedPosition> {
        let instant = FICTITIOUS_POSITION_INSTANT + Duration::nanoseconds(1);
        let mut fictitious: VecDeque<OpenedPosition> = VecDeque::new();
        for position in self
            .payments
            .values()
            .flat_map(|by_position| by_position.keys())
        {
            if let Position::Opened(opened) = position {
                if opened.was_opened_at(instant) && !fictitious.contains(opened) {
                    fictitious.push_back(opened.clone());
                }
            }
        }
        fictitious
    }

    /// The synthetic lot an unattributable payment is reported against.
    pub(crate) fn fictitious_position_for(cash: &SecurityEventCashFlow) -> Position {
        Position::Opened(OpenedPosition::new(Transaction {
            id: None,
            portfolio: cash.portfolio.clone(),
            security: cash.security.clone(),
            count: cash.count.unwrap_or(0),
            timestamp: FICTITIOUS_POSITION_INSTANT,
        }))
    }
}
