use chrono::{Duration, NaiveDate};
use log::warn;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::derivatives::{DerivativeDailyEvents, DerivativeEvents};
use crate::transactions::{SecurityEventCashFlow, Transaction, TransactionCashFlowIndex};

/// Builds the daily mark-to-market ledger of one derivative contract from
/// its transactions and daily settlement events.
pub struct DerivativeEventsService;

impl DerivativeEventsService {
    /// Walks calendar days from the first to the last event date and emits
    /// one record per day that saw a transaction or a non-zero settlement.
    /// Both inputs must be ordered by timestamp ascending.
    pub fn accumulate(
        transactions: &[Transaction],
        daily_settlements: &[SecurityEventCashFlow],
        index: &TransactionCashFlowIndex,
    ) -> DerivativeEvents {
        let settlements = Self::settlements_by_day(daily_settlements);

        let first_day = transactions
            .first()
            .map(|t| t.timestamp.date_naive())
            .into_iter()
            .chain(settlements.keys().copied())
            .min();
        let last_day = transactions
            .last()
            .map(|t| t.timestamp.date_naive())
            .into_iter()
            .chain(settlements.keys().copied())
            .max();
        let (Some(first_day), Some(last_day)) = (first_day, last_day) else {
            return DerivativeEvents::default();
        };

        let mut events = DerivativeEvents::default();
        let mut total_profit = Decimal::ZERO;
        let mut position = 0i64;
        let mut day = first_day;
        while day <= last_day {
            let daily: Vec<&Transaction> = transactions
                .iter()
                .filter(|t| t.timestamp.date_naive() == day)
                .collect();
            let settlement = settlements.get(&day);

            let settled = settlement.map(|s| !s.value.is_zero()).unwrap_or(false);
            if !daily.is_empty() || settled {
                position += daily.iter().map(|t| t.count).sum::<i64>();
                if let Some(settlement) = settlement {
                    total_profit += settlement.value;
                }
                let daily_transactions = daily
                    .iter()
                    .filter(|t| t.id.is_some())
                    .map(|t| {
                        let flows = index
                            .for_transaction(t)
                            .iter()
                            .map(|flow| (flow.kind, flow.clone()))
                            .collect();
                        ((*t).clone(), flows)
                    })
                    .collect();
                events.daily_events.push(DerivativeDailyEvents {
                    daily_transactions,
                    daily_profit: settlement.cloned(),
                    total_profit,
                    position,
                });
            }
            day = day + Duration::days(1);
        }
        events
    }

    fn settlements_by_day(
        daily_settlements: &[SecurityEventCashFlow],
    ) -> HashMap<NaiveDate, SecurityEventCashFlow> {
        let mut by_day = HashMap::new();
        for settlement in daily_settlements {
            let day = settlement.timestamp.date_naive();
            if by_day.insert(day, settlement.clone()).is_some() {
                warn!(
                    "Several settlement events for contract {} on {}, keeping the latest",
                    settlement.security, day
                );
            }
        }
        by_day
    }
}
