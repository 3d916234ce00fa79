use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::derivatives::DerivativeEventsService;
use crate::transactions::{
    CashFlowType, SecurityEventCashFlow, Transaction, TransactionCashFlow,
    TransactionCashFlowIndex,
};

fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, day, hour, 0, 0).unwrap()
}

fn txn(id: i64, count: i64, day: u32, hour: u32) -> Transaction {
    Transaction {
        id: Some(id),
        portfolio: "P1".to_string(),
        security: "FUT1".to_string(),
        count,
        timestamp: ts(day, hour),
    }
}

fn settlement(value: Decimal, day: u32) -> SecurityEventCashFlow {
    SecurityEventCashFlow {
        portfolio: "P1".to_string(),
        security: "FUT1".to_string(),
        timestamp: ts(day, 19),
        kind: CashFlowType::DerivativeProfit,
        value,
        currency: "RUB".to_string(),
        count: None,
    }
}

#[test]
fn test_days_without_activity_are_skipped() {
    let transactions = vec![txn(1, 2, 1, 10), txn(2, -2, 5, 10)];
    let settlements = vec![settlement(dec!(100), 1), settlement(dec!(-40), 5)];
    let index = TransactionCashFlowIndex::default();

    let ledger = DerivativeEventsService::accumulate(&transactions, &settlements, &index);

    assert_eq!(ledger.daily_events.len(), 2);
}

#[test]
fn test_cumulative_profit_carries_across_days() {
    let transactions = vec![txn(1, 2, 1, 10)];
    let settlements = vec![
        settlement(dec!(100), 1),
        settlement(dec!(-40), 2),
        settlement(dec!(15), 4),
    ];
    let index = TransactionCashFlowIndex::default();

    let ledger = DerivativeEventsService::accumulate(&transactions, &settlements, &index);

    let totals: Vec<Decimal> = ledger.daily_events.iter().map(|d| d.total_profit).collect();
    assert_eq!(totals, vec![dec!(100), dec!(60), dec!(75)]);
    assert_eq!(ledger.total_profit(), dec!(75));
}

#[test]
fn test_position_is_a_running_transaction_sum() {
    let transactions = vec![txn(1, 2, 1, 10), txn(2, 3, 2, 11), txn(3, -4, 3, 12)];
    let index = TransactionCashFlowIndex::default();

    let ledger = DerivativeEventsService::accumulate(&transactions, &[], &index);

    let positions: Vec<i64> = ledger.daily_events.iter().map(|d| d.position).collect();
    assert_eq!(positions, vec![2, 5, 1]);
    assert_eq!(ledger.final_position(), 1);
}

#[test]
fn test_transactions_keep_their_cash_flow_breakdown() {
    let transactions = vec![txn(7, 2, 1, 10)];
    let flows = vec![
        TransactionCashFlow {
            transaction_id: 7,
            kind: CashFlowType::DerivativeQuote,
            value: dec!(-12000),
            currency: "PNT".to_string(),
        },
        TransactionCashFlow {
            transaction_id: 7,
            kind: CashFlowType::Commission,
            value: dec!(-2.5),
            currency: "RUB".to_string(),
        },
    ];
    let index = TransactionCashFlowIndex::new(&flows);

    let ledger = DerivativeEventsService::accumulate(&transactions, &[], &index);

    let (transaction, breakdown) = &ledger.daily_events[0].daily_transactions[0];
    assert_eq!(transaction.id, Some(7));
    assert_eq!(
        breakdown.get(&CashFlowType::Commission).map(|f| f.value),
        Some(dec!(-2.5))
    );
    assert_eq!(
        breakdown.get(&CashFlowType::DerivativeQuote).map(|f| f.value),
        Some(dec!(-12000))
    );
}

#[test]
fn test_zero_value_settlement_alone_emits_no_day() {
    let settlements = vec![settlement(dec!(0), 2)];
    let index = TransactionCashFlowIndex::default();

    let ledger = DerivativeEventsService::accumulate(&[], &settlements, &index);

    assert!(ledger.daily_events.is_empty());
    assert_eq!(ledger.total_profit(), Decimal::ZERO);
}

#[test]
fn test_empty_inputs_yield_an_empty_ledger() {
    let index = TransactionCashFlowIndex::default();
    let ledger = DerivativeEventsService::accumulate(&[], &[], &index);
    assert!(ledger.daily_events.is_empty());
}
