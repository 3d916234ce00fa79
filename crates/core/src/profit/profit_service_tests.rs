use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fx::CurrencyConverter;
use crate::interest::{PaidInterest, PaidInterestService};
use crate::positions::{FifoPositions, PositionsFilter};
use crate::profit::{ProfitService, TaxConfig};
use crate::securities::{Security, SecurityQuote, SecurityType};
use crate::transactions::{
    CashFlowType, SecurityEventCashFlow, Transaction, TransactionCashFlow,
    TransactionCashFlowIndex,
};

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, day, 12, 0, 0).unwrap()
}

fn security(kind: SecurityType) -> Security {
    Security {
        id: "SEC1".to_string(),
        kind,
        name: Some("Test security".to_string()),
    }
}

fn txn(id: i64, count: i64, day: u32) -> Transaction {
    Transaction {
        id: Some(id),
        portfolio: "P1".to_string(),
        security: "SEC1".to_string(),
        count,
        timestamp: ts(day),
    }
}

fn deposit(count: i64, day: u32) -> Transaction {
    Transaction {
        id: None,
        portfolio: "P1".to_string(),
        security: "SEC1".to_string(),
        count,
        timestamp: ts(day),
    }
}

fn flow(transaction_id: i64, kind: CashFlowType, value: Decimal) -> TransactionCashFlow {
    TransactionCashFlow {
        transaction_id,
        kind,
        value,
        currency: "RUB".to_string(),
    }
}

fn event(kind: CashFlowType, value: Decimal, count: i64, day: u32, currency: &str) -> SecurityEventCashFlow {
    SecurityEventCashFlow {
        portfolio: "P1".to_string(),
        security: "SEC1".to_string(),
        timestamp: ts(day),
        kind,
        value,
        currency: currency.to_string(),
        count: Some(count),
    }
}

fn filter() -> PositionsFilter {
    PositionsFilter::all_portfolios(
        DateTime::<Utc>::UNIX_EPOCH,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    )
}

fn match_lots(transactions: Vec<Transaction>) -> FifoPositions {
    FifoPositions::match_lots(transactions.into(), VecDeque::new()).unwrap()
}

#[test]
fn test_commission_is_prorated_across_split_lots() {
    // One buy of 10 with a 10 RUB fee, split into lots of 4 and 6.
    let positions = match_lots(vec![txn(1, 10, 1), txn(2, -4, 2), txn(3, -6, 3)]);
    let flows = vec![
        flow(1, CashFlowType::Price, dec!(-1000)),
        flow(1, CashFlowType::Commission, dec!(-10)),
        flow(2, CashFlowType::Price, dec!(440)),
        flow(3, CashFlowType::Price, dec!(660)),
    ];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &PaidInterest::default())
        .unwrap();

    let commissions: Vec<Decimal> = rows
        .iter()
        .filter_map(|row| row.open_commission)
        .collect();
    assert_eq!(commissions, vec![dec!(4), dec!(6)]);
    assert_eq!(commissions.iter().sum::<Decimal>(), dec!(10));
}

#[test]
fn test_deposited_lot_sells_with_zero_result() {
    // Securities deposited (no price) and later sold for 5000: the open leg
    // inherits the sale price, so the lot shows no gain and no loss.
    let positions = match_lots(vec![deposit(10, 1), txn(2, -10, 10)]);
    let flows = vec![flow(2, CashFlowType::Price, dec!(5000))];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &PaidInterest::default())
        .unwrap();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.open_price, Some(dec!(500)));
    assert_eq!(row.open_amount, Some(dec!(5000)));
    assert_eq!(row.close_amount, Some(dec!(5000)));
    assert_eq!(row.forecast_tax, Some(Decimal::ZERO));
    assert_eq!(row.profit, Some(Decimal::ZERO));
}

#[test]
fn test_withdrawn_lot_closes_with_zero_result() {
    // Bought for 5000 and withdrawn from the account: the close leg
    // inherits the purchase amount.
    let positions = match_lots(vec![txn(1, 10, 1), deposit(-10, 10)]);
    let flows = vec![flow(1, CashFlowType::Price, dec!(-5000))];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &PaidInterest::default())
        .unwrap();

    let row = &rows[0];
    assert_eq!(row.close_amount, Some(dec!(5000)));
    assert_eq!(row.profit, Some(Decimal::ZERO));
}

#[test]
fn test_closed_lot_profit_and_forecast_tax() {
    // Buy 10 for 1000, sell for 1200, 10 fee each side.
    let positions = match_lots(vec![txn(1, 10, 1), txn(2, -10, 11)]);
    let flows = vec![
        flow(1, CashFlowType::Price, dec!(-1000)),
        flow(1, CashFlowType::Commission, dec!(-10)),
        flow(2, CashFlowType::Price, dec!(1200)),
        flow(2, CashFlowType::Commission, dec!(-10)),
    ];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &PaidInterest::default())
        .unwrap();

    let row = &rows[0];
    // 0.13 * (1200 - 1000 - 20)
    assert_eq!(row.forecast_tax, Some(dec!(23.4)));
    // 1200 - 1000 - 23.4 - 20
    assert_eq!(row.profit, Some(dec!(156.6)));

    // Annualized over the 10 days held: profit / outlay * 100 * 365 / 11.
    let annualization = dec!(36500) / dec!(11);
    let expected_yield = (dec!(156.6) / dec!(1010) * annualization)
        .round_dp_with_strategy(6, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    assert_eq!(row.yield_percent, Some(expected_yield));
}

#[test]
fn test_forecast_tax_is_never_negative() {
    // Sold at a loss: the taxable base is negative, the forecast is zero.
    let positions = match_lots(vec![txn(1, 10, 1), txn(2, -10, 11)]);
    let flows = vec![
        flow(1, CashFlowType::Price, dec!(-1000)),
        flow(2, CashFlowType::Price, dec!(900)),
    ];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &PaidInterest::default())
        .unwrap();
    assert_eq!(rows[0].forecast_tax, Some(Decimal::ZERO));
}

#[test]
fn test_forecast_tax_is_zero_at_break_even() {
    let positions = match_lots(vec![txn(1, 10, 1), txn(2, -10, 11)]);
    let flows = vec![
        flow(1, CashFlowType::Price, dec!(-1000)),
        flow(1, CashFlowType::Commission, dec!(-5)),
        flow(2, CashFlowType::Price, dec!(1010)),
        flow(2, CashFlowType::Commission, dec!(-5)),
    ];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &PaidInterest::default())
        .unwrap();
    assert_eq!(rows[0].forecast_tax, Some(Decimal::ZERO));
}

#[test]
fn test_foreign_dividend_creates_a_tax_liability() {
    // A dividend paid in USD with 5 withheld: 13% of 100 minus 5 is owed.
    let positions = match_lots(vec![txn(1, 10, 1)]);
    let dividend = event(CashFlowType::Dividend, dec!(100), 10, 15, "USD");
    let withheld = event(CashFlowType::Tax, dec!(-5), 10, 15, "USD");
    let paid = PaidInterestService::attribute(&[dividend, withheld], &positions, &filter());

    let index = TransactionCashFlowIndex::default();
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &paid)
        .unwrap();

    let row = &rows[0];
    assert_eq!(row.dividend, Some(dec!(100)));
    assert_eq!(row.tax, Some(dec!(5)));
    assert_eq!(row.tax_liability, Some(dec!(8)));
}

#[test]
fn test_domestic_income_has_no_tax_liability() {
    let positions = match_lots(vec![txn(1, 10, 1)]);
    let dividend = event(CashFlowType::Dividend, dec!(100), 10, 15, "RUB");
    let paid = PaidInterestService::attribute(&[dividend], &positions, &filter());

    let index = TransactionCashFlowIndex::default();
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &paid)
        .unwrap();
    assert_eq!(rows[0].tax_liability, None);
}

#[test]
fn test_fictitious_lot_gets_its_own_row() {
    let positions = match_lots(Vec::new());
    let dividend = event(CashFlowType::Dividend, dec!(50), 25, 15, "RUB");
    let paid = PaidInterestService::attribute(&[dividend], &positions, &filter());

    let index = TransactionCashFlowIndex::default();
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let rows = service
        .position_rows(&security(SecurityType::Stock), &positions, &paid)
        .unwrap();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.count, 25);
    assert_eq!(row.open_price, None);
    assert_eq!(row.dividend, Some(dec!(50)));
}

#[test]
fn test_summary_averages_use_open_lots_only() {
    // 10 bought at 100/unit, 5 sold; averages reflect the open remainder.
    let positions = match_lots(vec![txn(1, 10, 1), txn(2, -5, 10)]);
    let flows = vec![
        flow(1, CashFlowType::Price, dec!(-1000)),
        flow(1, CashFlowType::AccruedInterest, dec!(-20)),
        flow(2, CashFlowType::Price, dec!(550)),
    ];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let sec = security(SecurityType::Bond);
    let positions_rows = service
        .position_rows(&sec, &positions, &PaidInterest::default())
        .unwrap();
    let summary = service.summary(&sec, &positions, &positions_rows, &[], None, None);

    assert_eq!(summary.open_count, 5);
    // Half the 1000 cost and half the 20 accrued remain on 5 open units.
    assert_eq!(summary.average_price, Some(dec!(100)));
    assert_eq!(summary.average_accrued_interest, Some(dec!(2)));
    assert_eq!(summary.buy_count, 10);
    assert_eq!(summary.sell_count, 5);
}

#[test]
fn test_summary_gross_profit_for_open_position_needs_a_quote() {
    let positions = match_lots(vec![txn(1, 10, 1)]);
    let flows = vec![flow(1, CashFlowType::Price, dec!(-1000))];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let sec = security(SecurityType::Stock);
    let rows = service
        .position_rows(&sec, &positions, &PaidInterest::default())
        .unwrap();

    // Without a quote the quote-dependent fields stay empty.
    let summary = service.summary(&sec, &positions, &rows, &[], None, None);
    assert_eq!(summary.last_price, None);
    assert_eq!(summary.gross_profit, None);
    assert_eq!(summary.profit, None);

    // With a quote at 120/unit the open position gains (120 - 100) * 10.
    let quote = SecurityQuote {
        security: sec.id.clone(),
        timestamp: ts(20),
        quote: dec!(120),
        price: Some(dec!(120)),
        accrued_interest: None,
        currency: Some("RUB".to_string()),
    };
    let summary = service.summary(&sec, &positions, &rows, &[], Some(&quote), None);
    assert_eq!(summary.last_price, Some(dec!(120)));
    assert_eq!(summary.gross_profit, Some(dec!(200)));
    assert_eq!(summary.profit, Some(dec!(200)));
}

#[test]
fn test_summary_for_fully_closed_security_is_realized() {
    let positions = match_lots(vec![txn(1, 10, 1), txn(2, -10, 11)]);
    let flows = vec![
        flow(1, CashFlowType::Price, dec!(-1000)),
        flow(2, CashFlowType::Price, dec!(1200)),
    ];
    let index = TransactionCashFlowIndex::new(&flows);
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let sec = security(SecurityType::Stock);
    let rows = service
        .position_rows(&sec, &positions, &PaidInterest::default())
        .unwrap();
    let summary = service.summary(&sec, &positions, &rows, &[], None, None);

    assert_eq!(summary.open_count, 0);
    assert_eq!(summary.gross_profit, Some(dec!(200)));
    // Net of the forecast tax accumulated on the closed lot.
    assert_eq!(summary.forecast_tax, Some(dec!(26)));
    assert_eq!(summary.profit, Some(dec!(174)));
}

#[test]
fn test_derivative_gross_profit_is_the_margin_total() {
    let positions = match_lots(vec![txn(1, 2, 1), txn(2, -2, 5)]);
    let index = TransactionCashFlowIndex::default();
    let converter = CurrencyConverter::new(Vec::new());
    let tax = TaxConfig::default();
    let service = ProfitService::new(&index, &converter, &tax, "RUB");

    let sec = Security {
        id: "FUT1".to_string(),
        kind: SecurityType::Derivative,
        name: None,
    };
    let margin = vec![
        event(CashFlowType::DerivativeProfit, dec!(100), 0, 2, "RUB"),
        event(CashFlowType::DerivativeProfit, dec!(-40), 0, 3, "RUB"),
    ];
    let summary = service.summary(&sec, &positions, &[], &margin, None, None);

    assert_eq!(summary.gross_profit, Some(dec!(60)));
    assert_eq!(summary.profit, Some(dec!(60)));
}
