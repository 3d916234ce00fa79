use log::error;
use rayon::prelude::*;
use std::collections::VecDeque;

use crate::derivatives::{DerivativeEvents, DerivativeEventsService};
use crate::errors::{Error, Result};
use crate::fx::{CurrencyConverter, ExchangeRate};
use crate::interest::PaidInterestService;
use crate::performance::IrrService;
use crate::positions::{FifoPositions, PositionsFilter};
use crate::profit::{PositionProfitRow, ProfitService, SecurityProfitSummary, TaxConfig};
use crate::report::{PortfolioProfitReport, ReportInput};
use crate::securities::{Security, SecurityQuote, SecurityType};
use crate::transactions::{
    CashFlowType, SecurityEventCashFlow, Transaction, TransactionCashFlowIndex,
};

type SecurityResult = (
    SecurityProfitSummary,
    Vec<PositionProfitRow>,
    Option<DerivativeEvents>,
);

/// Runs the engine for every security in the input.
///
/// Securities are independent of each other, so they are computed in
/// parallel; within one security the transaction order is a hard sequential
/// dependency. A failure in one security is logged and isolated to that
/// security's row; only a malformed filter aborts the whole run.
pub struct ReportService;

impl ReportService {
    pub fn generate(
        input: &ReportInput,
        filter: &PositionsFilter,
        to_currency: &str,
        tax: &TaxConfig,
    ) -> Result<PortfolioProfitReport> {
        if filter.from > filter.to {
            return Err(Error::Validation(format!(
                "filter window start {} is after its end {}",
                filter.from, filter.to
            )));
        }

        let converter = CurrencyConverter::new(input.exchange_rates.clone());
        let index = TransactionCashFlowIndex::new(&input.transaction_cash_flows);

        let results: Vec<SecurityResult> = input
            .securities
            .par_iter()
            .map(|security| {
                Self::compute_security(security, input, filter, &converter, &index, to_currency, tax)
                    .unwrap_or_else(|e| {
                        error!(
                            "Profit computation failed for security {} (portfolios {:?}, window {}..{}): {}",
                            security.id, filter.portfolios, filter.from, filter.to, e
                        );
                        let mut summary = SecurityProfitSummary::empty(security);
                        summary.error = Some(e.to_string());
                        (summary, Vec::new(), None)
                    })
            })
            .collect();

        let mut report = PortfolioProfitReport::default();
        for (summary, rows, ledger) in results {
            if let Some(ledger) = ledger {
                report.derivative_ledgers.insert(summary.security.clone(), ledger);
            }
            if !rows.is_empty() {
                report.position_rows.insert(summary.security.clone(), rows);
            }
            report.summaries.push(summary);
        }
        Ok(report)
    }

    fn compute_security(
        security: &Security,
        input: &ReportInput,
        filter: &PositionsFilter,
        converter: &CurrencyConverter,
        index: &TransactionCashFlowIndex,
        to_currency: &str,
        tax: &TaxConfig,
    ) -> Result<SecurityResult> {
        let full_filter = filter.entire_history();
        let window_transactions = Self::security_transactions(input, &security.id, filter);
        let events = Self::security_events(input, &security.id, filter);

        let profit_service = ProfitService::new(index, converter, tax, to_currency);

        if security.kind == SecurityType::Derivative {
            let settlements: Vec<SecurityEventCashFlow> = events
                .iter()
                .filter(|event| event.kind == CashFlowType::DerivativeProfit)
                .cloned()
                .collect();
            let ledger =
                DerivativeEventsService::accumulate(&window_transactions, &settlements, index);
            let positions =
                FifoPositions::match_lots(window_transactions.into(), VecDeque::new())?;
            let summary = profit_service.summary(security, &positions, &[], &events, None, None);
            return Ok((summary, Vec::new(), Some(ledger)));
        }

        let window_redemptions: VecDeque<SecurityEventCashFlow> = events
            .iter()
            .filter(|event| event.kind == CashFlowType::Redemption)
            .cloned()
            .collect();
        let full_events = Self::security_events(input, &security.id, &full_filter);
        let full_redemptions: VecDeque<SecurityEventCashFlow> = full_events
            .iter()
            .filter(|event| event.kind == CashFlowType::Redemption)
            .cloned()
            .collect();

        let positions =
            FifoPositions::match_lots(window_transactions.into(), window_redemptions)?;
        let full_transactions = Self::security_transactions(input, &security.id, &full_filter);
        let full_positions =
            FifoPositions::match_lots(full_transactions.into(), full_redemptions)?;

        let paid_interest = PaidInterestService::attribute(&events, &full_positions, filter);
        let rows = profit_service.position_rows(security, &positions, &paid_interest)?;
        let quote = Self::quote_for(security, input, converter, filter);
        let irr = IrrService::calc(
            security,
            &positions,
            index,
            &events,
            quote.as_ref(),
            converter,
            filter,
        );
        let summary =
            profit_service.summary(security, &positions, &rows, &events, quote.as_ref(), irr);
        Ok((summary, rows, None))
    }

    /// The security's transactions inside the filter, ordered by timestamp
    /// with ties broken by id. This is where the matcher's ordering
    /// guarantee is established.
    fn security_transactions(
        input: &ReportInput,
        security: &str,
        filter: &PositionsFilter,
    ) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = input
            .transactions
            .iter()
            .filter(|t| {
                t.security == security
                    && filter.matches_portfolio(&t.portfolio)
                    && filter.contains(t.timestamp)
            })
            .cloned()
            .collect();
        transactions.sort_by_key(|t| (t.timestamp, t.id));
        transactions
    }

    fn security_events(
        input: &ReportInput,
        security: &str,
        filter: &PositionsFilter,
    ) -> Vec<SecurityEventCashFlow> {
        let mut events: Vec<SecurityEventCashFlow> = input
            .security_events
            .iter()
            .filter(|event| {
                event.security == security
                    && filter.matches_portfolio(&event.portfolio)
                    && filter.contains(event.timestamp)
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.timestamp);
        events
    }

    /// The security's current quote. A currency pair without a market quote
    /// falls back to the exchange-rate table at the window end.
    fn quote_for(
        security: &Security,
        input: &ReportInput,
        converter: &CurrencyConverter,
        filter: &PositionsFilter,
    ) -> Option<SecurityQuote> {
        if let Some(quote) = input.quotes.get(&security.id) {
            return Some(quote.clone());
        }
        if security.kind != SecurityType::CurrencyPair {
            return None;
        }
        let (base, quote_currency) = ExchangeRate::parse_pair(&security.id)?;
        let rate = converter
            .get_rate(&base, &quote_currency, filter.to.date_naive())
            .ok()?;
        Some(SecurityQuote {
            security: security.id.clone(),
            timestamp: filter.to,
            quote: rate,
            price: Some(rate),
            accrued_interest: None,
            currency: Some(quote_currency),
        })
    }
}
