use log::error;
use std::collections::VecDeque;

use crate::errors::{CalculatorError, Result};
use crate::positions::{ClosedPosition, OpenedPosition, PositionHistory};
use crate::transactions::{CashFlowType, SecurityEventCashFlow, Transaction};

/// FIFO-matched lots of one security.
///
/// Consumes the security's transactions in chronological order (callers
/// guarantee ordering, ties broken by id) together with its redemption
/// events, and produces the opened and closed lot queues plus the running
/// position history. All output collections preserve transaction order.
#[derive(Debug, Clone)]
pub struct FifoPositions {
    transactions: VecDeque<Transaction>,
    redemptions: VecDeque<SecurityEventCashFlow>,
    position_histories: VecDeque<PositionHistory>,
    opened_positions: VecDeque<OpenedPosition>,
    closed_positions: VecDeque<ClosedPosition>,
    current_open_count: i64,
}

impl FifoPositions {
    /// Matches the transaction stream into lots.
    ///
    /// A redemption force-closes every remaining opened lot as of its
    /// timestamp. A bond redeems at most once; supplying more than one
    /// redemption event is a fatal consistency error.
    pub fn match_lots(
        transactions: VecDeque<Transaction>,
        redemptions: VecDeque<SecurityEventCashFlow>,
    ) -> Result<Self> {
        if redemptions.len() > 1 {
            let security = redemptions
                .front()
                .map(|r| r.security.clone())
                .unwrap_or_default();
            return Err(CalculatorError::MultipleRedemptions {
                security,
                found: redemptions.len(),
            }
            .into());
        }

        let mut position_histories = VecDeque::new();
        let mut opened_positions = VecDeque::new();
        let mut closed_positions = VecDeque::new();

        update_position_histories(transactions.iter(), &mut position_histories);
        process_transactions(&transactions, &mut opened_positions, &mut closed_positions)?;
        process_redemptions(
            &redemptions,
            &mut position_histories,
            &mut opened_positions,
            &mut closed_positions,
        )?;

        let current_open_count = position_histories
            .back()
            .map(|history| history.opened_count)
            .unwrap_or(0);

        Ok(Self {
            transactions,
            redemptions,
            position_histories,
            opened_positions,
            closed_positions,
            current_open_count,
        })
    }

    pub fn transactions(&self) -> &VecDeque<Transaction> {
        &self.transactions
    }

    pub fn redemptions(&self) -> &VecDeque<SecurityEventCashFlow> {
        &self.redemptions
    }

    /// Running open count after each transaction, in transaction order.
    pub fn position_histories(&self) -> &VecDeque<PositionHistory> {
        &self.position_histories
    }

    pub fn opened_positions(&self) -> &VecDeque<OpenedPosition> {
        &self.opened_positions
    }

    pub fn closed_positions(&self) -> &VecDeque<ClosedPosition> {
        &self.closed_positions
    }

    /// Signed open count after the last transaction or redemption.
    pub fn current_open_count(&self) -> i64 {
        self.current_open_count
    }
}

fn process_transactions(
    transactions: &VecDeque<Transaction>,
    opened_positions: &mut VecDeque<OpenedPosition>,
    closed_positions: &mut VecDeque<ClosedPosition>,
) -> Result<()> {
    for transaction in transactions {
        if is_increase_position(transaction, opened_positions) {
            opened_positions.push_back(OpenedPosition::new(transaction.clone()));
        } else {
            close_positions(
                transaction,
                CashFlowType::Price,
                opened_positions,
                closed_positions,
            )?;
        }
    }
    Ok(())
}

fn process_redemptions(
    redemptions: &VecDeque<SecurityEventCashFlow>,
    position_histories: &mut VecDeque<PositionHistory>,
    opened_positions: &mut VecDeque<OpenedPosition>,
    closed_positions: &mut VecDeque<ClosedPosition>,
) -> Result<()> {
    let Some(redemption) = redemptions.front() else {
        return Ok(());
    };

    let redemption_transaction = convert_redemption_to_transaction(redemption)?;
    update_position_histories(
        std::iter::once(&redemption_transaction),
        position_histories,
    );
    close_positions(
        &redemption_transaction,
        CashFlowType::Redemption,
        opened_positions,
        closed_positions,
    )?;

    let remaining = position_histories
        .back()
        .map(|history| history.opened_count)
        .unwrap_or(0);
    if !opened_positions.is_empty() || remaining != 0 {
        error!(
            "Transaction history for security {} is incomplete: redemption of {} units left {} positions open",
            redemption.security,
            redemption.count.unwrap_or(0),
            remaining
        );
    }
    Ok(())
}

fn update_position_histories<'a>(
    transactions: impl Iterator<Item = &'a Transaction>,
    position_histories: &mut VecDeque<PositionHistory>,
) {
    let mut opened_count = position_histories
        .back()
        .map(|history| history.opened_count)
        .unwrap_or(0);
    for transaction in transactions {
        opened_count += transaction.count;
        position_histories.push_back(PositionHistory {
            transaction: transaction.clone(),
            opened_count,
        });
    }
}

fn is_increase_position(
    transaction: &Transaction,
    opened_positions: &VecDeque<OpenedPosition>,
) -> bool {
    match opened_positions.front() {
        None => true,
        Some(position) => {
            position.unclosed_count == 0
                || transaction.count.signum() == position.unclosed_count.signum()
        }
    }
}

/// Consumes opened lots oldest-first with a position-decreasing transaction.
/// Any unconsumed remainder flips into a new lot on the opposite side.
fn close_positions(
    closing: &Transaction,
    closing_event: CashFlowType,
    opened_positions: &mut VecDeque<OpenedPosition>,
    closed_positions: &mut VecDeque<ClosedPosition>,
) -> Result<()> {
    let mut closing_count = closing.count.abs();
    while closing_count > 0 {
        let Some(front) = opened_positions.front_mut() else {
            break;
        };
        let opened_count = front.unclosed_count.abs();
        let shard_sign = front.unclosed_count.signum();
        let open_transaction = front.open_transaction.clone();
        let matched = opened_count.min(closing_count);

        if opened_count <= closing_count {
            opened_positions.pop_front();
        } else {
            front.close(matched * closing.count.signum())?;
        }

        closed_positions.push_back(ClosedPosition::new(
            open_transaction,
            closing.clone(),
            matched * shard_sign,
            closing_event,
        )?);
        closing_count -= matched;
    }

    if closing_count != 0 {
        opened_positions.push_back(OpenedPosition::with_count(
            closing.clone(),
            closing.count.signum() * closing_count,
        ));
    }
    Ok(())
}

/// A bond redemption is not a trade; model it as a synthetic id-less
/// transaction closing the redeemed units.
fn convert_redemption_to_transaction(redemption: &SecurityEventCashFlow) -> Result<Transaction> {
    if redemption.kind != CashFlowType::Redemption {
        return Err(CalculatorError::InvalidTransaction(format!(
            "expected a redemption event for security {}, got {:?}",
            redemption.security, redemption.kind
        ))
        .into());
    }
    let count = redemption.count.ok_or_else(|| {
        CalculatorError::InvalidTransaction(format!(
            "redemption event for security {} carries no redeemed unit count",
            redemption.security
        ))
    })?;
    Ok(Transaction {
        id: None,
        portfolio: redemption.portfolio.clone(),
        security: redemption.security.clone(),
        count: -count,
        timestamp: redemption.timestamp,
    })
}
