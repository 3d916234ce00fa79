use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::CalculatorError;
use crate::transactions::{CashFlowType, Transaction};

/// An unmatched lot: the remainder of one opening transaction.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct OpenedPosition {
    pub open_transaction: Transaction,
    /// Unmatched units. Positive for a long position, negative for short.
    pub unclosed_count: i64,
}

impl OpenedPosition {
    pub fn new(open_transaction: Transaction) -> Self {
        let unclosed_count = open_transaction.count;
        Self {
            open_transaction,
            unclosed_count,
        }
    }

    pub fn with_count(open_transaction: Transaction, unclosed_count: i64) -> Self {
        Self {
            open_transaction,
            unclosed_count,
        }
    }

    /// Consumes `count` units of this lot. `count` carries the closing
    /// side's sign, so it must oppose the lot's sign and fit within the
    /// unmatched remainder.
    pub(crate) fn close(&mut self, count: i64) -> Result<(), CalculatorError> {
        if count == 0
            || count.signum() == self.unclosed_count.signum()
            || count.abs() > self.unclosed_count.abs()
        {
            return Err(CalculatorError::ExcessiveClose {
                transaction_id: self.open_transaction.id,
                available: self.unclosed_count,
                count,
            });
        }
        self.unclosed_count += count;
        Ok(())
    }

    pub fn was_opened_at(&self, instant: DateTime<Utc>) -> bool {
        self.open_transaction.timestamp < instant
    }

    pub fn was_opened_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        from < to && self.open_transaction.timestamp < to
    }
}

/// A matched lot: an opening transaction paired with the trade or corporate
/// event that closed (part of) it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPosition {
    pub open_transaction: Transaction,
    /// The closing trade, or a synthetic id-less transaction for a
    /// redemption.
    pub close_transaction: Transaction,
    /// Matched units, signed like the opening transaction.
    pub count: i64,
    /// `Price` for a market close, `Redemption` for a bond maturity.
    pub closing_event: CashFlowType,
}

impl ClosedPosition {
    pub fn new(
        open_transaction: Transaction,
        close_transaction: Transaction,
        count: i64,
        closing_event: CashFlowType,
    ) -> Result<Self, CalculatorError> {
        match closing_event {
            CashFlowType::Price | CashFlowType::Redemption => Ok(Self {
                open_transaction,
                close_transaction,
                count,
                closing_event,
            }),
            kind => Err(CalculatorError::UnsupportedClosingEvent {
                security: open_transaction.security.clone(),
                kind,
            }),
        }
    }

    pub fn is_long(&self) -> bool {
        self.open_transaction.count > 0
    }

    /// True while the lot was held: after its open and before its close.
    pub fn was_opened_at(&self, instant: DateTime<Utc>) -> bool {
        self.open_transaction.timestamp < instant && instant < self.close_transaction.timestamp
    }

    /// True when the lot's lifetime intersects the window.
    pub fn was_opened_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        from < to && self.open_transaction.timestamp < to && self.close_transaction.timestamp > from
    }
}

/// A lot in either state. `Eq + Hash` so income attribution can key a map
/// by the lot the income belongs to.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "positionType", rename_all = "camelCase")]
pub enum Position {
    Opened(OpenedPosition),
    Closed(ClosedPosition),
}

impl Position {
    /// Signed matched (closed) or unmatched (opened) unit count.
    pub fn count(&self) -> i64 {
        match self {
            Position::Opened(position) => position.unclosed_count,
            Position::Closed(position) => position.count,
        }
    }

    pub fn open_transaction(&self) -> &Transaction {
        match self {
            Position::Opened(position) => &position.open_transaction,
            Position::Closed(position) => &position.open_transaction,
        }
    }

    pub fn close_transaction(&self) -> Option<&Transaction> {
        match self {
            Position::Opened(_) => None,
            Position::Closed(position) => Some(&position.close_transaction),
        }
    }

    pub fn was_opened_at(&self, instant: DateTime<Utc>) -> bool {
        match self {
            Position::Opened(position) => position.was_opened_at(instant),
            Position::Closed(position) => position.was_opened_at(instant),
        }
    }

    pub fn was_opened_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        match self {
            Position::Opened(position) => position.was_opened_between(from, to),
            Position::Closed(position) => position.was_opened_between(from, to),
        }
    }
}

impl From<OpenedPosition> for Position {
    fn from(position: OpenedPosition) -> Self {
        Position::Opened(position)
    }
}

impl From<ClosedPosition> for Position {
    fn from(position: ClosedPosition) -> Self {
        Position::Closed(position)
    }
}

/// Running open-position count after one transaction was applied.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PositionHistory {
    pub transaction: Transaction,
    /// Signed open count across the security after this transaction.
    pub opened_count: i64,
}

impl PositionHistory {
    pub fn instant(&self) -> DateTime<Utc> {
        self.transaction.timestamp
    }
}
