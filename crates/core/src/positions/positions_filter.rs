use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Report window and portfolio scope, passed explicitly to every engine
/// call. An empty portfolio set selects all portfolios. Pure value, never
/// mutated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PositionsFilter {
    pub portfolios: Vec<String>,
    /// Inclusive window start.
    pub from: DateTime<Utc>,
    /// Exclusive window end.
    pub to: DateTime<Utc>,
}

impl PositionsFilter {
    pub fn new(portfolios: Vec<String>, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            portfolios,
            from,
            to,
        }
    }

    pub fn all_portfolios(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), from, to)
    }

    /// Same scope with the window opened at the epoch. Income attribution
    /// walks the entire position history up to the report end, not just the
    /// report window.
    pub fn entire_history(&self) -> Self {
        Self {
            portfolios: self.portfolios.clone(),
            from: DateTime::<Utc>::UNIX_EPOCH,
            to: self.to,
        }
    }

    pub fn matches_portfolio(&self, portfolio: &str) -> bool {
        self.portfolios.is_empty() || self.portfolios.iter().any(|p| p == portfolio)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from <= timestamp && timestamp < self.to
    }
}
