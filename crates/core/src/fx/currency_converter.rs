use chrono::NaiveDate;
use dashmap::DashMap;
use log::warn;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::fx::{ExchangeRate, FxError};

/// A calculator for currency conversions over a daily exchange-rate table.
///
/// Rates are stored as independent time series per pair; conversion paths
/// are found on demand with a breadth-first search, so cross rates work
/// through any connected intermediate currency. Date lookups support exact
/// matching and "nearest neighbor" (past or future).
///
/// Resolved unit rates are memoized per (from, to, date) key. The cache is
/// write-once-per-key and idempotent, so the converter is safe to share
/// read-only across parallel per-security computations.
pub struct CurrencyConverter {
    /// Graph adjacency list: currency -> set of connected currencies.
    adj: HashMap<String, HashSet<String>>,

    /// Rate data: (from, to) -> date -> rate.
    /// BTreeMap gives O(log n) nearest-date lookups.
    rates: HashMap<(String, String), BTreeMap<NaiveDate, Decimal>>,

    /// Unit rates resolved during this run.
    resolved: DashMap<(String, String, NaiveDate), Decimal>,
}

impl CurrencyConverter {
    /// Creates a converter from daily rate observations.
    /// Inverse rates and graph connectivity are derived automatically.
    pub fn new(exchange_rates: Vec<ExchangeRate>) -> Self {
        let mut converter = CurrencyConverter {
            adj: HashMap::new(),
            rates: HashMap::new(),
            resolved: DashMap::new(),
        };
        converter.add_historical_rates(exchange_rates);
        converter
    }

    /// Adds historical FX rates, O(1) per rate.
    pub fn add_historical_rates(&mut self, rates: Vec<ExchangeRate>) {
        for rate in rates {
            if rate.from_currency == rate.to_currency {
                continue;
            }

            let date = rate.timestamp.date_naive();
            let forward_pair = (rate.from_currency.clone(), rate.to_currency.clone());
            let inverse_pair = (rate.to_currency.clone(), rate.from_currency.clone());
            let forward_rate = rate.rate;

            self.rates
                .entry(forward_pair)
                .or_default()
                .insert(date, forward_rate);

            self.adj
                .entry(rate.from_currency.clone())
                .or_default()
                .insert(rate.to_currency.clone());

            if !forward_rate.is_zero() {
                let inverse_rate = Decimal::ONE / forward_rate;
                self.rates
                    .entry(inverse_pair)
                    .or_default()
                    .insert(date, inverse_rate);

                self.adj
                    .entry(rate.to_currency)
                    .or_default()
                    .insert(rate.from_currency);
            }
        }
    }

    /// Finds the direct rate between two connected currencies: the closest
    /// observation on or before the date, or the closest one after it,
    /// whichever is fewer days away.
    fn get_direct_rate(&self, from: &str, to: &str, date: NaiveDate) -> Option<Decimal> {
        let key = (from.to_string(), to.to_string());
        let history = self.rates.get(&key)?;

        let prev = history.range(..=date).next_back();
        let next = history.range(date..).next();

        match (prev, next) {
            (Some((d1, r1)), Some((d2, r2))) => {
                if d1 == d2 {
                    return Some(*r1);
                }
                let dist_prev = (date - *d1).num_days().abs();
                let dist_next = (*d2 - date).num_days().abs();
                if dist_prev <= dist_next {
                    Some(*r1)
                } else {
                    Some(*r2)
                }
            }
            (Some((_, r)), None) => Some(*r),
            (None, Some((_, r))) => Some(*r),
            (None, None) => None,
        }
    }

    /// Unit rate from one currency to another as of the given date.
    pub fn get_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
        date: NaiveDate,
    ) -> Result<Decimal, FxError> {
        if from_currency == to_currency {
            return Ok(Decimal::ONE);
        }

        let key = (
            from_currency.to_string(),
            to_currency.to_string(),
            date,
        );
        if let Some(rate) = self.resolved.get(&key) {
            return Ok(*rate);
        }

        let rate = self.find_rate(from_currency, to_currency, date)?;
        self.resolved.entry(key).or_insert(rate);
        Ok(rate)
    }

    /// Breadth-first search for the shortest conversion path, using
    /// `get_direct_rate` to validate each edge.
    fn find_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
        date: NaiveDate,
    ) -> Result<Decimal, FxError> {
        let mut queue: VecDeque<(String, Decimal)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((from_currency.to_string(), Decimal::ONE));
        visited.insert(from_currency.to_string());

        while let Some((current_curr, current_rate)) = queue.pop_front() {
            if current_curr == to_currency {
                return Ok(current_rate);
            }

            if let Some(neighbors) = self.adj.get(&current_curr) {
                for neighbor in neighbors {
                    if !visited.contains(neighbor) {
                        if let Some(rate) = self.get_direct_rate(&current_curr, neighbor, date) {
                            visited.insert(neighbor.clone());
                            queue.push_back((neighbor.clone(), current_rate * rate));
                        }
                    }
                }
            }
        }

        Err(FxError::RateNotFound(format!(
            "No conversion path found for {} -> {} on or near {}",
            from_currency, to_currency, date
        )))
    }

    /// Converts an amount between currencies at the given date. Identity
    /// when the currencies match, exactly and without rounding.
    pub fn convert(
        &self,
        amount: Decimal,
        from_currency: &str,
        to_currency: &str,
        date: NaiveDate,
    ) -> Result<Decimal, FxError> {
        if from_currency == to_currency {
            return Ok(amount);
        }
        Ok(amount * self.get_rate(from_currency, to_currency, date)?)
    }

    /// Converts an amount, falling back to the unconverted value when no
    /// rate is known. The fallback is reported, not silent.
    pub fn convert_or_identity(
        &self,
        amount: Decimal,
        from_currency: &str,
        to_currency: &str,
        date: NaiveDate,
    ) -> Decimal {
        match self.convert(amount, from_currency, to_currency, date) {
            Ok(converted) => converted,
            Err(e) => {
                warn!(
                    "{}, using the unconverted {} amount",
                    e, from_currency
                );
                amount
            }
        }
    }
}
