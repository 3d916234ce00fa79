//! XIRR: the rate that zeroes the net present value of a dated cash-flow
//! series, reported annualized in percent.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::constants::DAYS_PER_YEAR;

/// A dated portfolio cash flow: negative for money invested, positive for
/// money received (including a terminal valuation of an open position).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: f64,
}

const MAX_ITERATIONS: u32 = 100;
const INITIAL_GUESS: f64 = 0.1;
/// Rates at or below -100% are meaningless; the search stops just above.
const MIN_RATE: f64 = -0.999_999;
const MAX_RATE: f64 = 1e6;
/// Allowed divergent Newton steps before handing over to bisection.
const MAX_DIVERGENCE: u32 = 3;

/// Solves for the annualized money-weighted rate of return, in percent.
///
/// Same-day amounts are summed before solving to keep the day-count
/// denominator regular. Returns `None` when the rate is undefined: fewer
/// than two distinct flow dates, flows all of one sign, or a series neither
/// Newton-Raphson nor the bisection fallback converges on.
pub fn xirr(cash_flows: &[CashFlow]) -> Option<f64> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for flow in cash_flows {
        *by_date.entry(flow.date).or_insert(0.0) += flow.amount;
    }
    by_date.retain(|_, amount| *amount != 0.0);
    if by_date.len() < 2 {
        return None;
    }
    let has_negative = by_date.values().any(|amount| *amount < 0.0);
    let has_positive = by_date.values().any(|amount| *amount > 0.0);
    if !has_negative || !has_positive {
        return None;
    }

    let start = *by_date.keys().next()?;
    let flows: Vec<(f64, f64)> = by_date
        .iter()
        .map(|(date, amount)| {
            (
                (*date - start).num_days() as f64 / DAYS_PER_YEAR as f64,
                *amount,
            )
        })
        .collect();

    // Tolerance in currency units, scaled to the series.
    let tolerance = 1e-6
        * flows
            .iter()
            .map(|(_, amount)| amount.abs())
            .fold(1.0, f64::max);

    let npv = |rate: f64| {
        flows
            .iter()
            .map(|(years, amount)| amount / (1.0 + rate).powf(*years))
            .sum::<f64>()
    };
    let npv_derivative = |rate: f64| {
        flows
            .iter()
            .map(|(years, amount)| -years * amount / (1.0 + rate).powf(years + 1.0))
            .sum::<f64>()
    };

    newton(&npv, &npv_derivative, tolerance)
        .or_else(|| bisection(&npv, tolerance))
        .map(|rate| 100.0 * rate)
}

/// Newton-Raphson with divergence monitoring: fails fast on repeated
/// residual growth, zero derivatives or rates escaping the valid range, so
/// the bracketing fallback can take over.
fn newton(f: &impl Fn(f64) -> f64, df: &impl Fn(f64) -> f64, tolerance: f64) -> Option<f64> {
    let mut x = INITIAL_GUESS;
    let mut prev_residual = f64::MAX;
    let mut divergence_count = 0u32;

    for _ in 0..MAX_ITERATIONS {
        let fx = f(x);
        let residual = fx.abs();
        if residual < tolerance {
            return Some(x);
        }

        if residual > prev_residual * 2.0 {
            divergence_count += 1;
            if divergence_count >= MAX_DIVERGENCE {
                return None;
            }
        } else {
            divergence_count = 0;
        }
        prev_residual = residual;

        let dfx = df(x);
        if dfx.abs() < 1e-15 {
            return None;
        }

        let step = fx / dfx;
        x -= step;
        if !x.is_finite() || x <= MIN_RATE || x > MAX_RATE {
            return None;
        }
        if step.abs() < 1e-10 {
            return (f(x).abs() < tolerance).then_some(x);
        }
    }
    None
}

/// Bisection over an exponentially expanded bracket.
fn bisection(f: &impl Fn(f64) -> f64, tolerance: f64) -> Option<f64> {
    let (mut low, mut high) = bracket(f)?;
    let mut f_low = f(low);

    for _ in 0..200 {
        let mid = (low + high) / 2.0;
        let f_mid = f(mid);
        if f_mid.abs() < tolerance || (high - low) < 1e-10 {
            return Some(mid);
        }
        if f_low * f_mid < 0.0 {
            high = mid;
        } else {
            low = mid;
            f_low = f_mid;
        }
    }
    None
}

/// Finds a sign change of the NPV between the minimum rate and an
/// exponentially growing upper bound.
fn bracket(f: &impl Fn(f64) -> f64) -> Option<(f64, f64)> {
    let f_min = f(MIN_RATE);
    if f_min == 0.0 {
        return Some((MIN_RATE, MIN_RATE));
    }
    let mut high = 1.0;
    while high <= MAX_RATE {
        if f(high) * f_min < 0.0 {
            return Some((MIN_RATE, high));
        }
        high *= 2.0;
    }
    None
}
