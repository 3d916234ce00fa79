/// Decimal precision for monetary calculations
pub const DECIMAL_PRECISION: u32 = 6;

/// Day-count basis for annualized yields and the XIRR denominator
pub const DAYS_PER_YEAR: i64 = 365;
