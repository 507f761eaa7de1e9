//! Display formatting for percentages and item counts.
//!
//! Percentages are rounded to one decimal place, half away from zero, and a
//! trailing `.0` is dropped. Counts go through [`count_to_string`] and are
//! never rounded.

use crate::error::{CovdeltaError, Result};

/// Round to one decimal place, half away from zero. Negative zero is
/// normalized to `0.0`.
#[must_use]
pub fn round_one_decimal(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Format a percentage (or percentage-point delta) for display.
///
/// `1.151 → "1.2"`, `1.0 → "1"`, `0.1 → "0.1"`, `-1.15 → "-1.2"`,
/// `-0.01 → "0"`. Non-finite values are rejected.
pub fn decimal_to_string(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(CovdeltaError::NonFinite(value));
    }
    let rounded = round_one_decimal(value);
    let s = format!("{rounded:.1}");
    Ok(match s.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => s,
    })
}

/// Format an item count with thousands separators, e.g. `1234 → "1,234"`.
#[must_use]
pub fn count_to_string(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_single_decimal() {
        assert_eq!(decimal_to_string(1.151).unwrap(), "1.2");
        assert_eq!(decimal_to_string(82.123).unwrap(), "82.1");
        assert_eq!(decimal_to_string(3.45).unwrap(), "3.5");
    }

    #[test]
    fn test_strip_trailing_zero() {
        assert_eq!(decimal_to_string(1.0).unwrap(), "1");
        assert_eq!(decimal_to_string(100.0).unwrap(), "100");
        assert_eq!(decimal_to_string(0.96).unwrap(), "1");
    }

    #[test]
    fn test_include_leading_zero() {
        assert_eq!(decimal_to_string(0.1).unwrap(), "0.1");
        assert_eq!(decimal_to_string(-0.5).unwrap(), "-0.5");
    }

    #[test]
    fn test_rounding_negative_numbers() {
        assert_eq!(decimal_to_string(-1.15).unwrap(), "-1.2");
        assert_eq!(decimal_to_string(-12.15).unwrap(), "-12.2");
        assert_eq!(decimal_to_string(-2.123).unwrap(), "-2.1");
    }

    #[test]
    fn test_zero_and_negative_zero() {
        assert_eq!(decimal_to_string(0.0).unwrap(), "0");
        assert_eq!(decimal_to_string(-0.0).unwrap(), "0");
        assert_eq!(decimal_to_string(-0.04).unwrap(), "0");
        assert_eq!(decimal_to_string(0.01).unwrap(), "0");
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            decimal_to_string(f64::NAN),
            Err(CovdeltaError::NonFinite(_))
        ));
        assert!(decimal_to_string(f64::INFINITY).is_err());
        assert!(decimal_to_string(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_count_to_string() {
        assert_eq!(count_to_string(0), "0");
        assert_eq!(count_to_string(999), "999");
        assert_eq!(count_to_string(1234), "1,234");
        assert_eq!(count_to_string(1_000_000), "1,000,000");
        assert_eq!(count_to_string(12_345_678), "12,345,678");
    }
}
