//! Decimal rounding for reported statistics.

/// Round to `digits` decimals, ties to even on the decimal representation.
///
/// Formatting with a fixed precision yields the correctly rounded decimal of
/// the binary value, which is what the reported tables expect (`2.675` stays
/// `2.67` because its binary value is below the tie).
pub fn round_to(value: f64, digits: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", digits, value).parse().unwrap_or(value)
}

/// Round to the nearest integer, ties to even.
pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Render a float the shortest way that reads back to the same value.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_two_decimals() {
        assert_eq!(round_to(2.0 / 3.0 * 100.0, 2), 66.67);
        assert_eq!(round_to(50.0, 2), 50.0);
        assert_eq!(round_to(1.005, 2), 1.0);
        assert_eq!(round_to(12.345678, 1), 12.3);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(3.5), 4);
        assert_eq!(round_half_even(-1.5), -2);
        assert_eq!(round_half_even(7.49), 7);
    }

    #[test]
    fn test_format_float_keeps_fraction() {
        assert_eq!(format_float(50.0), "50.0");
        assert_eq!(format_float(66.67), "66.67");
        assert_eq!(format_float(0.1), "0.1");
    }
}
