use super::gateway::BillingError;

/// Amount string meaning "no interest or penalty".
pub const ZERO_AMOUNT: &str = "0,00";

/// Reads an amount into integer cents.
///
/// Comma is the decimal separator when present, with `.` allowed as thousands
/// grouping (`1.234,56`). Without a comma a single `.` is the decimal separator
/// (`100.00`), which is how the remote service reports invoice values.
/// Digits past the second decimal place are rounded half-up.
pub fn parse_cents(raw: &str) -> Result<i64, BillingError> {
    let invalid = || BillingError::InvalidAmount(raw.to_string());
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (integer, fraction) = if unsigned.contains(',') {
        let mut parts = unsigned.splitn(2, ',');
        let integer = parts.next().unwrap_or_default().replace('.', "");
        let fraction = parts.next().unwrap_or_default().to_string();
        (integer, fraction)
    } else {
        let mut parts = unsigned.splitn(2, '.');
        let integer = parts.next().unwrap_or_default().to_string();
        let fraction = parts.next().unwrap_or_default().to_string();
        (integer, fraction)
    };

    let all_digits = |value: &str| value.chars().all(|c| c.is_ascii_digit());
    if (integer.is_empty() && fraction.is_empty()) || !all_digits(&integer) || !all_digits(&fraction)
    {
        return Err(invalid());
    }

    let whole: i64 = if integer.is_empty() {
        0
    } else {
        integer.parse().map_err(|_| invalid())?
    };

    let digits: Vec<i64> = fraction
        .chars()
        .filter_map(|c| c.to_digit(10).map(i64::from))
        .collect();
    let tenths = digits.first().copied().unwrap_or(0);
    let hundredths = digits.get(1).copied().unwrap_or(0);
    let round_up = digits.get(2).map(|d| *d >= 5).unwrap_or(false);

    let cents = whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
        .ok_or_else(invalid)?;

    Ok(if negative { -cents } else { cents })
}

/// Formats cents as `N,CC` with no thousands grouping.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    format!("{sign}{},{:02}", magnitude / 100, magnitude % 100)
}

pub fn add_amounts(left: &str, right: &str) -> Result<String, BillingError> {
    Ok(format_cents(parse_cents(left)? + parse_cents(right)?))
}

/// True when the calculator reported an actual charge.
pub fn is_charged(amount: &str) -> bool {
    let trimmed = amount.trim();
    !trimmed.is_empty() && trimmed != ZERO_AMOUNT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_separator_styles() {
        assert_eq!(parse_cents("100.00").unwrap(), 10_000);
        assert_eq!(parse_cents("100,00").unwrap(), 10_000);
        assert_eq!(parse_cents("15,5").unwrap(), 1_550);
        assert_eq!(parse_cents("1.234,56").unwrap(), 123_456);
        assert_eq!(parse_cents("89").unwrap(), 8_900);
        assert_eq!(parse_cents(",99").unwrap(), 99);
    }

    #[test]
    fn rounds_extra_decimal_places() {
        assert_eq!(parse_cents("10,005").unwrap(), 1_001);
        assert_eq!(parse_cents("10,004").unwrap(), 1_000);
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "abc", "12,3,4", "1.2.3", "R$ 10,00"] {
            assert!(
                matches!(parse_cents(raw), Err(BillingError::InvalidAmount(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn sums_invoice_value_and_fine() {
        assert_eq!(add_amounts("100.00", "15,50").unwrap(), "115,50");
        assert_eq!(add_amounts("89,90", "2,37").unwrap(), "92,27");
        assert_eq!(add_amounts("0,00", "0,01").unwrap(), "0,01");
    }

    #[test]
    fn zero_and_blank_are_not_charges() {
        assert!(!is_charged("0,00"));
        assert!(!is_charged(""));
        assert!(is_charged("0,01"));
    }
}
