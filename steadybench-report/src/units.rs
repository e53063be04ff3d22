//! Time and count formatting

use crate::FormatError;

/// Unit names, from seconds down to nanoseconds
const TIMEDELTA_UNITS: [&str; 4] = ["sec", "ms", "us", "ns"];

/// Format durations in seconds with one shared unit
///
/// The unit and the number of decimals are chosen from the first value so
/// that it gets 3 significant digits: `1.50 ms`, `10.0 us`, `123 ns`.
pub fn format_timedeltas(values: &[f64]) -> Result<Vec<String>, FormatError> {
    if let Some(&negative) = values.iter().find(|&&v| v < 0.0) {
        return Err(FormatError::NegativeDuration(negative));
    }
    let Some(&reference) = values.first() else {
        return Ok(Vec::new());
    };

    let power = (-8..=2)
        .rev()
        .find(|&i| reference >= power_of_ten(i))
        .unwrap_or(-9);
    let precision = (2 - power.rem_euclid(3)) as usize;
    let k = if power < 0 {
        (-power.div_euclid(3)) as usize
    } else {
        0
    };
    let factor = 10f64.powi(3 * k as i32);
    let unit = TIMEDELTA_UNITS[k];

    Ok(values
        .iter()
        .map(|value| format!("{:.*} {}", precision, value * factor, unit))
        .collect())
}

fn power_of_ten(exponent: i32) -> f64 {
    if exponent >= 0 {
        10f64.powi(exponent)
    } else {
        1.0 / 10f64.powi(-exponent)
    }
}

/// Format a single duration in seconds
pub fn format_timedelta(seconds: f64) -> Result<String, FormatError> {
    let mut formatted = format_timedeltas(&[seconds])?;
    Ok(formatted.pop().unwrap_or_default())
}

/// Format a count with its unit, pluralized with a trailing `s`
///
/// Exact powers of ten from 10000 up are written as `10^k`.
pub fn format_number(number: u64, unit: &str) -> String {
    let text = match exact_power_of_ten(number) {
        Some(power) if number >= 10_000 => format!("10^{power}"),
        _ => number.to_string(),
    };
    if number > 1 {
        format!("{text} {unit}s")
    } else {
        format!("{text} {unit}")
    }
}

fn exact_power_of_ten(mut number: u64) -> Option<u32> {
    if number == 0 {
        return None;
    }
    let mut power = 0;
    while number % 10 == 0 {
        number /= 10;
        power += 1;
    }
    (number == 1).then_some(power)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timedelta_units() {
        assert_eq!(format_timedelta(1.5e-3).unwrap(), "1.50 ms");
        assert_eq!(format_timedelta(1e-5).unwrap(), "10.0 us");
        assert_eq!(format_timedelta(123e-9).unwrap(), "123 ns");
        assert_eq!(format_timedelta(2.5).unwrap(), "2.50 sec");
        assert_eq!(format_timedelta(150.0).unwrap(), "150 sec");
        assert_eq!(format_timedelta(0.0).unwrap(), "0.00 ns");
    }

    #[test]
    fn test_timedeltas_share_first_unit() {
        let formatted = format_timedeltas(&[1.5e-3, 2e-4, 0.01]).unwrap();
        assert_eq!(formatted, vec!["1.50 ms", "0.20 ms", "10.00 ms"]);
        assert!(format_timedeltas(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_negative_duration() {
        assert!(matches!(
            format_timedelta(-1.0),
            Err(FormatError::NegativeDuration(v)) if v == -1.0
        ));
        assert!(format_timedeltas(&[1.0, -0.5]).is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1, "loop"), "1 loop");
        assert_eq!(format_number(3, "loop"), "3 loops");
        assert_eq!(format_number(1000, "loop"), "1000 loops");
        assert_eq!(format_number(10_000, "loop"), "10^4 loops");
        assert_eq!(format_number(1_000_000, "loop"), "10^6 loops");
        assert_eq!(format_number(12_000, "loop"), "12000 loops");
        assert_eq!(format_number(0, "sample"), "0 sample");
    }
}
