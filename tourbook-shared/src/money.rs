//! Amounts are carried in major units (Naira) as `f64`, the way the catalog
//! stores prices. Conversion to the provider's minor unit happens once, at
//! payment time.

pub const DEFAULT_CURRENCY: &str = "NGN";

/// Minor units per major unit (kobo per Naira).
pub const MINOR_PER_MAJOR: f64 = 100.0;

/// Convert a major-unit total to the provider's minor unit.
///
/// Rounds half away from zero on the decimal value. The scaled amount is
/// snapped to a millionth of a minor unit first so that binary artefacts such
/// as `19.995 * 100 == 1999.4999999999998` round as written.
pub fn to_minor_units(total: f64) -> i64 {
    let scaled = total * MINOR_PER_MAJOR;
    let snapped = (scaled * 1e6).round() / 1e6;
    snapped.round() as i64
}

/// Render an amount the way the storefront shows it, e.g. `₦100,000` or
/// `₦1,234.5`. Up to three fraction digits, trailing zeros dropped.
pub fn format_naira(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let thousandths = (amount.abs() * 1000.0).round() as u64;
    let whole = thousandths / 1000;
    let fraction = thousandths % 1000;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if fraction == 0 {
        format!("{}₦{}", sign, grouped)
    } else {
        let fraction = format!("{:03}", fraction);
        format!("{}₦{}.{}", sign, grouped, fraction.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_whole_amounts() {
        assert_eq!(to_minor_units(100_000.0), 10_000_000);
        assert_eq!(to_minor_units(0.0), 0);
        assert_eq!(to_minor_units(1.0), 100);
    }

    #[test]
    fn test_minor_units_half_rounds_up() {
        assert_eq!(to_minor_units(19.995), 2000);
        assert_eq!(to_minor_units(0.005), 1);
        assert_eq!(to_minor_units(12.344), 1234);
    }

    #[test]
    fn test_format_naira() {
        assert_eq!(format_naira(100_000.0), "₦100,000");
        assert_eq!(format_naira(50_000.0), "₦50,000");
        assert_eq!(format_naira(999.0), "₦999");
        assert_eq!(format_naira(1_234.5), "₦1,234.5");
        assert_eq!(format_naira(1_000_000.25), "₦1,000,000.25");
        assert_eq!(format_naira(0.0), "₦0");
    }
}
