/// Formats cents as `1234.56`, optionally suffixed with a currency symbol.
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    let whole = abs / 100;
    let frac = abs % 100;
    if currency.is_empty() {
        format!("{sign}{whole}.{frac:02}")
    } else {
        format!("{sign}{whole}.{frac:02} {currency}")
    }
}

/// Accepts `12`, `12.5`, `12,50`. Negative or over-precise amounts are rejected.
pub fn parse_amount_to_cents(input: &str) -> Option<i64> {
    let s = input.trim().replace(',', ".");
    let mut parts = s.split('.');
    let whole_str = parts.next()?;
    let frac_str = parts.next();
    if parts.next().is_some() || !is_digits(whole_str) || !frac_str.is_none_or(is_digits) {
        return None;
    }
    let whole: i64 = whole_str.parse().ok()?;
    let frac = match frac_str {
        None => 0,
        Some(frac) => {
            if frac.is_empty() || frac.len() > 2 {
                return None;
            }
            let padded = format!("{frac:0<2}");
            padded.parse::<i64>().ok()?
        }
    };
    whole.checked_mul(100)?.checked_add(frac)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Share of `part` in `whole`, clamped to 0..=100.
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 100.0).clamp(0.0, 100.0)
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents_with_and_without_currency() {
        assert_eq!(format_money(123_456, ""), "1234.56");
        assert_eq!(format_money(-5, ""), "-0.05");
        assert_eq!(format_money(200_000, "EUR"), "2000.00 EUR");
    }

    #[test]
    fn parses_user_amounts() {
        assert_eq!(parse_amount_to_cents("12"), Some(1200));
        assert_eq!(parse_amount_to_cents(" 12.5 "), Some(1250));
        assert_eq!(parse_amount_to_cents("12,05"), Some(1205));
        assert_eq!(parse_amount_to_cents("-3"), None);
        assert_eq!(parse_amount_to_cents("1.234"), None);
        assert_eq!(parse_amount_to_cents("1.2.3"), None);
        assert_eq!(parse_amount_to_cents("abc"), None);
        assert_eq!(parse_amount_to_cents(""), None);
        assert_eq!(parse_amount_to_cents("1.-5"), None);
        assert_eq!(parse_amount_to_cents("10.+5"), None);
        assert_eq!(parse_amount_to_cents("+7"), None);
        assert_eq!(parse_amount_to_cents("12."), None);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(format_percent(percent(300_000, 500_000)), "60.0%");
        assert_eq!(percent(7, 0), 0.0);
        assert_eq!(percent(900, 100), 100.0);
    }
}
