/// Parses a consumption value written with either `.` or `,` as the decimal
/// separator.
///
/// Every comma becomes a period before parsing, so thousands separators are
/// not supported and make the value invalid. Surrounding whitespace is
/// ignored. Text tokens such as `erreur`, `N/A` or `null` yield `None`, and so
/// does `NaN`, which no range check could otherwise classify.
pub fn parse_value(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_decimal_separator() {
        assert_eq!(parse_value("12,5"), Some(12.5));
        assert_eq!(parse_value("0,07"), Some(0.07));
    }

    #[test]
    fn period_decimal_separator() {
        assert_eq!(parse_value("12.50"), Some(12.5));
        assert_eq!(parse_value("10000.00"), Some(10000.0));
        assert_eq!(parse_value("-3.20"), Some(-3.2));
    }

    #[test]
    fn whitespace_is_ignored() {
        assert_eq!(parse_value(" 7,25 "), Some(7.25));
    }

    #[test]
    fn text_tokens_are_invalid() {
        for text in ["erreur", "N/A", "---", "null", "", "nan", "NaN"] {
            assert_eq!(parse_value(text), None, "{text:?}");
        }
    }

    #[test]
    fn thousands_separators_are_invalid() {
        assert_eq!(parse_value("1,234,5"), None);
        assert_eq!(parse_value("1.234,5"), None);
    }

    #[test]
    fn infinity_is_left_to_the_range_check() {
        assert_eq!(parse_value("inf"), Some(f64::INFINITY));
    }
}
