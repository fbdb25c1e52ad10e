//! Multi-format timestamp parsing.
//!
//! Input files mix ISO, French (day first) and US (month first) spellings.
//! Formats are tried in [`TimestampFormat::ORDERED`] order and the first one
//! that parses wins. Day-first formats come before the month-first one, so a
//! slash date whose first number is 12 or less is always read as day/month,
//! even when the writer meant month/day. Callers can detect those readings
//! with [`ParsedTimestamp::is_ambiguous`]; the interpretation itself is fixed.
//!
//! As with strptime, the space between date and time matches any run of
//! whitespace. Leading or trailing whitespace is still rejected.

use std::borrow::Cow;

use time::{format_description::BorrowedFormatItem, macros::format_description, PrimitiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampFormat {
    /// `YYYY-MM-DDTHH:MM:SS`
    IsoT,
    /// `YYYY-MM-DD HH:MM:SS`
    IsoSpace,
    /// `DD/MM/YYYY HH:MM:SS`
    DayMonthSeconds,
    /// `DD/MM/YYYY HH:MM`
    DayMonthMinutes,
    /// `MM/DD/YYYY HH:MM:SS`
    MonthDaySeconds,
}

impl TimestampFormat {
    pub const ORDERED: [TimestampFormat; 5] = [
        Self::IsoT,
        Self::IsoSpace,
        Self::DayMonthSeconds,
        Self::DayMonthMinutes,
        Self::MonthDaySeconds,
    ];

    // Single-digit fields are accepted, as strptime does.
    fn description(self) -> &'static [BorrowedFormatItem<'static>] {
        match self {
            Self::IsoT => format_description!(
                "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute padding:none]:[second padding:none]"
            ),
            Self::IsoSpace => format_description!(
                "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute padding:none]:[second padding:none]"
            ),
            Self::DayMonthSeconds => format_description!(
                "[day padding:none]/[month padding:none]/[year] [hour padding:none]:[minute padding:none]:[second padding:none]"
            ),
            Self::DayMonthMinutes => format_description!(
                "[day padding:none]/[month padding:none]/[year] [hour padding:none]:[minute padding:none]"
            ),
            Self::MonthDaySeconds => format_description!(
                "[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute padding:none]:[second padding:none]"
            ),
        }
    }

    pub fn parse(self, text: &str) -> Option<PrimitiveDateTime> {
        PrimitiveDateTime::parse(text, self.description()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimestamp {
    pub instant: PrimitiveDateTime,
    pub format: TimestampFormat,
}

impl ParsedTimestamp {
    /// True when the text was read day/month while the month/day format
    /// would have accepted it as a different date. Only the seconds variant
    /// has a month/day counterpart.
    pub fn is_ambiguous(&self) -> bool {
        let day = self.instant.day();
        self.format == TimestampFormat::DayMonthSeconds
            && day <= 12
            && day != u8::from(self.instant.month())
    }
}

fn collapse_inner_whitespace(text: &str) -> Cow<'_, str> {
    let irregular = text.contains("  ") || text.contains(|c: char| c.is_whitespace() && c != ' ');
    if !irregular || text.trim().len() != text.len() {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn parse_timestamp(text: &str) -> Option<ParsedTimestamp> {
    let text = collapse_inner_whitespace(text);
    TimestampFormat::ORDERED.iter().find_map(|&format| {
        format
            .parse(&text)
            .map(|instant| ParsedTimestamp { instant, format })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn instant(text: &str) -> Option<PrimitiveDateTime> {
        parse_timestamp(text).map(|p| p.instant)
    }

    #[test]
    fn every_format_yields_the_same_instant() {
        let expected = Some(datetime!(2023-03-05 08:00:00));
        assert_eq!(instant("2023-03-05T08:00:00"), expected);
        assert_eq!(instant("2023-03-05 08:00:00"), expected);
        assert_eq!(instant("05/03/2023 08:00:00"), expected);
        assert_eq!(instant("05/03/2023 08:00"), expected);
        assert_eq!(instant("03/25/2023 08:00:00"), Some(datetime!(2023-03-25 08:00:00)));
    }

    #[test]
    fn low_first_number_is_read_day_first() {
        let parsed = parse_timestamp("03/05/2023 08:00:00").unwrap();
        assert_eq!(parsed.instant, datetime!(2023-05-03 08:00:00));
        assert_eq!(parsed.format, TimestampFormat::DayMonthSeconds);
        assert!(parsed.is_ambiguous());
    }

    #[test]
    fn month_first_only_when_day_first_is_impossible() {
        let parsed = parse_timestamp("12/31/2023 23:00:00").unwrap();
        assert_eq!(parsed.format, TimestampFormat::MonthDaySeconds);
        assert_eq!(parsed.instant, datetime!(2023-12-31 23:00:00));
        assert!(!parsed.is_ambiguous());
    }

    #[test]
    fn minutes_only_day_first_dates_are_not_flagged() {
        // No month/day format without seconds exists to compete with it.
        let parsed = parse_timestamp("03/05/2023 08:00").unwrap();
        assert_eq!(parsed.format, TimestampFormat::DayMonthMinutes);
        assert!(!parsed.is_ambiguous());
    }

    #[test]
    fn runs_of_inner_whitespace_are_accepted() {
        let expected = Some(datetime!(2023-01-01 10:00:00));
        assert_eq!(instant("2023-01-01  10:00:00"), expected);
        assert_eq!(instant("2023-01-01\t10:00:00"), expected);
        assert_eq!(instant("01/01/2023   10:00"), expected);
        assert_eq!(instant("2023-01-01 10:00:00  "), None);
    }

    #[test]
    fn unambiguous_day_first_dates_are_not_flagged() {
        assert!(!parse_timestamp("25/03/2023 08:00").unwrap().is_ambiguous());
        assert!(!parse_timestamp("04/04/2023 08:00").unwrap().is_ambiguous());
        assert!(!parse_timestamp("2023-03-05 08:00:00").unwrap().is_ambiguous());
    }

    #[test]
    fn minutes_only_format_sets_seconds_to_zero() {
        assert_eq!(instant("31/12/2024 23:59"), Some(datetime!(2024-12-31 23:59:00)));
    }

    #[test]
    fn unpadded_fields_are_accepted() {
        assert_eq!(instant("2023-3-5 8:00:00"), Some(datetime!(2023-03-05 08:00:00)));
    }

    #[test]
    fn garbage_and_impossible_dates_are_rejected() {
        for text in [
            "",
            "not a date",
            "2023-02-30 10:00:00",
            "31/31/2023 10:00:00",
            "2023-01-01",
            "2023-01-01 10:00:00 extra",
            " 2023-01-01 10:00:00",
            "2023/01/01 10:00:00",
            "2023-01-01 24:00:00",
        ] {
            assert!(parse_timestamp(text).is_none(), "{text:?} should not parse");
        }
    }

    #[test]
    fn format_order_is_fixed() {
        assert_eq!(
            TimestampFormat::ORDERED,
            [
                TimestampFormat::IsoT,
                TimestampFormat::IsoSpace,
                TimestampFormat::DayMonthSeconds,
                TimestampFormat::DayMonthMinutes,
                TimestampFormat::MonthDaySeconds,
            ]
        );
    }
}
