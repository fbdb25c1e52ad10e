use std::fmt;

use serde::Serialize;

use crate::aggregate::AggregateViews;

/// Counts gathered over one run.
///
/// `total_removed` is the sum of the five rejection counts. Rows added by a
/// building reference listing the same site several times show up in
/// `reference_fanout` and are included in `retained_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub initial_count: u64,
    pub invalid_timestamps: u64,
    pub invalid_values: u64,
    pub negative_count: u64,
    pub outlier_count: u64,
    pub duplicates_removed: u64,
    pub total_removed: u64,
    pub retained_count: u64,
    pub ambiguous_dates: u64,
    pub conflicting_duplicates: u64,
    pub unmatched_reference: u64,
    pub reference_fanout: u64,
    pub site_hourly_rows: u64,
    pub site_monthly_rows: u64,
    pub commune_monthly_rows: u64,
}

impl CleaningReport {
    pub fn record_views(&mut self, views: &AggregateViews) {
        self.site_hourly_rows = views.site_hourly.len() as u64;
        self.site_monthly_rows = views.site_monthly.len() as u64;
        self.commune_monthly_rows = views.commune_monthly.len() as u64;
    }
}

fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("Input rows", self.initial_count),
            ("Invalid timestamps", self.invalid_timestamps),
            ("Non-numeric values", self.invalid_values),
            ("Values below minimum", self.negative_count),
            ("Outliers", self.outlier_count),
            ("Duplicates", self.duplicates_removed),
            ("Total rows removed", self.total_removed),
            ("Rows retained", self.retained_count),
        ];
        let notes = [
            ("Ambiguous day/month dates", self.ambiguous_dates),
            ("Conflicting duplicates", self.conflicting_duplicates),
            ("Rows without commune", self.unmatched_reference),
            ("Reference fan-out rows", self.reference_fanout),
            ("Site-hour aggregates", self.site_hourly_rows),
            ("Site-month aggregates", self.site_monthly_rows),
            ("Commune-month aggregates", self.commune_monthly_rows),
        ];

        writeln!(f, "================ CLEANING REPORT ================")?;
        for (label, n) in rows {
            writeln!(f, "{:<30}{:>14}", format!("{label}:"), with_thousands(n))?;
        }
        writeln!(f, "-------------------------------------------------")?;
        for (label, n) in notes {
            writeln!(f, "{:<30}{:>14}", format!("{label}:"), with_thousands(n))?;
        }
        Ok(())
    }
}
