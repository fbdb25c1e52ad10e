use consumption_domain::domain::CleanReading;

use super::Normalized;
use crate::config::QualityConfig;

/// A reading that passed every quality check, with the bookkeeping the later
/// stages report on.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub line: u64,
    pub reading: CleanReading,
    pub ambiguous_date: bool,
}

/// Why a row was dropped, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidTimestamp,
    InvalidValue,
    BelowMinimum,
    Outlier,
}

impl Rejection {
    pub fn reason(self) -> &'static str {
        match self {
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::InvalidValue => "invalid_value",
            Self::BelowMinimum => "negative",
            Self::Outlier => "outlier",
        }
    }
}

/// Range checks on parsed readings.
///
/// Accepted values satisfy `min_value <= value < max_value`. A value equal to
/// `max_value` is an outlier, both for filtering and for counting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityFilter {
    min_value: f64,
    max_value: f64,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            min_value: 0.0,
            max_value: 10_000.0,
        }
    }
}

impl From<&QualityConfig> for QualityFilter {
    fn from(cfg: &QualityConfig) -> Self {
        Self {
            min_value: cfg.min_value,
            max_value: cfg.max_value,
        }
    }
}

impl QualityFilter {
    /// Runs the checks in order: timestamp, value, lower bound, upper bound.
    /// A row is attributed to the first check it fails.
    pub fn screen(&self, row: Normalized) -> Result<Candidate, Rejection> {
        let Some(parsed) = row.timestamp else {
            return Err(Rejection::InvalidTimestamp);
        };
        let Some(value) = row.value else {
            return Err(Rejection::InvalidValue);
        };
        if value < self.min_value {
            return Err(Rejection::BelowMinimum);
        }
        if value >= self.max_value {
            return Err(Rejection::Outlier);
        }

        Ok(Candidate {
            line: row.line,
            ambiguous_date: parsed.is_ambiguous(),
            reading: CleanReading {
                site_id: row.site_id,
                instant: parsed.instant,
                energy_type: row.energy_type,
                value,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityCounts {
    pub invalid_timestamps: u64,
    pub invalid_values: u64,
    pub negative: u64,
    pub outliers: u64,
}

impl QualityCounts {
    /// Splits screened rows into survivors and per-reason counts, keeping the
    /// survivors in input order.
    pub fn tally(screened: Vec<Result<Candidate, Rejection>>) -> (Vec<Candidate>, Self) {
        let mut counts = Self::default();
        let mut kept = Vec::with_capacity(screened.len());

        for outcome in screened {
            match outcome {
                Ok(candidate) => kept.push(candidate),
                Err(rejection) => {
                    tracing::trace!(reason = rejection.reason(), "reading rejected");
                    match rejection {
                        Rejection::InvalidTimestamp => counts.invalid_timestamps += 1,
                        Rejection::InvalidValue => counts.invalid_values += 1,
                        Rejection::BelowMinimum => counts.negative += 1,
                        Rejection::Outlier => counts.outliers += 1,
                    }
                }
            }
        }

        for (reason, n) in [
            (Rejection::InvalidTimestamp, counts.invalid_timestamps),
            (Rejection::InvalidValue, counts.invalid_values),
            (Rejection::BelowMinimum, counts.negative),
            (Rejection::Outlier, counts.outliers),
        ] {
            metrics::counter!("readings_rejected_total", "reason" => reason.reason()).increment(n);
        }

        (kept, counts)
    }

    pub fn total(&self) -> u64 {
        self.invalid_timestamps + self.invalid_values + self.negative + self.outliers
    }
}
