//! The three aggregate views computed from the enriched dataset.
//!
//! Each view is derived independently from the same rows. Groups are kept in
//! `BTreeMap`s so output order is the key order, and values are summed in the
//! order of the input slice; with the canonically sorted dataset the pipeline
//! produces, both are identical across runs.

use std::collections::{BTreeMap, BTreeSet};

use consumption_domain::domain::{
    CommuneMonthlyAggregate, EnergyType, EnrichedReading, ReadingStats, SiteHourlyAggregate,
    SiteMonthlyAggregate,
};
use time::Date;

pub mod rounding;

use rounding::round_half_up;

/// Decimal places kept by every rounded metric.
pub const METRIC_SCALE: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateViews {
    pub site_hourly: Vec<SiteHourlyAggregate>,
    pub site_monthly: Vec<SiteMonthlyAggregate>,
    pub commune_monthly: Vec<CommuneMonthlyAggregate>,
}

impl AggregateViews {
    pub fn compute(rows: &[EnrichedReading]) -> Self {
        let (site_hourly, (site_monthly, commune_monthly)) = rayon::join(
            || site_hourly(rows),
            || rayon::join(|| site_monthly(rows), || commune_monthly(rows)),
        );
        tracing::info!(
            site_hourly = site_hourly.len(),
            site_monthly = site_monthly.len(),
            commune_monthly = commune_monthly.len(),
            "aggregate views computed"
        );
        Self {
            site_hourly,
            site_monthly,
            commune_monthly,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StatsAccumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }
}

impl StatsAccumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    fn finish(&self) -> ReadingStats {
        ReadingStats {
            mean: round_half_up(self.mean(), METRIC_SCALE),
            min: round_half_up(self.min, METRIC_SCALE),
            max: round_half_up(self.max, METRIC_SCALE),
            count: self.count,
        }
    }
}

type SiteHourKey<'a> = (&'a str, &'a EnergyType, Date, u8);
type SiteMonthKey<'a> = (&'a str, &'a EnergyType, i32, u8);
type CommuneMonthKey<'a> = (Option<&'a str>, &'a EnergyType, i32, u8);

/// Per site, energy type, date and hour. `year` and `month` follow from the
/// date and are carried along.
pub fn site_hourly(rows: &[EnrichedReading]) -> Vec<SiteHourlyAggregate> {
    let mut groups: BTreeMap<SiteHourKey<'_>, StatsAccumulator> = BTreeMap::new();
    for r in rows {
        groups
            .entry((
                r.reading.site_id.as_str(),
                &r.reading.energy_type,
                r.calendar.date,
                r.calendar.hour,
            ))
            .or_default()
            .push(r.reading.value);
    }

    groups
        .into_iter()
        .map(|((site_id, energy_type, date, hour), acc)| SiteHourlyAggregate {
            site_id: site_id.to_string(),
            energy_type: energy_type.clone(),
            date,
            hour,
            year: date.year(),
            month: u8::from(date.month()),
            stats: acc.finish(),
        })
        .collect()
}

pub fn site_monthly(rows: &[EnrichedReading]) -> Vec<SiteMonthlyAggregate> {
    let mut groups: BTreeMap<SiteMonthKey<'_>, StatsAccumulator> = BTreeMap::new();
    for r in rows {
        groups
            .entry((
                r.reading.site_id.as_str(),
                &r.reading.energy_type,
                r.calendar.year,
                r.calendar.month,
            ))
            .or_default()
            .push(r.reading.value);
    }

    groups
        .into_iter()
        .map(|((site_id, energy_type, year, month), acc)| SiteMonthlyAggregate {
            site_id: site_id.to_string(),
            energy_type: energy_type.clone(),
            year,
            month,
            stats: acc.finish(),
        })
        .collect()
}

/// Per commune, energy type and month. Rows without a commune form their
/// own group.
pub fn commune_monthly(rows: &[EnrichedReading]) -> Vec<CommuneMonthlyAggregate> {
    let mut groups: BTreeMap<CommuneMonthKey<'_>, (StatsAccumulator, BTreeSet<&str>)> =
        BTreeMap::new();
    for r in rows {
        let (acc, sites) = groups
            .entry((
                r.commune.as_deref(),
                &r.reading.energy_type,
                r.calendar.year,
                r.calendar.month,
            ))
            .or_default();
        acc.push(r.reading.value);
        sites.insert(r.reading.site_id.as_str());
    }

    groups
        .into_iter()
        .map(|((commune, energy_type, year, month), (acc, sites))| CommuneMonthlyAggregate {
            commune: commune.map(str::to_string),
            energy_type: energy_type.clone(),
            year,
            month,
            total: round_half_up(acc.sum, METRIC_SCALE),
            mean: round_half_up(acc.mean(), METRIC_SCALE),
            active_sites: sites.len() as u64,
        })
        .collect()
}
