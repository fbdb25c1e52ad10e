use time::Date;

use super::EnergyType;

/// Mean/min/max/count over a group of readings. Float fields are rounded to
/// two decimals by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadingStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteHourlyAggregate {
    pub site_id: String,
    pub energy_type: EnergyType,
    pub date: Date,
    pub hour: u8,
    pub year: i32,
    pub month: u8,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub stats: ReadingStats,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteMonthlyAggregate {
    pub site_id: String,
    pub energy_type: EnergyType,
    pub year: i32,
    pub month: u8,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub stats: ReadingStats,
}

/// Monthly consumption of one commune. Readings without a matching building
/// reference are grouped under `commune: None`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommuneMonthlyAggregate {
    pub commune: Option<String>,
    pub energy_type: EnergyType,
    pub year: i32,
    pub month: u8,
    pub total: f64,
    pub mean: f64,
    pub active_sites: u64,
}
