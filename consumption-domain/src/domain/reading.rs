use std::fmt;

use time::{Date, PrimitiveDateTime};

/// Kind of energy a reading measures.
///
/// Input files label these `electricite`, `gaz` and `eau`. Any other label is
/// kept verbatim in `Other` so that no reading is lost because of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "String", from = "String")
)]
pub enum EnergyType {
    Electricity,
    Gas,
    Water,
    Other(String),
}

impl EnergyType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "electricite" => Self::Electricity,
            "gaz" => Self::Gas,
            "eau" => Self::Water,
            other => Self::Other(other.to_string()),
        }
    }

    /// Label used in input files and in partition directory names.
    pub fn label(&self) -> &str {
        match self {
            Self::Electricity => "electricite",
            Self::Gas => "gaz",
            Self::Water => "eau",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for EnergyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for EnergyType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<EnergyType> for String {
    fn from(energy_type: EnergyType) -> Self {
        energy_type.label().to_string()
    }
}

/// A sensor reading exactly as it appears in the input file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawReading {
    pub site_id: String,
    pub timestamp_text: String,
    pub energy_type: EnergyType,
    pub value_text: String,
    pub unit: String,
}

/// A reading whose timestamp and value both parsed and whose value lies in
/// the accepted range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CleanReading {
    pub site_id: String,
    pub instant: PrimitiveDateTime,
    pub energy_type: EnergyType,
    pub value: f64,
}

/// Calendar fields derived from a reading's instant, in the instant's own
/// wall-clock reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalendarFields {
    pub date: Date,
    pub hour: u8,
    pub year: i32,
    pub month: u8,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoratedReading {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub reading: CleanReading,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub calendar: CalendarFields,
}

/// Row-level unit of the output dataset and input of every aggregate view.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnrichedReading {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub reading: CleanReading,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub calendar: CalendarFields,
    pub commune: Option<String>,
}

impl EnrichedReading {
    pub fn new(decorated: DecoratedReading, commune: Option<String>) -> Self {
        Self {
            reading: decorated.reading,
            calendar: decorated.calendar,
            commune,
        }
    }
}
