use consumption_domain::domain::{EnergyType, RawReading};

use crate::pipeline::Envelope;

pub mod dedup;
pub mod enrich;
pub mod quality;
pub mod temporal;
pub mod timestamp;
pub mod value;

use timestamp::{parse_timestamp, ParsedTimestamp};
use value::parse_value;

/// A raw reading with its timestamp and value parsed. Either may be missing;
/// [`quality::QualityFilter`] decides what that means.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub line: u64,
    pub site_id: String,
    pub energy_type: EnergyType,
    pub timestamp: Option<ParsedTimestamp>,
    pub value: Option<f64>,
}

pub fn normalize(env: Envelope<RawReading>) -> Normalized {
    let raw = env.payload;
    Normalized {
        line: env.line,
        timestamp: parse_timestamp(&raw.timestamp_text),
        value: parse_value(&raw.value_text),
        site_id: raw.site_id,
        energy_type: raw.energy_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn normalize_parses_both_fields() {
        let n = normalize(Envelope {
            payload: RawReading {
                site_id: "BAT0001".to_string(),
                timestamp_text: "05/03/2023 08:00".to_string(),
                energy_type: EnergyType::Gas,
                value_text: "12,5".to_string(),
                unit: "kWh".to_string(),
            },
            line: 7,
        });

        assert_eq!(n.line, 7);
        assert_eq!(n.timestamp.map(|t| t.instant), Some(datetime!(2023-03-05 08:00:00)));
        assert_eq!(n.value, Some(12.5));
    }

    #[test]
    fn normalize_keeps_unparseable_fields_as_none() {
        let n = normalize(Envelope {
            payload: RawReading {
                site_id: "BAT0001".to_string(),
                timestamp_text: "yesterday".to_string(),
                energy_type: EnergyType::Water,
                value_text: "erreur".to_string(),
                unit: "m3".to_string(),
            },
            line: 2,
        });

        assert!(n.timestamp.is_none());
        assert!(n.value.is_none());
    }
}
