use std::collections::HashMap;

use consumption_domain::domain::{BuildingRef, DecoratedReading, EnrichedReading};
use futures::TryStreamExt;

use crate::pipeline::{PipelineError, Source};

/// Building reference keyed by site, loaded once and shared read-only by
/// every stage of a run.
///
/// A site listed several times keeps every entry, in file order. Joining
/// against such a site yields one row per entry.
#[derive(Debug, Clone, Default)]
pub struct BuildingIndex {
    communes: HashMap<String, Vec<Option<String>>>,
}

impl BuildingIndex {
    /// Rows with an empty `site_id` are skipped; they could never match a
    /// reading.
    pub fn from_refs<I: IntoIterator<Item = BuildingRef>>(refs: I) -> Self {
        let mut communes: HashMap<String, Vec<Option<String>>> = HashMap::new();
        for r in refs {
            if r.site_id.is_empty() {
                continue;
            }
            communes.entry(r.site_id).or_default().push(r.commune);
        }
        Self { communes }
    }

    pub async fn load<S: Source<BuildingRef>>(source: &S) -> Result<Self, PipelineError> {
        let refs: Vec<BuildingRef> = source
            .stream()
            .await
            .map_ok(|env| env.payload)
            .try_collect()
            .await?;
        let index = Self::from_refs(refs);

        let repeated = index.communes.values().filter(|c| c.len() > 1).count();
        if repeated > 0 {
            tracing::warn!(
                sites = repeated,
                "building reference lists some sites more than once; their readings will fan out"
            );
        }
        tracing::info!(sites = index.communes.len(), "building reference loaded");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.communes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communes.is_empty()
    }

    pub fn communes_of(&self, site_id: &str) -> Option<&[Option<String>]> {
        self.communes.get(site_id).map(Vec::as_slice)
    }

    /// Sites the reference assigns to `commune`.
    #[cfg(test)]
    pub(crate) fn sites_in(&self, commune: &str) -> std::collections::BTreeSet<&str> {
        self.communes
            .iter()
            .filter(|(_, cs)| cs.iter().any(|c| c.as_deref() == Some(commune)))
            .map(|(site, _)| site.as_str())
            .collect()
    }
}

pub struct Enriched {
    pub rows: Vec<EnrichedReading>,
    /// Readings whose site has no reference entry.
    pub unmatched: u64,
    /// Rows added beyond one per reading by repeated reference entries.
    pub fanout: u64,
}

/// Left join of readings against the building reference on `site_id`.
pub fn enrich(readings: Vec<DecoratedReading>, index: &BuildingIndex) -> Enriched {
    let mut rows = Vec::with_capacity(readings.len());
    let mut unmatched = 0u64;
    let mut fanout = 0u64;

    for decorated in readings {
        match index.communes_of(&decorated.reading.site_id) {
            None => {
                unmatched += 1;
                rows.push(EnrichedReading::new(decorated, None));
            }
            Some([commune]) => rows.push(EnrichedReading::new(decorated, commune.clone())),
            Some(communes) => {
                fanout += communes.len().saturating_sub(1) as u64;
                for commune in communes {
                    rows.push(EnrichedReading::new(decorated.clone(), commune.clone()));
                }
            }
        }
    }

    Enriched {
        rows,
        unmatched,
        fanout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::temporal::decompose;
    use consumption_domain::domain::{CleanReading, EnergyType};
    use time::macros::datetime;

    fn building(site: &str, commune: Option<&str>) -> BuildingRef {
        BuildingRef {
            site_id: site.to_string(),
            commune: commune.map(str::to_string),
        }
    }

    fn reading(site: &str) -> DecoratedReading {
        decompose(CleanReading {
            site_id: site.to_string(),
            instant: datetime!(2023-01-01 10:00:00),
            energy_type: EnergyType::Electricity,
            value: 1.0,
        })
    }

    #[test]
    fn unmatched_readings_are_kept_without_commune() {
        let index = BuildingIndex::from_refs([building("B1", Some("Lyon"))]);
        let out = enrich(vec![reading("B1"), reading("B9")], &index);

        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].commune.as_deref(), Some("Lyon"));
        assert_eq!(out.rows[1].commune, None);
        assert_eq!(out.unmatched, 1);
        assert_eq!(out.fanout, 0);
    }

    #[test]
    fn repeated_reference_entries_fan_out() {
        let index = BuildingIndex::from_refs([
            building("B1", Some("Lyon")),
            building("B1", Some("Nice")),
        ]);
        let out = enrich(vec![reading("B1")], &index);

        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.fanout, 1);
        assert_eq!(out.unmatched, 0);
    }

    #[test]
    fn empty_commune_cell_matches_with_null_commune() {
        let index = BuildingIndex::from_refs([building("B1", None)]);
        let out = enrich(vec![reading("B1")], &index);

        assert_eq!(out.rows[0].commune, None);
        assert_eq!(out.unmatched, 0);
    }

    #[test]
    fn blank_site_ids_are_not_indexed() {
        let index = BuildingIndex::from_refs([building("", Some("Lyon")), building("B1", Some("Lyon"))]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.sites_in("Lyon").into_iter().collect::<Vec<_>>(), vec!["B1"]);
    }
}
