use std::{cmp::Ordering, sync::Arc};

use consumption_domain::domain::{DecoratedReading, EnrichedReading, RawReading};
use rayon::prelude::*;

use super::{CleaningReport, Envelope};
use crate::transform::{
    dedup::deduplicate,
    enrich::{enrich, BuildingIndex},
    normalize,
    quality::{QualityCounts, QualityFilter},
    temporal::decompose,
};

/// Immutable description of one cleaning run: the value bounds and the
/// broadcast building reference. Timestamp format order is fixed in
/// [`crate::transform::timestamp`].
#[derive(Debug, Clone)]
pub struct CleaningPlan {
    filter: QualityFilter,
    buildings: Arc<BuildingIndex>,
}

/// Output of [`CleaningPlan::execute`]: the enriched dataset in canonical
/// order and the counts gathered along the way.
#[derive(Debug)]
pub struct CleanedBatch {
    pub enriched: Vec<EnrichedReading>,
    pub report: CleaningReport,
}

impl CleaningPlan {
    pub fn new(filter: QualityFilter, buildings: Arc<BuildingIndex>) -> Self {
        Self { filter, buildings }
    }

    pub fn execute(&self, raw: Vec<Envelope<RawReading>>) -> CleanedBatch {
        let initial_count = raw.len() as u64;

        let screened: Vec<_> = raw
            .into_par_iter()
            .map(|env| self.filter.screen(normalize(env)))
            .collect();
        let (candidates, quality) = QualityCounts::tally(screened);
        tracing::info!(
            kept = candidates.len(),
            invalid_timestamps = quality.invalid_timestamps,
            invalid_values = quality.invalid_values,
            negative = quality.negative,
            outliers = quality.outliers,
            "quality filter applied"
        );

        let dedup = deduplicate(candidates);
        metrics::counter!("readings_duplicates_total").increment(dedup.removed);
        tracing::info!(
            kept = dedup.kept.len(),
            removed = dedup.removed,
            conflicting = dedup.conflicting,
            "duplicates removed"
        );

        let ambiguous_dates = dedup.kept.iter().filter(|c| c.ambiguous_date).count() as u64;
        if ambiguous_dates > 0 {
            tracing::warn!(
                ambiguous_dates,
                "slash dates read as day/month could also be month/day"
            );
        }

        let decorated: Vec<DecoratedReading> = dedup
            .kept
            .into_par_iter()
            .map(|c| decompose(c.reading))
            .collect();

        let joined = enrich(decorated, &self.buildings);
        metrics::counter!("readings_unmatched_reference_total").increment(joined.unmatched);
        tracing::info!(
            rows = joined.rows.len(),
            unmatched = joined.unmatched,
            fanout = joined.fanout,
            "building reference joined"
        );

        let mut enriched = joined.rows;
        enriched.par_sort_by(canonical_order);

        let report = CleaningReport {
            initial_count,
            invalid_timestamps: quality.invalid_timestamps,
            invalid_values: quality.invalid_values,
            negative_count: quality.negative,
            outlier_count: quality.outliers,
            duplicates_removed: dedup.removed,
            total_removed: quality.total() + dedup.removed,
            retained_count: enriched.len() as u64,
            ambiguous_dates,
            conflicting_duplicates: dedup.conflicting,
            unmatched_reference: joined.unmatched,
            reference_fanout: joined.fanout,
            ..CleaningReport::default()
        };

        CleanedBatch { enriched, report }
    }
}

/// Total order over enriched rows that does not depend on input order.
fn canonical_order(a: &EnrichedReading, b: &EnrichedReading) -> Ordering {
    a.reading
        .site_id
        .cmp(&b.reading.site_id)
        .then_with(|| a.reading.instant.cmp(&b.reading.instant))
        .then_with(|| a.reading.energy_type.cmp(&b.reading.energy_type))
        .then_with(|| a.commune.cmp(&b.commune))
        .then_with(|| a.reading.value.total_cmp(&b.reading.value))
}
