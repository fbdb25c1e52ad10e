use std::collections::{hash_map::Entry, HashMap};

use consumption_domain::domain::CleanReading;

use super::quality::Candidate;

pub struct DedupOutcome {
    pub kept: Vec<Candidate>,
    pub removed: u64,
    /// Dropped rows whose value differed from the kept one.
    pub conflicting: u64,
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Identity of a reading: site, canonical instant and energy type.
fn reading_key(r: &CleanReading) -> [u8; 32] {
    let mut h = blake3::Hasher::new();
    hash_str(&mut h, &r.site_id);
    h.update(&r.instant.assume_utc().unix_timestamp_nanos().to_le_bytes());
    hash_str(&mut h, r.energy_type.label());
    *h.finalize().as_bytes()
}

/// Keeps the first occurrence of every key, in input order.
///
/// Later copies are dropped even when their value differs; those are counted
/// in `conflicting` so the report can surface them.
pub fn deduplicate(rows: Vec<Candidate>) -> DedupOutcome {
    let before = rows.len() as u64;
    let mut first_values: HashMap<[u8; 32], f64> = HashMap::with_capacity(rows.len());
    let mut conflicting = 0u64;

    let kept: Vec<Candidate> = rows
        .into_iter()
        .filter(|c| match first_values.entry(reading_key(&c.reading)) {
            Entry::Vacant(slot) => {
                slot.insert(c.reading.value);
                true
            }
            Entry::Occupied(slot) => {
                if *slot.get() != c.reading.value {
                    tracing::debug!(
                        line = c.line,
                        site_id = %c.reading.site_id,
                        "duplicate reading with a different value dropped"
                    );
                    conflicting += 1;
                }
                false
            }
        })
        .collect();

    DedupOutcome {
        removed: before - kept.len() as u64,
        kept,
        conflicting,
    }
}
