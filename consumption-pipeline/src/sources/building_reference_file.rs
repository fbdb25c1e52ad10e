use std::{fs::File, path::PathBuf};

use consumption_domain::domain::BuildingRef;
use futures::Stream;

use crate::config::BuildingColumns;
use crate::pipeline::{Envelope, PipelineError, Source};

/// Delimited-text source of the building reference table.
///
/// Only the site and commune columns are read. An empty commune cell becomes
/// `None`, and so does a row too short to reach the commune column.
pub struct BuildingReferenceFileSource {
    path: PathBuf,
    delimiter: u8,
    columns: BuildingColumns,
}

impl BuildingReferenceFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, delimiter: u8, columns: BuildingColumns) -> Self {
        Self {
            path: path.into(),
            delimiter,
            columns,
        }
    }
}

fn parse_optional_string(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[async_trait::async_trait]
impl Source<BuildingRef> for BuildingReferenceFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<BuildingRef>, PipelineError>> + Send>> {
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let columns = self.columns.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path).map_err(|e| PipelineError::Reference(format!(
                "failed to open building reference {}: {e}", path.display()
            )))?;
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .flexible(true)
                .from_reader(file);
            let headers = rdr
                .headers()
                .map_err(|e| PipelineError::Reference(format!("failed to read building reference header: {e}")))?
                .clone();
            let position = |name: &str| {
                headers.iter().position(|h| h == name).ok_or_else(|| {
                    PipelineError::Reference(format!("missing column '{name}' in building reference header"))
                })
            };
            let site_idx = position(&columns.site_id)?;
            let commune_idx = position(&columns.commune)?;

            for (i, result) in rdr.records().enumerate() {
                let record = result.map_err(|e| PipelineError::Reference(format!(
                    "failed to read building reference record: {e}"
                )))?;
                let line = record.position().map(|p| p.line()).unwrap_or(i as u64 + 2);
                yield Envelope {
                    payload: BuildingRef {
                        site_id: record.get(site_idx).unwrap_or("").to_string(),
                        commune: record.get(commune_idx).and_then(parse_optional_string),
                    },
                    line,
                };
            }
        };

        Box::pin(s)
    }
}
