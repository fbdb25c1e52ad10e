use std::{fs::File, path::PathBuf};

use consumption_domain::domain::{EnergyType, RawReading};
use csv::StringRecord;
use futures::Stream;

use crate::config::ReadingColumns;
use crate::pipeline::{Envelope, PipelineError, Source};

/// Delimited-text source of raw readings.
///
/// Columns are found by header name (see [`ReadingColumns`]); the unit column
/// is optional. Fields are passed on untouched: parsing and validation happen
/// downstream so every defect ends up counted rather than aborting the run.
/// Short rows are tolerated and their missing fields read as empty text.
pub struct ReadingsCsvFileSource {
    path: PathBuf,
    delimiter: u8,
    columns: ReadingColumns,
}

impl ReadingsCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, delimiter: u8, columns: ReadingColumns) -> Self {
        Self {
            path: path.into(),
            delimiter,
            columns,
        }
    }
}

struct ColumnIndices {
    site_id: usize,
    timestamp: usize,
    energy_type: usize,
    value: usize,
    unit: Option<usize>,
}

impl ColumnIndices {
    fn resolve(headers: &StringRecord, columns: &ReadingColumns) -> Result<Self, PipelineError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                PipelineError::Source(format!("missing column '{name}' in readings header"))
            })
        };

        Ok(Self {
            site_id: require(&columns.site_id)?,
            timestamp: require(&columns.timestamp)?,
            energy_type: require(&columns.energy_type)?,
            value: require(&columns.value)?,
            unit: find(&columns.unit),
        })
    }

    fn read(&self, record: &StringRecord) -> RawReading {
        let field = |idx: usize| record.get(idx).unwrap_or("");
        RawReading {
            site_id: field(self.site_id).to_string(),
            timestamp_text: field(self.timestamp).to_string(),
            energy_type: EnergyType::from_label(field(self.energy_type)),
            value_text: field(self.value).to_string(),
            unit: self.unit.map(field).unwrap_or("").to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Source<RawReading> for ReadingsCsvFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<RawReading>, PipelineError>> + Send>> {
        // Blocking CSV reader; the whole file is consumed before any CPU-bound
        // stage starts, so this stays on the calling task.
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let columns = self.columns.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path).map_err(|e| PipelineError::Source(format!(
                "failed to open readings file {}: {e}", path.display()
            )))?;
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .flexible(true)
                .from_reader(file);
            let headers = rdr
                .headers()
                .map_err(|e| PipelineError::Source(format!("failed to read readings header: {e}")))?
                .clone();
            let indices = ColumnIndices::resolve(&headers, &columns)?;

            let mut record = StringRecord::new();
            let mut fallback_line = 1u64;
            while rdr
                .read_record(&mut record)
                .map_err(|e| PipelineError::Source(format!("failed to read readings record: {e}")))?
            {
                fallback_line += 1;
                let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
                yield Envelope {
                    payload: indices.read(&record),
                    line,
                };
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::io::Write;

    async fn read_all(contents: &str, delimiter: u8) -> Result<Vec<Envelope<RawReading>>, PipelineError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let source = ReadingsCsvFileSource::new(file.path(), delimiter, ReadingColumns::default());
        source.stream().await.try_collect().await
    }

    #[tokio::test]
    async fn reads_rows_by_header_name() {
        let rows = read_all(
            "unite,consommation,type_energie,timestamp,batiment_id\n\
             kWh,\"12,5\",electricite,2023-01-01 10:00:00,BAT0001\n",
            b',',
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 1);
        let r = &rows[0].payload;
        assert_eq!(r.site_id, "BAT0001");
        assert_eq!(r.timestamp_text, "2023-01-01 10:00:00");
        assert_eq!(r.energy_type, EnergyType::Electricity);
        assert_eq!(r.value_text, "12,5");
        assert_eq!(r.unit, "kWh");
        assert_eq!(rows[0].line, 2);
    }

    #[tokio::test]
    async fn short_rows_read_as_empty_fields() {
        let rows = read_all(
            "batiment_id,timestamp,type_energie,consommation,unite\nBAT0001,2023-01-01 10:00:00\n",
            b',',
        )
        .await
        .unwrap();

        assert_eq!(rows[0].payload.value_text, "");
        assert_eq!(rows[0].payload.energy_type, EnergyType::Other(String::new()));
    }

    #[tokio::test]
    async fn unit_column_is_optional() {
        let rows = read_all(
            "batiment_id;timestamp;type_energie;consommation\nBAT0002;05/03/2023 08:00;eau;1,5\n",
            b';',
        )
        .await
        .unwrap();

        assert_eq!(rows[0].payload.unit, "");
        assert_eq!(rows[0].payload.energy_type, EnergyType::Water);
    }

    #[tokio::test]
    async fn missing_required_column_is_fatal() {
        let err = read_all("batiment_id,timestamp,type_energie\nBAT0001,x,gaz\n", b',')
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Source(msg) if msg.contains("consommation")));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let source = ReadingsCsvFileSource::new("/nonexistent/readings.csv", b',', ReadingColumns::default());
        let res: Result<Vec<_>, _> = source.stream().await.try_collect().await;
        assert!(matches!(res, Err(PipelineError::Source(_))));
    }
}
