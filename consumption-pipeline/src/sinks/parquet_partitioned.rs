use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{
        ArrayRef, Date32Builder, Float64Builder, Int32Builder, StringBuilder,
        TimestampMicrosecondBuilder,
    },
    datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit},
    error::ArrowError,
    record_batch::RecordBatch,
};
use consumption_domain::domain::EnrichedReading;
use rayon::prelude::*;
use time::Date;

use super::{
    overwrite::StagedOutput,
    parquet_file::{date32, partition_value, timestamp_micros, write_parquet_file},
};
use crate::config::ParquetCompression;
use crate::pipeline::{CleaningReport, PipelineError, Sink};

pub const PART_FILE: &str = "part-00000.parquet";

pub fn enriched_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("site_id", DataType::Utf8, false),
        Field::new("instant", DataType::Timestamp(TimeUnit::Microsecond, None), false),
        Field::new("energy_type", DataType::Utf8, false),
        Field::new("value", DataType::Float64, false),
        Field::new("date", DataType::Date32, false),
        Field::new("hour", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("commune", DataType::Utf8, true),
    ]))
}

fn enriched_batch(schema: &SchemaRef, rows: &[&EnrichedReading]) -> Result<RecordBatch, ArrowError> {
    let n = rows.len();
    let mut site_id = StringBuilder::with_capacity(n, n * 8);
    let mut instant = TimestampMicrosecondBuilder::with_capacity(n);
    let mut energy_type = StringBuilder::with_capacity(n, n * 11);
    let mut value = Float64Builder::with_capacity(n);
    let mut date = Date32Builder::with_capacity(n);
    let mut hour = Int32Builder::with_capacity(n);
    let mut year = Int32Builder::with_capacity(n);
    let mut month = Int32Builder::with_capacity(n);
    let mut commune = StringBuilder::with_capacity(n, n * 8);

    for r in rows {
        site_id.append_value(&r.reading.site_id);
        instant.append_value(timestamp_micros(r.reading.instant));
        energy_type.append_value(r.reading.energy_type.label());
        value.append_value(r.reading.value);
        date.append_value(date32(r.calendar.date));
        hour.append_value(i32::from(r.calendar.hour));
        year.append_value(r.calendar.year);
        month.append_value(i32::from(r.calendar.month));
        commune.append_option(r.commune.as_deref());
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(site_id.finish()),
        Arc::new(instant.finish()),
        Arc::new(energy_type.finish()),
        Arc::new(value.finish()),
        Arc::new(date.finish()),
        Arc::new(hour.finish()),
        Arc::new(year.finish()),
        Arc::new(month.finish()),
        Arc::new(commune.finish()),
    ];
    RecordBatch::try_new(schema.clone(), columns)
}

/// Writes enriched readings as Parquet under
/// `<root>/date=YYYY-MM-DD/energy_type=<label>/part-00000.parquet`.
///
/// Every run replaces the whole of `root`. Partitions are written in
/// parallel; each file holds the partition's rows in the order given.
pub struct PartitionedParquetSink {
    root: PathBuf,
    max_rows_per_batch: usize,
    compression: ParquetCompression,
}

impl PartitionedParquetSink {
    pub fn new<P: Into<PathBuf>>(root: P, max_rows_per_batch: usize, compression: ParquetCompression) -> Self {
        Self {
            root: root.into(),
            max_rows_per_batch: max_rows_per_batch.max(1),
            compression,
        }
    }

    fn partition_dir(date: Date, energy_label: &str) -> PathBuf {
        let mut energy_dir = String::from("energy_type=");
        partition_value(energy_label, &mut energy_dir);
        PathBuf::from(format!("date={date}")).join(energy_dir)
    }
}

impl Sink<[EnrichedReading]> for PartitionedParquetSink {
    fn target(&self) -> &Path {
        &self.root
    }

    fn stage(&self, rows: &[EnrichedReading], report: &CleaningReport) -> Result<StagedOutput, PipelineError> {
        let mut staged = StagedOutput::begin(&self.root)?;

        let mut partitions: BTreeMap<(Date, &str), Vec<&EnrichedReading>> = BTreeMap::new();
        for r in rows {
            partitions
                .entry((r.calendar.date, r.reading.energy_type.label()))
                .or_default()
                .push(r);
        }

        let schema = enriched_schema();
        let base = staged.path().to_path_buf();
        let written = partitions
            .par_iter()
            .map(|((date, label), part)| {
                let dir = base.join(Self::partition_dir(*date, label));
                fs::create_dir_all(&dir)
                    .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", dir.display())))?;

                let batches = part
                    .chunks(self.max_rows_per_batch)
                    .map(|chunk| enriched_batch(&schema, chunk))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| PipelineError::Sink(format!("failed to build record batch: {e}")))?;
                write_parquet_file(&dir.join(PART_FILE), &schema, &batches, self.compression)?;
                Ok(part.len())
            })
            .collect::<Result<Vec<usize>, PipelineError>>()?;

        for n in written {
            staged.record_file(n);
        }
        staged.write_marker(report)?;
        tracing::info!(partitions = partitions.len(), rows = rows.len(), "enriched readings staged");
        Ok(staged)
    }
}
