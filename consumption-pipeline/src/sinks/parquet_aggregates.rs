use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, Date32Builder, Float64Builder, Int32Builder, Int64Builder, StringBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use consumption_domain::domain::{
    CommuneMonthlyAggregate, ReadingStats, SiteHourlyAggregate, SiteMonthlyAggregate,
};

use super::{
    overwrite::StagedOutput,
    parquet_file::{date32, write_parquet_file},
};
use crate::aggregate::AggregateViews;
use crate::config::ParquetCompression;
use crate::pipeline::{CleaningReport, PipelineError, Sink};

pub const SITE_HOURLY_FILE: &str = "site_hourly.parquet";
pub const SITE_MONTHLY_FILE: &str = "site_monthly.parquet";
pub const COMMUNE_MONTHLY_FILE: &str = "commune_monthly.parquet";

fn stats_fields() -> [Field; 4] {
    [
        Field::new("mean", DataType::Float64, false),
        Field::new("min", DataType::Float64, false),
        Field::new("max", DataType::Float64, false),
        Field::new("count", DataType::Int64, false),
    ]
}

pub fn site_hourly_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("site_id", DataType::Utf8, false),
        Field::new("energy_type", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("hour", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
    ];
    fields.extend(stats_fields());
    Arc::new(Schema::new(fields))
}

pub fn site_monthly_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("site_id", DataType::Utf8, false),
        Field::new("energy_type", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
    ];
    fields.extend(stats_fields());
    Arc::new(Schema::new(fields))
}

pub fn commune_monthly_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("commune", DataType::Utf8, true),
        Field::new("energy_type", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("total", DataType::Float64, false),
        Field::new("mean", DataType::Float64, false),
        Field::new("active_sites", DataType::Int64, false),
    ]))
}

#[derive(Default)]
struct StatsColumns {
    mean: Float64Builder,
    min: Float64Builder,
    max: Float64Builder,
    count: Int64Builder,
}

impl StatsColumns {
    fn append(&mut self, stats: &ReadingStats) {
        self.mean.append_value(stats.mean);
        self.min.append_value(stats.min);
        self.max.append_value(stats.max);
        self.count.append_value(stats.count as i64);
    }

    fn finish_into(mut self, columns: &mut Vec<ArrayRef>) {
        columns.push(Arc::new(self.mean.finish()));
        columns.push(Arc::new(self.min.finish()));
        columns.push(Arc::new(self.max.finish()));
        columns.push(Arc::new(self.count.finish()));
    }
}

fn site_hourly_batch(schema: &SchemaRef, rows: &[SiteHourlyAggregate]) -> Result<RecordBatch, ArrowError> {
    let mut site_id = StringBuilder::new();
    let mut energy_type = StringBuilder::new();
    let mut date = Date32Builder::with_capacity(rows.len());
    let mut hour = Int32Builder::with_capacity(rows.len());
    let mut year = Int32Builder::with_capacity(rows.len());
    let mut month = Int32Builder::with_capacity(rows.len());
    let mut stats = StatsColumns::default();

    for r in rows {
        site_id.append_value(&r.site_id);
        energy_type.append_value(r.energy_type.label());
        date.append_value(date32(r.date));
        hour.append_value(i32::from(r.hour));
        year.append_value(r.year);
        month.append_value(i32::from(r.month));
        stats.append(&r.stats);
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(site_id.finish()),
        Arc::new(energy_type.finish()),
        Arc::new(date.finish()),
        Arc::new(hour.finish()),
        Arc::new(year.finish()),
        Arc::new(month.finish()),
    ];
    stats.finish_into(&mut columns);
    RecordBatch::try_new(schema.clone(), columns)
}

fn site_monthly_batch(schema: &SchemaRef, rows: &[SiteMonthlyAggregate]) -> Result<RecordBatch, ArrowError> {
    let mut site_id = StringBuilder::new();
    let mut energy_type = StringBuilder::new();
    let mut year = Int32Builder::with_capacity(rows.len());
    let mut month = Int32Builder::with_capacity(rows.len());
    let mut stats = StatsColumns::default();

    for r in rows {
        site_id.append_value(&r.site_id);
        energy_type.append_value(r.energy_type.label());
        year.append_value(r.year);
        month.append_value(i32::from(r.month));
        stats.append(&r.stats);
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(site_id.finish()),
        Arc::new(energy_type.finish()),
        Arc::new(year.finish()),
        Arc::new(month.finish()),
    ];
    stats.finish_into(&mut columns);
    RecordBatch::try_new(schema.clone(), columns)
}

fn commune_monthly_batch(
    schema: &SchemaRef,
    rows: &[CommuneMonthlyAggregate],
) -> Result<RecordBatch, ArrowError> {
    let mut commune = StringBuilder::new();
    let mut energy_type = StringBuilder::new();
    let mut year = Int32Builder::with_capacity(rows.len());
    let mut month = Int32Builder::with_capacity(rows.len());
    let mut total = Float64Builder::with_capacity(rows.len());
    let mut mean = Float64Builder::with_capacity(rows.len());
    let mut active_sites = Int64Builder::with_capacity(rows.len());

    for r in rows {
        commune.append_option(r.commune.as_deref());
        energy_type.append_value(r.energy_type.label());
        year.append_value(r.year);
        month.append_value(i32::from(r.month));
        total.append_value(r.total);
        mean.append_value(r.mean);
        active_sites.append_value(r.active_sites as i64);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(commune.finish()),
        Arc::new(energy_type.finish()),
        Arc::new(year.finish()),
        Arc::new(month.finish()),
        Arc::new(total.finish()),
        Arc::new(mean.finish()),
        Arc::new(active_sites.finish()),
    ];
    RecordBatch::try_new(schema.clone(), columns)
}

/// Writes the three aggregate views as one Parquet file each under `root`,
/// replacing whatever a previous run left there.
pub struct AggregateParquetSink {
    root: PathBuf,
    max_rows_per_batch: usize,
    compression: ParquetCompression,
}

impl AggregateParquetSink {
    pub fn new<P: Into<PathBuf>>(root: P, max_rows_per_batch: usize, compression: ParquetCompression) -> Self {
        Self {
            root: root.into(),
            max_rows_per_batch: max_rows_per_batch.max(1),
            compression,
        }
    }

    fn write_view<R>(
        &self,
        staged: &mut StagedOutput,
        file_name: &str,
        schema: SchemaRef,
        rows: &[R],
        to_batch: fn(&SchemaRef, &[R]) -> Result<RecordBatch, ArrowError>,
    ) -> Result<(), PipelineError> {
        let batches = rows
            .chunks(self.max_rows_per_batch)
            .map(|chunk| to_batch(&schema, chunk))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::Sink(format!("failed to build {file_name} batch: {e}")))?;
        write_parquet_file(&staged.path().join(file_name), &schema, &batches, self.compression)?;
        staged.record_file(rows.len());
        Ok(())
    }
}

impl Sink<AggregateViews> for AggregateParquetSink {
    fn target(&self) -> &Path {
        &self.root
    }

    fn stage(&self, views: &AggregateViews, report: &CleaningReport) -> Result<StagedOutput, PipelineError> {
        let mut staged = StagedOutput::begin(&self.root)?;

        self.write_view(
            &mut staged,
            SITE_HOURLY_FILE,
            site_hourly_schema(),
            &views.site_hourly,
            site_hourly_batch,
        )?;
        self.write_view(
            &mut staged,
            SITE_MONTHLY_FILE,
            site_monthly_schema(),
            &views.site_monthly,
            site_monthly_batch,
        )?;
        self.write_view(
            &mut staged,
            COMMUNE_MONTHLY_FILE,
            commune_monthly_schema(),
            &views.commune_monthly,
            commune_monthly_batch,
        )?;

        staged.write_marker(report)?;
        tracing::info!(root = %self.root.display(), "aggregate views staged");
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use consumption_domain::domain::EnergyType;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    fn read_back(path: PathBuf) -> RecordBatch {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap()).unwrap();
        let schema = builder.schema().clone();
        let batches: Vec<RecordBatch> = builder.build().unwrap().collect::<Result<_, _>>().unwrap();
        arrow::compute::concat_batches(&schema, &batches).unwrap()
    }

    #[test]
    fn writes_each_view_to_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("aggregates");
        let views = AggregateViews {
            site_hourly: vec![],
            site_monthly: vec![SiteMonthlyAggregate {
                site_id: "BAT0001".into(),
                energy_type: EnergyType::Electricity,
                year: 2023,
                month: 1,
                stats: ReadingStats {
                    mean: 15.0,
                    min: 10.0,
                    max: 20.0,
                    count: 2,
                },
            }],
            commune_monthly: vec![
                CommuneMonthlyAggregate {
                    commune: Some("Paris".into()),
                    energy_type: EnergyType::Electricity,
                    year: 2023,
                    month: 1,
                    total: 30.0,
                    mean: 15.0,
                    active_sites: 1,
                },
                CommuneMonthlyAggregate {
                    commune: None,
                    energy_type: EnergyType::Gas,
                    year: 2023,
                    month: 1,
                    total: 4.5,
                    mean: 4.5,
                    active_sites: 1,
                },
            ],
        };

        let sink = AggregateParquetSink::new(&root, 1024, ParquetCompression::Uncompressed);
        let summary = sink
            .stage(&views, &CleaningReport::default())
            .unwrap()
            .commit()
            .unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.rows, 3);
        assert!(root.join(crate::sinks::SUCCESS_MARKER).exists());

        let hourly = read_back(root.join(SITE_HOURLY_FILE));
        assert_eq!(hourly.num_rows(), 0);
        assert_eq!(hourly.num_columns(), 10);

        let monthly = read_back(root.join(SITE_MONTHLY_FILE));
        let means = monthly
            .column_by_name("mean")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(means.value(0), 15.0);
        let counts = monthly
            .column_by_name("count")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(counts.value(0), 2);

        let communes = read_back(root.join(COMMUNE_MONTHLY_FILE));
        let names = communes
            .column_by_name("commune")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(names.value(0), "Paris");
        assert!(names.is_null(1));
    }
}
