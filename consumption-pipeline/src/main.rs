use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use consumption_pipeline::{
    aggregate::AggregateViews,
    config::AppConfig,
    metrics_server, observability,
    pipeline::{CleaningPlan, Pipeline, Sink},
    sinks::{AggregateParquetSink, PartitionedParquetSink},
    sources::{BuildingReferenceFileSource, ReadingsCsvFileSource},
    transform::{enrich::BuildingIndex, quality::QualityFilter},
};

/// Cleans raw energy readings and writes the partitioned dataset.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "CLEANING_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides `input.readings_path`.
    #[arg(long)]
    readings: Option<PathBuf>,
    /// Overrides `input.buildings_path`.
    #[arg(long)]
    buildings: Option<PathBuf>,
    /// Overrides `output.enriched_dir`.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Overrides `output.aggregates_dir`.
    #[arg(long)]
    aggregates: Option<PathBuf>,
}

const PREVIEW_ROWS: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::load()?,
    };
    if let Some(p) = cli.readings {
        cfg.input.readings_path = p;
    }
    if let Some(p) = cli.buildings {
        cfg.input.buildings_path = p;
    }
    if let Some(p) = cli.output {
        cfg.output.enriched_dir = p;
    }
    if let Some(p) = cli.aggregates {
        cfg.output.aggregates_dir = Some(p);
    }
    cfg.validate()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let delimiter = cfg.input.delimiter_byte()?;
    let buildings = BuildingReferenceFileSource::new(
        &cfg.input.buildings_path,
        delimiter,
        cfg.input.building_columns.clone(),
    );
    let index = BuildingIndex::load(&buildings)
        .await
        .with_context(|| format!("loading {}", cfg.input.buildings_path.display()))?;

    let plan = CleaningPlan::new(QualityFilter::from(&cfg.quality), Arc::new(index));
    let source = ReadingsCsvFileSource::new(
        &cfg.input.readings_path,
        delimiter,
        cfg.input.readings_columns.clone(),
    );
    let sink = PartitionedParquetSink::new(
        &cfg.output.enriched_dir,
        cfg.output.max_rows_per_batch,
        cfg.output.compression,
    );
    let aggregate_sink = cfg.output.aggregates_dir.as_ref().map(|dir| {
        Box::new(AggregateParquetSink::new(
            dir,
            cfg.output.max_rows_per_batch,
            cfg.output.compression,
        )) as Box<dyn Sink<AggregateViews>>
    });

    let pipeline = Pipeline {
        source,
        plan,
        sink,
        aggregate_sink,
        pool: cfg.runtime.thread_pool()?,
    };

    tracing::info!(
        readings = %cfg.input.readings_path.display(),
        output = %cfg.output.enriched_dir.display(),
        "starting cleaning run"
    );
    let outcome = pipeline.run().await?;

    for row in outcome.enriched.iter().take(PREVIEW_ROWS) {
        let json = serde_json::to_string(row)?;
        tracing::debug!(row = %json, "preview");
    }
    for written in &outcome.written {
        tracing::info!(
            path = %written.target.display(),
            files = written.files,
            rows = written.rows,
            "output written"
        );
    }

    println!("{}", outcome.report);
    Ok(())
}
