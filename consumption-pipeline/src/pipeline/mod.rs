use std::{path::Path, pin::Pin, sync::Arc};

use consumption_domain::domain::{EnrichedReading, RawReading};
use futures::{Stream, TryStreamExt};

use crate::aggregate::AggregateViews;
use crate::sinks::{outputs_overlap, StagedOutput, WriteSummary};

pub mod plan;
pub mod report;

pub use plan::{CleanedBatch, CleaningPlan};
pub use report::CleaningReport;

/// A record read from an input file together with its 1-based line number.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub line: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("reference error: {0}")]
    Reference(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("config error: {0}")]
    Config(String),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

/// Destination for a fully materialized dataset.
///
/// Sinks write into a staging location; nothing becomes visible at the target
/// until the pipeline commits the returned [`StagedOutput`].
pub trait Sink<T: ?Sized>: Send + Sync {
    /// Location the committed output replaces.
    fn target(&self) -> &Path;

    fn stage(&self, data: &T, report: &CleaningReport) -> Result<StagedOutput, PipelineError>;
}

/// Everything a successful run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: CleaningReport,
    pub enriched: Vec<EnrichedReading>,
    pub views: AggregateViews,
    pub written: Vec<WriteSummary>,
}

pub struct Pipeline<S, K> {
    pub source: S,
    pub plan: CleaningPlan,
    pub sink: K,
    pub aggregate_sink: Option<Box<dyn Sink<AggregateViews>>>,
    pub pool: Option<Arc<rayon::ThreadPool>>,
}

impl<S, K> Pipeline<S, K>
where
    S: Source<RawReading> + Send + Sync + 'static,
    K: Sink<[EnrichedReading]> + 'static,
{
    /// Reads the whole input, runs every stage once and replaces the outputs.
    ///
    /// The raw batch, the cleaned batch and the aggregate views are each
    /// materialized exactly once; both sinks read from the same cleaned batch.
    pub async fn run(self) -> Result<RunOutcome, PipelineError> {
        if let Some(agg) = &self.aggregate_sink {
            if outputs_overlap(self.sink.target(), agg.target()) {
                return Err(PipelineError::Config(format!(
                    "output {} and aggregate output {} overlap",
                    self.sink.target().display(),
                    agg.target().display()
                )));
            }
        }

        let raw: Vec<Envelope<RawReading>> = self.source.stream().await.try_collect().await?;
        metrics::counter!("readings_ingested_total").increment(raw.len() as u64);
        tracing::info!(rows = raw.len(), "raw readings loaded");

        let Pipeline {
            plan,
            sink,
            aggregate_sink,
            pool,
            ..
        } = self;

        let job = move || -> Result<RunOutcome, PipelineError> {
            let CleanedBatch { enriched, mut report } = plan.execute(raw);

            let views = AggregateViews::compute(&enriched);
            report.record_views(&views);

            let mut staged = vec![sink.stage(enriched.as_slice(), &report)?];
            if let Some(agg) = &aggregate_sink {
                staged.push(agg.stage(&views, &report)?);
            }

            // Commit only once every output staged cleanly.
            let written = staged
                .into_iter()
                .map(StagedOutput::commit)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(RunOutcome {
                report,
                enriched,
                views,
                written,
            })
        };

        tokio::task::spawn_blocking(move || match pool {
            Some(pool) => pool.install(job),
            None => job(),
        })
        .await
        .map_err(|e| PipelineError::Transform(format!("cleaning task failed: {e}")))?
    }
}
