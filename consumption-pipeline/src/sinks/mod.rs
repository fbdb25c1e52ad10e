pub mod overwrite;
pub mod parquet_aggregates;
pub mod parquet_file;
pub mod parquet_partitioned;

pub use overwrite::{outputs_overlap, StagedOutput, WriteSummary, SUCCESS_MARKER};
pub use parquet_aggregates::AggregateParquetSink;
pub use parquet_partitioned::PartitionedParquetSink;
