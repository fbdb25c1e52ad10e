use std::{fs::File, path::Path};

use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use time::{macros::date, Date, PrimitiveDateTime};

use crate::config::ParquetCompression;
use crate::pipeline::PipelineError;

pub fn writer_properties(compression: ParquetCompression) -> WriterProperties {
    let codec = match compression {
        ParquetCompression::Snappy => Compression::SNAPPY,
        ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
        ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
    };
    WriterProperties::builder().set_compression(codec).build()
}

/// Writes `batches` as one Parquet file. `path` must not exist yet.
pub fn write_parquet_file(
    path: &Path,
    schema: &SchemaRef,
    batches: &[RecordBatch],
    compression: ParquetCompression,
) -> Result<(), PipelineError> {
    let sink_err = |e: &dyn std::fmt::Display| {
        PipelineError::Sink(format!("failed to write {}: {e}", path.display()))
    };

    let file = File::create_new(path).map_err(|e| sink_err(&e))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(writer_properties(compression)))
        .map_err(|e| sink_err(&e))?;
    for batch in batches {
        writer.write(batch).map_err(|e| sink_err(&e))?;
    }
    writer.close().map_err(|e| sink_err(&e))?;

    metrics::counter!("parquet_files_written_total").increment(1);
    Ok(())
}

/// Days since 1970-01-01, as stored in Arrow `Date32`.
pub fn date32(date: Date) -> i32 {
    (date - date!(1970-01-01)).whole_days() as i32
}

/// Microseconds since 1970-01-01 00:00, reading the wall clock as UTC.
pub fn timestamp_micros(instant: PrimitiveDateTime) -> i64 {
    (instant.assume_utc().unix_timestamp_nanos() / 1_000) as i64
}

/// Escapes a value for use in a `key=value` partition directory name.
///
/// ASCII alphanumerics, `-` and `_` are kept; every other byte is written as
/// `%XX`. An empty value maps to Hive's default partition name.
pub fn partition_value(raw: &str, out: &mut String) {
    if raw.is_empty() {
        out.push_str("__HIVE_DEFAULT_PARTITION__");
        return;
    }
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn epoch_conversions() {
        assert_eq!(date32(date!(1970-01-01)), 0);
        assert_eq!(date32(date!(2023-01-01)), 19_358);
        assert_eq!(timestamp_micros(datetime!(1970-01-01 00:00:01)), 1_000_000);
    }

    #[test]
    fn partition_values_are_escaped() {
        let escape = |s: &str| {
            let mut out = String::new();
            partition_value(s, &mut out);
            out
        };
        assert_eq!(escape("electricite"), "electricite");
        assert_eq!(escape("2023-01-05"), "2023-01-05");
        assert_eq!(escape("a/b"), "a%2Fb");
        assert_eq!(escape(".."), "%2E%2E");
        assert_eq!(escape("é"), "%C3%A9");
        assert_eq!(escape(""), "__HIVE_DEFAULT_PARTITION__");
    }
}
