use serde::Deserialize;
use std::{fs, path::PathBuf, sync::Arc};

use crate::pipeline::PipelineError;
use crate::sinks::outputs_overlap;

/// Column names of the readings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadingColumns {
    pub site_id: String,
    pub timestamp: String,
    pub energy_type: String,
    pub value: String,
    pub unit: String,
}

impl Default for ReadingColumns {
    fn default() -> Self {
        Self {
            site_id: "batiment_id".to_string(),
            timestamp: "timestamp".to_string(),
            energy_type: "type_energie".to_string(),
            value: "consommation".to_string(),
            unit: "unite".to_string(),
        }
    }
}

/// Column names of the building reference file. Other columns are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildingColumns {
    pub site_id: String,
    pub commune: String,
}

impl Default for BuildingColumns {
    fn default() -> Self {
        Self {
            site_id: "batiment_id".to_string(),
            commune: "commune".to_string(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub readings_path: PathBuf,
    pub buildings_path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub readings_columns: ReadingColumns,
    #[serde(default)]
    pub building_columns: BuildingColumns,
}

impl InputConfig {
    /// The delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8, PipelineError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "input.delimiter must be an ASCII character, got {:?}",
                    self.delimiter
                ))
            })
    }
}

/// Accepted value range: `min_value <= value < max_value`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_value: f64,
    pub max_value: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_value: 0.0,
            max_value: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

fn default_max_rows_per_batch() -> usize {
    65_536
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub enriched_dir: PathBuf,
    pub aggregates_dir: Option<PathBuf>,
    #[serde(default = "default_max_rows_per_batch")]
    pub max_rows_per_batch: usize,
    #[serde(default)]
    pub compression: ParquetCompression,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Size of the data-parallel pool; rayon's default when unset.
    pub worker_threads: Option<usize>,
}

impl RuntimeConfig {
    pub fn thread_pool(&self) -> Result<Option<Arc<rayon::ThreadPool>>, PipelineError> {
        let Some(threads) = self.worker_threads else {
            return Ok(None);
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("clean-worker-{i}"))
            .build()
            .map(|pool| Some(Arc::new(pool)))
            .map_err(|e| PipelineError::Config(format!("failed to build worker pool: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("CLEANING_CONFIG").unwrap_or_else(|_| "cleaning-config.toml".to_string());
        Self::from_path(path)
    }

    pub fn from_path<P: Into<PathBuf>>(path: P) -> anyhow::Result<Self> {
        let path = path.into();
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        Ok(Self::from_toml_str(&contents)?)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, PipelineError> {
        let cfg: AppConfig =
            toml::from_str(contents).map_err(|e| PipelineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.input.delimiter_byte()?;
        if !(self.quality.min_value < self.quality.max_value) {
            return Err(PipelineError::Config(format!(
                "quality.min_value ({}) must be below quality.max_value ({})",
                self.quality.min_value, self.quality.max_value
            )));
        }
        if self.output.max_rows_per_batch == 0 {
            return Err(PipelineError::Config(
                "output.max_rows_per_batch must be positive".to_string(),
            ));
        }
        if let Some(aggregates_dir) = &self.output.aggregates_dir {
            if outputs_overlap(&self.output.enriched_dir, aggregates_dir) {
                return Err(PipelineError::Config(format!(
                    "output.aggregates_dir ({}) overlaps output.enriched_dir ({})",
                    aggregates_dir.display(),
                    self.output.enriched_dir.display()
                )));
            }
        }
        if self.runtime.worker_threads == Some(0) {
            return Err(PipelineError::Config(
                "runtime.worker_threads must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [input]
        readings_path = "data/consommations_raw.csv"
        buildings_path = "data/batiments.csv"

        [output]
        enriched_dir = "out/consommations_clean"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(cfg.input.delimiter_byte().unwrap(), b',');
        assert_eq!(cfg.input.readings_columns.value, "consommation");
        assert_eq!(cfg.input.building_columns.commune, "commune");
        assert_eq!(cfg.quality.min_value, 0.0);
        assert_eq!(cfg.quality.max_value, 10_000.0);
        assert_eq!(cfg.output.compression, ParquetCompression::Snappy);
        assert_eq!(cfg.output.max_rows_per_batch, 65_536);
        assert!(cfg.output.aggregates_dir.is_none());
        assert!(cfg.metrics.is_none());
        assert!(cfg.runtime.thread_pool().unwrap().is_none());
    }

    #[test]
    fn column_names_can_be_overridden_individually() {
        let cfg = AppConfig::from_toml_str(&format!(
            "{MINIMAL}\n[input.readings_columns]\nsite_id = \"site\"\n"
        ));
        // `[input.readings_columns]` after `[output]` is still a subtable of input.
        let cfg = cfg.unwrap();
        assert_eq!(cfg.input.readings_columns.site_id, "site");
        assert_eq!(cfg.input.readings_columns.timestamp, "timestamp");
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let text = format!("{MINIMAL}\n[quality]\nmin_value = 5.0\nmax_value = 1.0\n");
        assert!(matches!(
            AppConfig::from_toml_str(&text),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn overlapping_output_directories_are_rejected() {
        for aggregates in ["out/consommations_clean", "out/consommations_clean/agg", "out"] {
            let text = format!("{MINIMAL}aggregates_dir = \"{aggregates}\"\n");
            assert!(
                matches!(AppConfig::from_toml_str(&text), Err(PipelineError::Config(_))),
                "{aggregates} should be rejected"
            );
        }

        let text = format!("{MINIMAL}aggregates_dir = \"out/agregats\"\n");
        assert!(AppConfig::from_toml_str(&text).is_ok());
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let text = MINIMAL.replace(
            "buildings_path = \"data/batiments.csv\"",
            "buildings_path = \"data/batiments.csv\"\ndelimiter = \"é\"",
        );
        assert!(matches!(
            AppConfig::from_toml_str(&text),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let text = MINIMAL.replace(
            "enriched_dir = \"out/consommations_clean\"",
            "enriched_dir = \"out/consommations_clean\"\ncompression = \"lz4\"",
        );
        assert!(AppConfig::from_toml_str(&text).is_err());
    }
}
