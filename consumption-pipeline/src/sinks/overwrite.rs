use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::pipeline::{CleaningReport, PipelineError};

/// Name of the completion marker written at the root of every output.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub target: PathBuf,
    pub files: usize,
    pub rows: usize,
}

/// An output written next to its target and not yet visible there.
///
/// [`StagedOutput::commit`] swaps the staging directory into place, replacing
/// whatever the target held. Dropping an uncommitted handle deletes the
/// staging directory and leaves the target untouched.
#[derive(Debug)]
pub struct StagedOutput {
    target: PathBuf,
    staging: PathBuf,
    files: usize,
    rows: usize,
    committed: bool,
}

fn sibling(target: &Path, tag: &str) -> Result<PathBuf, PipelineError> {
    let name = target
        .file_name()
        .ok_or_else(|| PipelineError::Config(format!("output path {} has no final component", target.display())))?;
    let mut hidden = std::ffi::OsString::from(".");
    hidden.push(name);
    hidden.push(format!(".{tag}-{}", std::process::id()));
    Ok(target.with_file_name(hidden))
}

fn lexical(path: &Path) -> PathBuf {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// True when one output location is the other or lies inside it. Two such
/// outputs would share or swallow each other's staging directory.
pub fn outputs_overlap(a: &Path, b: &Path) -> bool {
    let (a, b) = (lexical(a), lexical(b));
    a.starts_with(&b) || b.starts_with(&a)
}

fn sink_err(action: &str, path: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::Sink(format!("failed to {action} {}: {e}", path.display()))
}

impl StagedOutput {
    pub fn begin(target: &Path) -> Result<Self, PipelineError> {
        let staging = sibling(target, "staging")?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| sink_err("create", parent, e))?;
        }
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| sink_err("clear", &staging, e))?;
        }
        fs::create_dir(&staging).map_err(|e| sink_err("create", &staging, e))?;

        Ok(Self {
            target: target.to_path_buf(),
            staging,
            files: 0,
            rows: 0,
            committed: false,
        })
    }

    /// Directory the sink writes into.
    pub fn path(&self) -> &Path {
        &self.staging
    }

    pub fn record_file(&mut self, rows: usize) {
        self.files += 1;
        self.rows += rows;
    }

    pub fn write_marker(&self, report: &CleaningReport) -> Result<(), PipelineError> {
        let path = self.staging.join(SUCCESS_MARKER);
        let body = serde_json::to_vec_pretty(report)
            .map_err(|e| PipelineError::Sink(format!("failed to encode run report: {e}")))?;
        fs::write(&path, body).map_err(|e| sink_err("write", &path, e))
    }

    pub fn commit(mut self) -> Result<WriteSummary, PipelineError> {
        let backup = sibling(&self.target, "previous")?;
        let had_previous = self.target.exists();
        if had_previous {
            fs::rename(&self.target, &backup).map_err(|e| sink_err("move aside", &self.target, e))?;
        }

        if let Err(e) = fs::rename(&self.staging, &self.target) {
            if had_previous {
                if let Err(restore) = fs::rename(&backup, &self.target) {
                    tracing::error!(error = %restore, path = %backup.display(), "failed to restore previous output");
                }
            }
            return Err(sink_err("publish", &self.target, e));
        }
        self.committed = true;

        if had_previous {
            let removed = if backup.is_dir() {
                fs::remove_dir_all(&backup)
            } else {
                fs::remove_file(&backup)
            };
            if let Err(e) = removed {
                tracing::warn!(error = %e, path = %backup.display(), "failed to remove previous output");
            }
        }

        tracing::info!(
            path = %self.target.display(),
            files = self.files,
            rows = self.rows,
            "output committed"
        );
        Ok(WriteSummary {
            target: self.target.clone(),
            files: self.files,
            rows: self.rows,
        })
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_dir_all(&self.staging);
        }
    }
}
