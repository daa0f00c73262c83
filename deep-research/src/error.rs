//! Error taxonomy for the research pipeline

use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Failures the pipeline distinguishes by how they propagate.
///
/// Structural failures (`OutlineMissing`, `SchemaMissing`, `SchemaMalformed`,
/// `EmptyCorpus`, `ReportWriteFailure`) abort the invoking operation. Per-unit
/// failures (`WorkUnitTimeout`, `WorkUnitFailure`) are accumulated by the
/// scheduler and surfaced in the run summary without blocking sibling units.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("outline not found at {path}: run `deep-research init` first")]
    OutlineMissing { path: PathBuf },

    #[error("field schema not found at {path}: run `deep-research init` first")]
    SchemaMissing { path: PathBuf },

    #[error("malformed {file}: {reason}")]
    SchemaMalformed { file: PathBuf, reason: String },

    #[error("work unit for '{item}' timed out after {seconds}s")]
    WorkUnitTimeout { item: String, seconds: u64 },

    #[error("work unit for '{item}' failed: {reason}")]
    WorkUnitFailure { item: String, reason: String },

    #[error("no result records to synthesize: run `deep-research run` first")]
    EmptyCorpus,

    #[error("failed to write report to {path}: {source}")]
    ReportWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn malformed(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SchemaMalformed {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
