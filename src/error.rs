//! Error types shared across the pipeline.
//!
//! Oracle failures live next to the adapter (`analyze::oracle::OracleError`) and never
//! reach this level; the scoring policy absorbs them.

use thiserror::Error;

/// Missing or unusable configuration at pipeline start. Fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A credential required to retrieve headlines is absent.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Nothing to search for.
    #[error("no query given")]
    NoQuery,
    /// Stopped before the next headline; partial results were discarded.
    #[error("analysis cancelled after {scored} of {total} headlines")]
    Cancelled { scored: usize, total: usize },
}
