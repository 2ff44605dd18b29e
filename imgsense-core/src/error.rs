use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of top-K selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("cannot select from an empty score vector")]
    EmptyInput,
    #[error("invalid K: {k} (expected 1..={len})")]
    InvalidK { k: usize, len: usize },
}

/// Errors surfaced by the classification API.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A model, label or image file could not be read or decoded.
    #[error("failed to read [{}]: {source}", .path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    /// In-memory image bytes could not be decoded.
    #[error("invalid image data: {0}")]
    InvalidImage(#[source] anyhow::Error),
    /// The network produced something other than a `[1, N]` tensor with one score per label.
    #[error(
        "expected model to produce a [1 {labels}] shaped tensor (one score per label), instead it produced one with shape {shape:?}"
    )]
    UnexpectedShape { shape: Vec<usize>, labels: usize },
    /// Labels and probabilities were paired with different lengths.
    #[error("{labels} labels cannot be paired with {probabilities} probabilities")]
    Misaligned { labels: usize, probabilities: usize },
    /// The inference engine failed to load or execute the graph.
    #[error("inference failed: {0}")]
    Inference(#[source] anyhow::Error),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl ClassifyError {
    pub(crate) fn resource(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        ClassifyError::ResourceUnavailable {
            path: path.into(),
            source: source.into(),
        }
    }
}
