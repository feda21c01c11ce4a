use crate::features::FEATURE_DIM;
use crate::source_class::SourceClass;

/// Invalid caller-supplied configuration, detected before any simulation or
/// fitting is attempted
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error(
        "n_class = {actual} is too small: at least {minimum} instances per class are required \
        for principal components to be computable"
    )]
    NClassTooSmall { actual: usize, minimum: usize },

    #[error(
        "timestamps must be a non-empty collection of non-empty candidate cadences, \
        not a single flat sequence"
    )]
    MalformedTimestamps,

    #[error("baseline magnitude range [{min}, {max}] is empty or non-finite")]
    InvalidBaselineRange { min: f64, max: f64 },

    #[error("unknown model kind {0:?}, must be \"rf\" or \"nn\"")]
    UnknownModelKind(String),

    #[error("unknown source class label {0:?}")]
    UnknownClassLabel(String),
}

/// Error terminating a synthesis run; there is no partial-success mode
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error(
        "unable to simulate a {class} light curve passing the quality gate in {attempts} \
        attempts, inspect the cadence and quality thresholds and try again"
    )]
    RetryExhausted { class: SourceClass, attempts: usize },

    #[error("feature extractor returned {actual} values, expected {FEATURE_DIM}")]
    FeatureDimension { actual: usize },

    #[error("corrupted light-curve archive: {0}")]
    CorruptArchive(String),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Error terminating a training invocation
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("cannot parse feature table {path:?} at line {line}: {detail}")]
    Parse {
        path: std::path::PathBuf,
        line: usize,
        detail: String,
    },

    #[error("feature table contains no rows")]
    EmptyTable,

    #[error("{0}")]
    DimensionMismatch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single simulation attempt fed an out-of-domain value into the noise
/// model. Recovered inside the instance generator retry loop, never
/// propagated to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("noise model rejected the input: {0}")]
pub struct TransientError(pub &'static str);
