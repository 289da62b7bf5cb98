//! Error types for configuration, storage, the estimator and the advisor facade.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("night interval {start}-{end} leaves no waking time")]
    NightCoversDay { start: String, end: String },
    #[error("bin count must be positive")]
    ZeroBins,
    #[error("window must span at least one day")]
    ZeroWindow,
    #[error("window of {days} days exceeds the maximum of {max}")]
    WindowTooLong { days: u32, max: u32 },
    #[error("{bins} bins exceeds the maximum of {max}")]
    TooManyBins { bins: usize, max: usize },
    #[error("forgetting factor {0} outside (0, 1]")]
    InvalidForgetting(f64),
    #[error("prior scale {0} must be positive and finite")]
    InvalidPrior(f64),
    #[error("rescale buffer capacity must be positive")]
    ZeroRescaleCapacity,
    #[error("quiz hour {0} outside 0..24")]
    InvalidQuizHour(u32),
    #[error("no activity types configured")]
    NoActivityTypes,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("quiz index {index} out of range ({len} records)")]
    QuizIndex { index: usize, len: usize },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RlsError {
    #[error("feature vector has length {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("feature vector or target contains NaN/Inf")]
    NonFiniteInput,
    #[error("degenerate gain denominator {0}")]
    DegenerateDenominator(f64),
    #[error("corrupted estimator state: {0}")]
    Corrupted(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Rls(#[from] RlsError),
}
