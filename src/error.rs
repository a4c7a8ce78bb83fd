//! Error type shared by every operation in the crate.

use std::path::{Path, PathBuf};

/// Boxed source error for failures raised by pluggable collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("unknown benchmark group '{name}'")]
    UnknownGroup { name: String },

    #[error("unknown dataset '{name}' in this benchmark group")]
    UnknownDataset { name: String },

    #[error("cannot resolve metric '{metric}': {reason}")]
    MetricResolution { metric: String, reason: String },

    #[error("metric '{metric}' could not be computed: {reason}")]
    Scoring { metric: String, reason: String },

    #[error("{dataset}: expected {expected} predictions to match the test split, got {actual}")]
    MisalignedPredictions {
        dataset: String,
        expected: usize,
        actual: usize,
    },

    #[error("at least {required} prediction runs are required, got {actual}")]
    TooFewRuns { required: usize, actual: usize },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read table {}: {source}", path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("malformed table: {0}")]
    Malformed(String),

    #[error("loader for '{dataset}' failed: {source}")]
    Loader {
        dataset: String,
        #[source]
        source: BoxError,
    },

    #[error("no loader registered for category '{category}' (dataset '{dataset}')")]
    UnsupportedCategory { category: String, dataset: String },

    #[error("invalid split policy: {0}")]
    InvalidSplit(String),

    #[error("inconsistent registry: {0}")]
    Registry(String),

    #[error("{0} is not supported yet")]
    Unsupported(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn table(path: impl AsRef<Path>, source: impl Into<BoxError>) -> Self {
        Self::Table {
            path: path.as_ref().to_path_buf(),
            source: source.into(),
        }
    }

    pub fn loader(dataset: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Loader {
            dataset: dataset.into(),
            source: source.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_name_the_path() {
        let err = BenchError::io(
            "data/x_benchmark",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "I/O error at data/x_benchmark: denied");
    }

    #[test]
    fn anyhow_errors_box_into_table_errors() {
        let err = BenchError::table("t.csv", anyhow::anyhow!("bad header"));
        assert!(err.to_string().contains("bad header"));
    }
}
