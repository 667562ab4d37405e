//! Error type shared by every stage of the crossmatch/trim pipeline.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SkytrimError {
    /// Required structure (position columns, primary segment) is missing.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target container could not be parsed.
    #[error("FITS error: {0}")]
    Fits(String),

    /// The reference catalog could not be parsed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A post-condition of the trimmer did not hold. Never downgraded.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SkytrimError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the failures that only concern one file (unreadable or corrupt
    /// inputs), as opposed to structural or invariant failures.
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Fits(_) | Self::Catalog(_) | Self::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SkytrimError>;
