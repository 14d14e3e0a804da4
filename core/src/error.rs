use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Scorer or composer parameters out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required index artifact is absent from the index directory.
    #[error("missing index artifact '{name}' at {path}")]
    MissingArtifact { name: String, path: PathBuf },

    /// An index artifact exists but cannot be decoded.
    #[error("corrupt index artifact '{name}' at {path}: {reason}")]
    CorruptArtifact { name: String, path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
