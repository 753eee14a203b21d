use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias for `visage`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by artifact loading, evaluation, and the pipeline seams.
#[derive(Debug)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Feature rows and cluster labels disagree in length.
    AlignmentMismatch {
        /// Number of feature rows.
        features: usize,
        /// Number of cluster labels.
        labels: usize,
    },

    /// Identifier list and feature rows disagree in length.
    IdentifierMismatch {
        /// Number of image identifiers.
        names: usize,
        /// Number of feature rows.
        features: usize,
    },

    /// Matrix dimension mismatch (usize).
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Too few (or too many) distinct clusters for an internal validity index.
    InsufficientClusters {
        /// Distinct cluster labels present.
        clusters: usize,
        /// Points being scored.
        points: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// Score persistence requested before any score was computed.
    NotComputed,

    /// A required artifact file could not be located, fallbacks included.
    MissingArtifact {
        /// Path that failed to resolve.
        path: PathBuf,
    },

    /// Malformed ground-truth table.
    GroundTruth {
        /// Table file path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the row.
        message: String,
    },

    /// I/O failure touching an artifact path.
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying cause.
        source: io::Error,
    },

    /// JSON (de)serialization failure for an artifact path.
    Json {
        /// Offending path.
        path: PathBuf,
        /// Underlying cause.
        source: serde_json::Error,
    },

    /// Failure reading a `.npy` array.
    NpyRead {
        /// Offending path.
        path: PathBuf,
        /// Underlying cause.
        source: ndarray_npy::ReadNpyError,
    },

    /// Failure writing a `.npy` array.
    NpyWrite {
        /// Offending path.
        path: PathBuf,
        /// Underlying cause.
        source: ndarray_npy::WriteNpyError,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::AlignmentMismatch { features, labels } => {
                write!(
                    f,
                    "feature count {features} does not match cluster label count {labels}"
                )
            }
            Error::IdentifierMismatch { names, features } => {
                write!(
                    f,
                    "identifier count {names} does not match feature count {features}"
                )
            }
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InsufficientClusters { clusters, points } => {
                write!(f, "cannot score {clusters} cluster(s) across {points} points")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::NotComputed => write!(f, "scores have not been computed"),
            Error::MissingArtifact { path } => {
                write!(f, "artifact not found: {}", path.display())
            }
            Error::GroundTruth { path, line, message } => {
                write!(
                    f,
                    "invalid ground truth at {} line {line}: {message}",
                    path.display()
                )
            }
            Error::Io { path, source } => {
                write!(f, "io error at {}: {source}", path.display())
            }
            Error::Json { path, source } => {
                write!(f, "invalid json at {}: {source}", path.display())
            }
            Error::NpyRead { path, source } => {
                write!(f, "failed to read array at {}: {source}", path.display())
            }
            Error::NpyWrite { path, source } => {
                write!(f, "failed to write array at {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Json { source, .. } => Some(source),
            Error::NpyRead { source, .. } => Some(source),
            Error::NpyWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}
