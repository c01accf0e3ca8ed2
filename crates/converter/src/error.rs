use std::fmt;
use std::path::PathBuf;
use serde::Serialize;
use thiserror::Error;

/// The two encoder invocations made for every input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Lossless FFV1 re-encode into the intermediate container
    Stabilize,
    /// Re-encode of the intermediate into the requested format
    Transcode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Stabilize => f.write_str("stabilize"),
            Stage::Transcode => f.write_str("transcode"),
        }
    }
}

/// Errors raised while converting media files
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    #[error("{stage} stage failed: {reason}")]
    EncodeFailure { stage: Stage, reason: String },

    #[error("{stage} stage timed out after {secs} seconds")]
    Timeout { stage: Stage, secs: u64 },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Filesystem { path: path.into(), source }
    }
}

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;
