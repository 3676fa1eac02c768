use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while converting a source into renditions
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Required hardware encoder or scale filter is missing; fatal for the file
    #[error("missing hardware capability: {0}")]
    Capability(String),

    /// Source is unreadable or carries no usable media streams
    #[error("probe failed for {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    /// Encoding engine could not be launched or exited non-zero
    #[error("encode failed: {0}")]
    Encode(String),

    /// No rendition succeeded, so no master manifest exists
    #[error("no rendition succeeded for {0}")]
    Manifest(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl TranscodeError {
    pub fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TranscodeError::Probe {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TranscodeError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranscodeError>;
