use std::path::PathBuf;

/// Failure to write or load an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact: {reason}")]
    Corrupt { reason: String },

    #[error("unsupported artifact format version {found} (this build reads {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("feature layout {found:08x} does not match the encoder layout {expected:08x}")]
    LayoutMismatch { expected: u32, found: u32 },

    #[error("invalid artifact: {0}")]
    Invalid(String),

    #[error("failed to serialize artifact: {0}")]
    Encode(String),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing { path }
        } else {
            ArtifactError::Io { path, source }
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        ArtifactError::Corrupt {
            reason: reason.into(),
        }
    }
}
