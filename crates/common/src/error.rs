//! Error types shared across vidmix crates.

use std::path::PathBuf;

/// Top-level error type for vidmix operations.
#[derive(Debug, thiserror::Error)]
pub enum VidmixError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Out of memory: {message}")]
    OutOfMemory { message: String },

    #[error("Source {pidx} is already running")]
    AlreadyRunning { pidx: u32 },

    #[error("Failed to spawn mixer thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Pixel format mismatch: {message}")]
    FormatMismatch { message: String },

    #[error("Frame size mismatch: {message}")]
    SizeMismatch { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VidmixError.
pub type VidmixResult<T> = Result<T, VidmixError>;

impl VidmixError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        Self::OutOfMemory {
            message: msg.into(),
        }
    }

    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch {
            message: msg.into(),
        }
    }

    pub fn size_mismatch(msg: impl Into<String>) -> Self {
        Self::SizeMismatch {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = VidmixError::invalid_argument("fps must be non-zero");
        assert_eq!(err.to_string(), "Invalid argument: fps must be non-zero");

        let err = VidmixError::AlreadyRunning { pidx: 7 };
        assert_eq!(err.to_string(), "Source 7 is already running");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: VidmixError = io.into();
        assert!(matches!(err, VidmixError::Io(_)));
    }
}
