use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("command failed ({command}): {stderr}")]
    CommandFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("{program} exited cleanly but wrote no output at {path}")]
    MissingOutput { program: String, path: PathBuf },
    #[error("command timed out after {seconds}s ({command})")]
    Timeout { command: String, seconds: u64 },
    #[error("probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },
    #[error(
        "compressed output ({output_bytes} bytes) is not smaller than the limit derived from input ({input_bytes} bytes x {ratio})"
    )]
    SizeRejected {
        input_bytes: u64,
        output_bytes: u64,
        ratio: f64,
    },
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl MediaError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MediaError::Io {
            path: path.into(),
            source,
        }
    }

    /// Missing inputs are caller mistakes; everything else is a processing failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MediaError::NotFound { .. })
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
