use std::path::PathBuf;

use thiserror::Error;

use crate::media::MediaError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no manifest found for {url}")]
    NoManifest { url: String },
    #[error("download failed: {0}")]
    Download(#[source] MediaError),
    #[error("compression failed: {0}")]
    Compression(#[source] MediaError),
    #[error("overlay composition failed: {0}")]
    Composition(#[source] MediaError),
    #[error("input not found: {path}")]
    MissingInput { path: PathBuf },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("job pool is closed")]
    Unavailable,
}

/// Coarse failure classes, mapped to HTTP statuses by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidRequest,
    NotFound,
    NoManifest,
    ToolFailure,
    Internal,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::InvalidRequest(_) => FailureKind::InvalidRequest,
            PipelineError::NoManifest { .. } => FailureKind::NoManifest,
            PipelineError::Download(_)
            | PipelineError::Compression(_)
            | PipelineError::Composition(_) => FailureKind::ToolFailure,
            PipelineError::MissingInput { .. } => FailureKind::NotFound,
            PipelineError::Storage(_) | PipelineError::Unavailable => FailureKind::Internal,
        }
    }

    /// Text returned to HTTP callers. Tool diagnostics stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::InvalidRequest(reason) => reason.clone(),
            PipelineError::NoManifest { .. } => "No m3u8 links found after retries.".to_string(),
            PipelineError::Download(_) => {
                "Download failed. Check server logs for details.".to_string()
            }
            PipelineError::Compression(_) => {
                "Compression failed. Check server logs for details.".to_string()
            }
            PipelineError::Composition(_) => {
                "Overlay composition failed. Check server logs for details.".to_string()
            }
            PipelineError::MissingInput { path } => format!("File not found: {}", path.display()),
            PipelineError::Storage(_) => {
                "Storage error. Check server logs for details.".to_string()
            }
            PipelineError::Unavailable => "Service is shutting down.".to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
