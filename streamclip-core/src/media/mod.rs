mod downloader;
mod error;
mod executor;
mod filter;
mod overlay;
mod probe;
mod transcoder;

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

pub use downloader::{DownloadOutcome, StreamDownloader};
pub use error::{MediaError, MediaResult};
pub use executor::{CommandExecutor, SystemCommandExecutor};
pub use filter::{escape_filter_value, sanitize_overlay_text};
pub use overlay::{ComposeOutcome, ComposeRequest, OverlayAssets, OverlayComposer};
pub use probe::MediaProbe;
pub use transcoder::{TranscodeOutcome, Transcoder};

/// `MediaError::NotFound` unless `path` is an existing regular file.
pub(crate) async fn ensure_exists(path: &Path) -> MediaResult<()> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(MediaError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(MediaError::io(path, err)),
    }
}

pub(crate) async fn file_size(path: &Path) -> MediaResult<u64> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.len()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(MediaError::io(path, err)),
    }
}

/// Size of a file a tool was expected to write. Absence is a tool failure,
/// not a missing input.
pub(crate) async fn output_size(program: &Path, path: &Path) -> MediaResult<u64> {
    file_size(path).await.map_err(|err| match err {
        MediaError::NotFound { path } => MediaError::MissingOutput {
            program: program.display().to_string(),
            path,
        },
        other => other,
    })
}

/// Best-effort cleanup of a partial artifact.
pub(crate) async fn remove_if_exists(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial artifact"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove artifact"),
    }
}
