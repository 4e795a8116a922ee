use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::MediaConfig;

use super::error::MediaResult;
use super::executor::{run_checked, CommandExecutor};
use super::{output_size, remove_if_exists};

#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub elapsed_seconds: f64,
}

/// Remuxes a stream manifest into a local file without re-encoding.
#[derive(Clone)]
pub struct StreamDownloader {
    ffmpeg: PathBuf,
    io_timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl StreamDownloader {
    pub fn new(config: &MediaConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffmpeg: PathBuf::from(&config.ffmpeg),
            io_timeout: Duration::from_secs(config.download.io_timeout_seconds),
            executor,
        }
    }

    pub fn args(&self, manifest_url: &str, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-timeout".to_string(),
            self.io_timeout.as_micros().to_string(),
            "-i".to_string(),
            manifest_url.to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Overwrites `output`. On failure no file is left behind at `output`.
    pub async fn download(&self, manifest_url: &str, output: &Path) -> MediaResult<DownloadOutcome> {
        let started = Instant::now();
        info!(url = manifest_url, path = %output.display(), "downloading stream");
        let args = self.args(manifest_url, output);
        let result: MediaResult<u64> = async {
            run_checked(self.executor.as_ref(), &self.ffmpeg, &args, None).await?;
            output_size(&self.ffmpeg, output).await
        }
        .await;

        match result {
            Ok(size_bytes) => {
                let elapsed_seconds = started.elapsed().as_secs_f64();
                info!(
                    path = %output.display(),
                    size_bytes,
                    elapsed_s = elapsed_seconds,
                    "download completed"
                );
                Ok(DownloadOutcome {
                    path: output.to_path_buf(),
                    size_bytes,
                    elapsed_seconds,
                })
            }
            Err(err) => {
                warn!(url = manifest_url, error = %err, "download failed");
                remove_if_exists(output).await;
                Err(err)
            }
        }
    }
}
