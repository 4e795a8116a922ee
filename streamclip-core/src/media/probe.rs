use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::error::{MediaError, MediaResult};
use super::executor::{run_checked, CommandExecutor};

#[derive(Clone)]
pub struct MediaProbe {
    ffprobe: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl MediaProbe {
    pub fn new(ffprobe: impl Into<PathBuf>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            executor,
        }
    }

    pub fn args(path: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().to_string(),
        ]
    }

    /// Container duration in seconds.
    pub async fn duration(&self, path: &Path) -> MediaResult<f64> {
        let args = Self::args(path);
        let output = run_checked(self.executor.as_ref(), &self.ffprobe, &args, None)
            .await
            .map_err(|err| MediaError::Probe {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration = parse_duration(&stdout).ok_or_else(|| MediaError::Probe {
            path: path.to_path_buf(),
            reason: format!("unreadable duration {:?}", stdout.trim()),
        })?;
        info!(path = %path.display(), duration_s = duration, "probed media duration");
        Ok(duration)
    }
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
}
