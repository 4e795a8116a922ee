use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::config::{MediaConfig, TranscodeSection};

use super::error::{MediaError, MediaResult};
use super::executor::{run_checked, CommandExecutor};
use super::probe::MediaProbe;
use super::{file_size, output_size, remove_if_exists};

#[derive(Debug, Clone, Serialize)]
pub struct TranscodeOutcome {
    pub path: PathBuf,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub duration_seconds: f64,
    pub elapsed_seconds: f64,
}

/// Re-encodes to a capped 720p H.264/AAC profile and rejects outputs that do
/// not shrink the file.
#[derive(Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    profile: TranscodeSection,
    probe: MediaProbe,
    executor: Arc<dyn CommandExecutor>,
    timeout: Option<Duration>,
}

impl Transcoder {
    pub fn new(config: &MediaConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffmpeg: PathBuf::from(&config.ffmpeg),
            profile: config.transcode.clone(),
            probe: MediaProbe::new(&config.ffprobe, Arc::clone(&executor)),
            executor,
            timeout: config.command_timeout(),
        }
    }

    pub fn profile(&self) -> &TranscodeSection {
        &self.profile
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        let profile = &self.profile;
        let bitrate = format!("{}k", profile.video_bitrate_kbps);
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vcodec".to_string(),
            profile.video_codec.clone(),
            "-crf".to_string(),
            profile.crf.to_string(),
            "-preset".to_string(),
            profile.preset.clone(),
            "-b:v".to_string(),
            bitrate.clone(),
            "-maxrate".to_string(),
            bitrate,
            "-bufsize".to_string(),
            format!("{}k", profile.buffer_kbps),
            "-vf".to_string(),
            format!("scale=-2:{}", profile.height),
            "-acodec".to_string(),
            profile.audio_codec.clone(),
            "-ab".to_string(),
            format!("{}k", profile.audio_bitrate_kbps),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ];
        if let Some(tune) = &profile.tune {
            args.push("-tune".to_string());
            args.push(tune.clone());
        }
        args.push("-threads".to_string());
        args.push(profile.threads.to_string());
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// On success `input` is deleted when possible. On failure `input` stays for the caller
    /// and any `output` is removed.
    pub async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<TranscodeOutcome> {
        let input_bytes = file_size(input).await?;
        info!(path = %input.display(), size_bytes = input_bytes, "transcode input");

        let duration_seconds = self.probe.duration(input).await.map_err(|err| {
            warn!(path = %input.display(), error = %err, "skipping compression, invalid input");
            err
        })?;

        let started = Instant::now();
        let result = self.encode(input, output, input_bytes).await;
        let output_bytes = match result {
            Ok(bytes) => bytes,
            Err(err) => {
                remove_if_exists(output).await;
                return Err(err);
            }
        };
        let elapsed_seconds = started.elapsed().as_secs_f64();

        // The output is accepted at this point, so deletion trouble is only logged.
        if let Err(err) = fs::remove_file(input).await {
            warn!(path = %input.display(), error = %err, "failed to delete transcode input");
        }
        info!(
            path = %output.display(),
            input_bytes,
            output_bytes,
            elapsed_s = elapsed_seconds,
            "compression completed"
        );
        Ok(TranscodeOutcome {
            path: output.to_path_buf(),
            input_bytes,
            output_bytes,
            duration_seconds,
            elapsed_seconds,
        })
    }

    async fn encode(&self, input: &Path, output: &Path, input_bytes: u64) -> MediaResult<u64> {
        let args = self.args(input, output);
        run_checked(self.executor.as_ref(), &self.ffmpeg, &args, self.timeout).await?;
        let output_bytes = output_size(&self.ffmpeg, output).await?;
        self.check_size(input_bytes, output_bytes)?;
        Ok(output_bytes)
    }

    fn check_size(&self, input_bytes: u64, output_bytes: u64) -> MediaResult<()> {
        let ratio = self.profile.max_output_ratio;
        let limit = input_bytes as f64 * ratio;
        if (output_bytes as f64) < limit {
            Ok(())
        } else {
            warn!(
                input_bytes,
                output_bytes, ratio, "compressed output is not smaller than input"
            );
            Err(MediaError::SizeRejected {
                input_bytes,
                output_bytes,
                ratio,
            })
        }
    }
}
