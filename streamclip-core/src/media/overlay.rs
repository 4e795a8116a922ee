use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::config::{ConfigBundle, FontWeight, MediaConfig, OverlaySection, TextStyle};

use super::error::{MediaError, MediaResult};
use super::executor::{run_checked, CommandExecutor};
use super::filter::{escape_filter_value, sanitize_overlay_text};
use super::{ensure_exists, output_size, remove_if_exists};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayAssets {
    pub background: PathBuf,
    pub foreground: PathBuf,
    pub font_bold: PathBuf,
    pub font_regular: PathBuf,
}

impl OverlayAssets {
    /// Relative asset paths are resolved against `base`.
    pub fn from_config(section: &OverlaySection, base: &Path) -> Self {
        Self {
            background: ConfigBundle::resolve_path(base, &section.background_image),
            foreground: ConfigBundle::resolve_path(base, &section.foreground_image),
            font_bold: ConfigBundle::resolve_path(base, &section.font_bold),
            font_regular: ConfigBundle::resolve_path(base, &section.font_regular),
        }
    }

    pub fn paths(&self) -> [&Path; 4] {
        [
            &self.background,
            &self.foreground,
            &self.font_bold,
            &self.font_regular,
        ]
    }

    /// Fails with the first missing asset.
    pub async fn verify(&self) -> MediaResult<()> {
        for path in self.paths() {
            ensure_exists(path).await?;
        }
        Ok(())
    }

    fn font(&self, weight: FontWeight) -> &Path {
        match weight {
            FontWeight::Bold => &self.font_bold,
            FontWeight::Regular => &self.font_regular,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComposeRequest<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposeOutcome {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub elapsed_seconds: f64,
}

enum TextSource<'a> {
    Literal(&'a str),
    File(&'a Path),
}

/// Builds the vertical clip: background, cropped source video, foreground
/// frame and three text layers.
#[derive(Clone)]
pub struct OverlayComposer {
    ffmpeg: PathBuf,
    overlay: OverlaySection,
    executor: Arc<dyn CommandExecutor>,
    timeout: Option<Duration>,
}

impl OverlayComposer {
    pub fn new(config: &MediaConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffmpeg: PathBuf::from(&config.ffmpeg),
            overlay: config.overlay.clone(),
            executor,
            timeout: config.command_timeout(),
        }
    }

    /// Caller text never enters the graph: title and description are read by
    /// drawtext from `title_file` and `description_file`.
    pub fn filter_graph(
        &self,
        assets: &OverlayAssets,
        title_file: &Path,
        description_file: &Path,
    ) -> String {
        let layout = &self.overlay.layout;
        let (cw, ch) = (layout.canvas_width, layout.canvas_height);
        let (vw, vh) = (layout.video_width, layout.video_height);
        let caption = drawtext(
            assets.font(layout.caption.font),
            TextSource::Literal(&self.overlay.caption),
            &layout.caption,
        );
        let title = drawtext(
            assets.font(layout.title.font),
            TextSource::File(title_file),
            &layout.title,
        );
        let description = drawtext(
            assets.font(layout.description.font),
            TextSource::File(description_file),
            &layout.description,
        );
        format!(
            "[0:v]scale={cw}:{ch},setsar=1[bg];\
[1:v]scale={vw}:{vh}:force_original_aspect_ratio=increase,crop={vw}:{vh},setsar=1[clip];\
[bg][clip]overlay={x}:{y}:shortest=1[base];\
[2:v]scale={cw}:{ch}[fg];\
[base][fg]overlay=0:0[framed];\
[framed]{caption},{title},{description}[out]",
            x = layout.video_x,
            y = layout.video_y,
        )
    }

    pub fn args(
        &self,
        request: &ComposeRequest<'_>,
        assets: &OverlayAssets,
        title_file: &Path,
        description_file: &Path,
    ) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            assets.background.to_string_lossy().to_string(),
            "-i".to_string(),
            request.source.to_string_lossy().to_string(),
            "-i".to_string(),
            assets.foreground.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            self.filter_graph(assets, title_file, description_file),
            "-map".to_string(),
            "[out]".to_string(),
            "-map".to_string(),
            "1:a?".to_string(),
            "-c:v".to_string(),
            self.overlay.video_codec.clone(),
            "-preset".to_string(),
            self.overlay.preset.clone(),
            "-crf".to_string(),
            self.overlay.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-shortest".to_string(),
            request.output.to_string_lossy().to_string(),
        ]
    }

    /// Every input is checked before ffmpeg is spawned; a missing one yields
    /// `MediaError::NotFound` naming it. A failed run leaves no output behind.
    pub async fn compose(
        &self,
        request: &ComposeRequest<'_>,
        assets: &OverlayAssets,
    ) -> MediaResult<ComposeOutcome> {
        ensure_exists(request.source).await?;
        assets.verify().await?;

        let text_dir = tempfile::Builder::new()
            .prefix("streamclip-text-")
            .tempdir()
            .map_err(|source| MediaError::io(std::env::temp_dir(), source))?;
        let title_file = text_dir.path().join("title.txt");
        let description_file = text_dir.path().join("description.txt");
        write_text(&title_file, request.title).await?;
        write_text(&description_file, request.description).await?;

        let started = Instant::now();
        info!(
            source = %request.source.display(),
            output = %request.output.display(),
            "composing overlay clip"
        );
        let args = self.args(request, assets, &title_file, &description_file);
        if let Err(err) = run_checked(self.executor.as_ref(), &self.ffmpeg, &args, self.timeout).await
        {
            warn!(output = %request.output.display(), error = %err, "overlay composition failed");
            remove_if_exists(request.output).await;
            return Err(err);
        }

        let size_bytes = output_size(&self.ffmpeg, request.output).await?;
        let elapsed_seconds = started.elapsed().as_secs_f64();
        info!(
            output = %request.output.display(),
            size_bytes,
            elapsed_s = elapsed_seconds,
            "overlay clip ready"
        );
        Ok(ComposeOutcome {
            path: request.output.to_path_buf(),
            size_bytes,
            elapsed_seconds,
        })
    }
}

fn drawtext(font: &Path, source: TextSource<'_>, style: &TextStyle) -> String {
    let text = match source {
        TextSource::Literal(value) => format!("text={}", escape_filter_value(value)),
        TextSource::File(path) => format!(
            "textfile={}",
            escape_filter_value(&path.to_string_lossy())
        ),
    };
    format!(
        "drawtext=fontfile={font}:{text}:expansion=none:fontsize={size}:fontcolor={color}:x=(w-text_w)/2:y={y}",
        font = escape_filter_value(&font.to_string_lossy()),
        size = style.font_size,
        color = escape_filter_value(&style.color),
        y = style.y,
    )
}

async fn write_text(path: &Path, value: &str) -> MediaResult<()> {
    fs::write(path, sanitize_overlay_text(value))
        .await
        .map_err(|source| MediaError::io(path, source))
}
