use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ServiceConfig {
    pub server: ServerSection,
    pub paths: PathsSection,
    pub limits: LimitsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub downloads_dir: String,
    pub staging_dir: String,
    pub composed_dir: String,
    pub artifact_label: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            downloads_dir: "downloads".into(),
            staging_dir: "staging".into(),
            composed_dir: "tiktok".into(),
            artifact_label: "futebol".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_concurrent_jobs: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub chromium: ChromiumSection,
    pub viewport: ViewportSection,
    pub extraction: ExtractionSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: String,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub mute_audio: bool,
    /// Keep cross-origin iframes in their own renderer process. Their network
    /// events are then invisible to the page's response listener.
    pub site_isolation: bool,
    pub extra_args: Vec<String>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: "/usr/bin/chromium".into(),
            headless: true,
            sandbox: false,
            disable_gpu: true,
            mute_audio: true,
            site_isolation: false,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportSection {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    pub manifest_suffix: String,
    /// One entry per attempt; the second attempt only runs if the first found nothing.
    pub navigation_timeouts_seconds: Vec<u64>,
    pub settle_delay_ms: u64,
    pub click_timeout_ms: u64,
    pub capture_window_ms: u64,
    /// Upper bound on closing a session; past it the browser is abandoned.
    pub teardown_timeout_ms: u64,
    pub play_selector: String,
    pub overlay_selector: String,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            manifest_suffix: ".m3u8".into(),
            navigation_timeouts_seconds: vec![60, 90],
            settle_delay_ms: 3_000,
            click_timeout_ms: 3_000,
            capture_window_ms: 5_000,
            teardown_timeout_ms: 15_000,
            play_selector: "button[aria-label='Play'], button.play".into(),
            overlay_selector: ".poster__background-overlay".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Applies to transcode and compose runs. Unset means they run unbounded.
    pub command_timeout_seconds: Option<u64>,
    pub download: DownloadSection,
    pub transcode: TranscodeSection,
    pub overlay: OverlaySection,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".into(),
            ffprobe: "ffprobe".into(),
            command_timeout_seconds: None,
            download: DownloadSection::default(),
            transcode: TranscodeSection::default(),
            overlay: OverlaySection::default(),
        }
    }
}

impl MediaConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub io_timeout_seconds: u64,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            io_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscodeSection {
    pub enabled: bool,
    pub video_codec: String,
    pub crf: u32,
    pub preset: String,
    pub tune: Option<String>,
    pub video_bitrate_kbps: u32,
    pub buffer_kbps: u32,
    pub height: u32,
    pub audio_codec: String,
    pub audio_bitrate_kbps: u32,
    pub threads: u32,
    /// Output must be strictly smaller than `input_size * max_output_ratio`.
    pub max_output_ratio: f64,
}

impl Default for TranscodeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            video_codec: "libx264".into(),
            crf: 23,
            preset: "veryfast".into(),
            tune: Some("fastdecode".into()),
            video_bitrate_kbps: 2_000,
            buffer_kbps: 4_000,
            height: 720,
            audio_codec: "aac".into(),
            audio_bitrate_kbps: 128,
            threads: 2,
            max_output_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlaySection {
    pub caption: String,
    pub background_image: String,
    pub foreground_image: String,
    pub font_bold: String,
    pub font_regular: String,
    pub video_codec: String,
    pub preset: String,
    pub crf: u32,
    pub layout: OverlayLayout,
}

impl Default for OverlaySection {
    fn default() -> Self {
        Self {
            caption: "MELHORES MOMENTOS".into(),
            background_image: "assets/background.png".into(),
            foreground_image: "assets/foreground.png".into(),
            font_bold: "assets/fonts/Montserrat-Bold.ttf".into(),
            font_regular: "assets/fonts/Montserrat-Regular.ttf".into(),
            video_codec: "libx264".into(),
            preset: "veryfast".into(),
            crf: 23,
            layout: OverlayLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub video_width: u32,
    pub video_height: u32,
    pub video_x: u32,
    pub video_y: u32,
    pub caption: TextStyle,
    pub title: TextStyle,
    pub description: TextStyle,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            canvas_width: 1080,
            canvas_height: 1920,
            video_width: 1080,
            video_height: 608,
            video_x: 0,
            video_y: 656,
            caption: TextStyle {
                font: FontWeight::Bold,
                font_size: 64,
                color: "white".into(),
                y: 160,
            },
            title: TextStyle {
                font: FontWeight::Bold,
                font_size: 56,
                color: "yellow".into(),
                y: 1340,
            },
            description: TextStyle {
                font: FontWeight::Regular,
                font_size: 40,
                color: "white".into(),
                y: 1440,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Bold,
    Regular,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextStyle {
    pub font: FontWeight,
    pub font_size: u32,
    pub color: String,
    pub y: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigBundle {
    pub service: ServiceConfig,
    pub browser: BrowserConfig,
    pub media: MediaConfig,
}

impl ConfigBundle {
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let service = load_service_config(dir.join("service.toml"))?;
        let browser = load_browser_config(dir.join("browser.toml"))?;
        let media = load_media_config(dir.join("media.toml"))?;
        let bundle = Self {
            service,
            browser,
            media,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.limits.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid {
                field: "limits.max_concurrent_jobs",
                reason: "must be at least 1".into(),
            });
        }
        if self.service.paths.artifact_label.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "paths.artifact_label",
                reason: "must not be empty".into(),
            });
        }
        let extraction = &self.browser.extraction;
        if extraction.navigation_timeouts_seconds.is_empty() {
            return Err(ConfigError::Invalid {
                field: "extraction.navigation_timeouts_seconds",
                reason: "at least one attempt is required".into(),
            });
        }
        if extraction.manifest_suffix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "extraction.manifest_suffix",
                reason: "must not be empty".into(),
            });
        }
        let ratio = self.media.transcode.max_output_ratio;
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(ConfigError::Invalid {
                field: "transcode.max_output_ratio",
                reason: format!("must be a positive number, got {ratio}"),
            });
        }
        Ok(())
    }

    pub fn resolve_path<P: AsRef<Path>>(base: &Path, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }
}

pub fn load_service_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
    load_toml(path)
}

pub fn load_browser_config<P: AsRef<Path>>(path: P) -> Result<BrowserConfig> {
    load_toml(path)
}

pub fn load_media_config<P: AsRef<Path>>(path: P) -> Result<MediaConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_configs() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs");
        let bundle = ConfigBundle::from_directory(dir).expect("configs should parse");
        assert_eq!(bundle.service.server.port, 8000);
        assert_eq!(bundle.service.paths.artifact_label, "futebol");
        assert_eq!(
            bundle.browser.extraction.navigation_timeouts_seconds,
            vec![60, 90]
        );
        assert_eq!(bundle.media.download.io_timeout_seconds, 30);
        assert_eq!(bundle.media.transcode.crf, 23);
        assert_eq!(bundle.media.overlay.layout.canvas_height, 1920);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: MediaConfig = toml::from_str(
            r#"
            ffmpeg = "/opt/ffmpeg/bin/ffmpeg"

            [transcode]
            max_output_ratio = 0.9
            "#,
        )
        .unwrap();
        assert_eq!(parsed.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(parsed.ffprobe, "ffprobe");
        assert_eq!(parsed.transcode.max_output_ratio, 0.9);
        assert_eq!(parsed.transcode.preset, "veryfast");
        assert!(parsed.command_timeout().is_none());
    }

    #[test]
    fn rejects_empty_attempt_list() {
        let mut bundle = ConfigBundle::default();
        bundle.browser.extraction.navigation_timeouts_seconds.clear();
        let err = bundle.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "extraction.navigation_timeouts_seconds",
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_positive_size_ratio() {
        let mut bundle = ConfigBundle::default();
        bundle.media.transcode.max_output_ratio = 0.0;
        assert!(bundle.validate().is_err());
    }
}
