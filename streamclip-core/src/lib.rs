pub mod browser;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod storage;

pub use browser::{
    BrowserError, BrowserResult, ExtractionMetrics, ExtractionSession, ExtractionSettings,
    ManifestExtractor, ManifestObserver, SessionFactory,
};
pub use config::{
    load_browser_config, load_media_config, load_service_config, BrowserConfig, ConfigBundle,
    MediaConfig, ServiceConfig,
};
pub use error::{ConfigError, Result};
pub use media::{
    CommandExecutor, MediaError, MediaResult, OverlayAssets, OverlayComposer, StreamDownloader,
    SystemCommandExecutor, Transcoder,
};
pub use pipeline::{
    FailureKind, JobReport, JobSuccess, OverlayJobRequest, Pipeline, PipelineError,
    PipelineResult, ProcessRequest,
};
pub use storage::{ArtifactKind, ArtifactStore, JobId, StorageError, StorageResult};
