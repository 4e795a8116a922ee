mod error;
mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{info, warn};
use url::Url;

use crate::browser::ManifestExtractor;
use crate::config::{ConfigBundle, MediaConfig};
use crate::media::{
    remove_if_exists, CommandExecutor, ComposeRequest, MediaError, OverlayAssets,
    OverlayComposer, StreamDownloader, SystemCommandExecutor, Transcoder,
};
use crate::storage::{ArtifactKind, ArtifactStore, JobId};

pub use error::{FailureKind, PipelineError, PipelineResult};
pub use types::{JobReport, JobSuccess, OverlayJobRequest, ProcessRequest};

/// Runs extraction, download, compression and composition for HTTP jobs.
/// At most `max_concurrent_jobs` runs hold a permit at a time.
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<ManifestExtractor>,
    downloader: StreamDownloader,
    transcoder: Option<Transcoder>,
    composer: OverlayComposer,
    store: ArtifactStore,
    assets: OverlayAssets,
    permits: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        extractor: ManifestExtractor,
        executor: Arc<dyn CommandExecutor>,
        media: &MediaConfig,
        store: ArtifactStore,
        assets: OverlayAssets,
        max_concurrent_jobs: usize,
    ) -> Self {
        let transcoder = media
            .transcode
            .enabled
            .then(|| Transcoder::new(media, Arc::clone(&executor)));
        Self {
            extractor: Arc::new(extractor),
            downloader: StreamDownloader::new(media, Arc::clone(&executor)),
            transcoder,
            composer: OverlayComposer::new(media, executor),
            store,
            assets,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Chromium sessions and real ffmpeg processes; relative paths resolve
    /// against `base`.
    pub fn from_config(bundle: &ConfigBundle, base: &Path) -> Self {
        Self::new(
            ManifestExtractor::from_config(&bundle.browser),
            Arc::new(SystemCommandExecutor),
            &bundle.media,
            ArtifactStore::from_config(&bundle.service.paths, base),
            OverlayAssets::from_config(&bundle.media.overlay, base),
            bundle.service.limits.max_concurrent_jobs,
        )
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn assets(&self) -> &OverlayAssets {
        &self.assets
    }

    pub fn extractor(&self) -> &ManifestExtractor {
        &self.extractor
    }

    pub async fn process(&self, request: &ProcessRequest) -> PipelineResult<JobSuccess> {
        let id = parse_id(&request.id)?;
        let url = parse_page_url(&request.url)?;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::Unavailable)?;
        let started = Instant::now();
        info!(job_id = %id, url = %url, "processing job");
        self.store.ensure_dirs().await?;

        let links = self.extractor.extract(url.as_str()).await;
        let Some(manifest) = links.first() else {
            warn!(job_id = %id, url = %url, "no manifest found");
            return Err(PipelineError::NoManifest {
                url: url.to_string(),
            });
        };

        let output = self.store.path(ArtifactKind::Output, &id);
        match &self.transcoder {
            Some(transcoder) => {
                let staging = self.store.path(ArtifactKind::Staging, &id);
                self.downloader
                    .download(manifest, &staging)
                    .await
                    .map_err(PipelineError::Download)?;
                if let Err(err) = transcoder.transcode(&staging, &output).await {
                    warn!(job_id = %id, error = %err, "compression failed");
                    remove_if_exists(&staging).await;
                    return Err(PipelineError::Compression(err));
                }
            }
            None => {
                self.downloader
                    .download(manifest, &output)
                    .await
                    .map_err(PipelineError::Download)?;
            }
        }

        let total_time = started.elapsed().as_secs_f64();
        info!(
            job_id = %id,
            path = %output.display(),
            elapsed_ms = (total_time * 1000.0) as u64,
            "job completed"
        );
        Ok(JobSuccess {
            file: output,
            total_time,
        })
    }

    /// Composes the vertical clip from the output of an earlier `process` run.
    pub async fn compose(&self, request: &OverlayJobRequest) -> PipelineResult<JobSuccess> {
        let id = parse_id(&request.id)?;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::Unavailable)?;
        let started = Instant::now();
        info!(job_id = %id, "composing job");
        self.store.ensure_dirs().await?;

        let source = self.store.path(ArtifactKind::Output, &id);
        let output = self.store.path(ArtifactKind::Composed, &id);
        let compose = ComposeRequest {
            source: &source,
            output: &output,
            title: &request.title,
            description: &request.description,
        };
        self.composer
            .compose(&compose, &self.assets)
            .await
            .map_err(|err| match err {
                MediaError::NotFound { path } => {
                    warn!(job_id = %id, path = %path.display(), "overlay input missing");
                    PipelineError::MissingInput { path }
                }
                other => PipelineError::Composition(other),
            })?;

        let total_time = started.elapsed().as_secs_f64();
        info!(
            job_id = %id,
            path = %output.display(),
            elapsed_ms = (total_time * 1000.0) as u64,
            "composition completed"
        );
        Ok(JobSuccess {
            file: output,
            total_time,
        })
    }
}

fn parse_id(raw: &str) -> PipelineResult<JobId> {
    JobId::parse(raw).map_err(|err| PipelineError::InvalidRequest(err.to_string()))
}

fn parse_page_url(raw: &str) -> PipelineResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| PipelineError::InvalidRequest(format!("invalid url {raw:?}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(PipelineError::InvalidRequest(format!(
            "unsupported url scheme {scheme:?}"
        ))),
    }
}
