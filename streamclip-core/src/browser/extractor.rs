use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{BrowserConfig, ExtractionSection};

use super::automation::{BrowserAutomation, BrowserContext, BrowserLauncher};
use super::error::{BrowserError, BrowserResult};
use super::metrics::ExtractionMetrics;
use super::observer::ManifestObserver;

/// One browser session driving a single page.
#[async_trait]
pub trait ExtractionSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;
    async fn evaluate(&mut self, script: &str) -> BrowserResult<()>;
    async fn click(&mut self, selector: &str, timeout: Duration) -> BrowserResult<bool>;
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}

/// Opens isolated sessions whose network responses are reported to `observer`.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, observer: &ManifestObserver) -> BrowserResult<Box<dyn ExtractionSession>>;
}

pub struct ChromiumSessionFactory {
    launcher: BrowserLauncher,
}

impl ChromiumSessionFactory {
    pub fn new(launcher: BrowserLauncher) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self, observer: &ManifestObserver) -> BrowserResult<Box<dyn ExtractionSession>> {
        let automation = self.launcher.launch().await?;
        let prepared = async {
            let context = automation.new_context().await?;
            let listener = context.watch_responses(observer).await?;
            Ok::<_, BrowserError>((context, listener))
        }
        .await;
        match prepared {
            Ok((context, listener)) => Ok(Box::new(ChromiumSession {
                automation,
                context,
                listener,
            })),
            Err(err) => {
                automation.shutdown().await?;
                Err(err)
            }
        }
    }
}

struct ChromiumSession {
    automation: BrowserAutomation,
    context: BrowserContext,
    listener: JoinHandle<()>,
}

#[async_trait]
impl ExtractionSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.context.goto(url, timeout).await
    }

    async fn evaluate(&mut self, script: &str) -> BrowserResult<()> {
        self.context.evaluate(script).await
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> BrowserResult<bool> {
        self.context.click(selector, timeout).await
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        let ChromiumSession {
            automation,
            context,
            listener,
        } = *self;
        listener.abort();
        drop(context);
        automation.shutdown().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptProfile {
    pub navigation_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub manifest_suffix: String,
    pub attempts: Vec<AttemptProfile>,
    pub settle_delay: Duration,
    pub click_timeout: Duration,
    pub capture_window: Duration,
    pub teardown_timeout: Duration,
    pub play_selector: String,
    pub overlay_selector: String,
}

impl From<&ExtractionSection> for ExtractionSettings {
    fn from(section: &ExtractionSection) -> Self {
        Self {
            manifest_suffix: section.manifest_suffix.clone(),
            attempts: section
                .navigation_timeouts_seconds
                .iter()
                .map(|secs| AttemptProfile {
                    navigation_timeout: Duration::from_secs(*secs),
                })
                .collect(),
            settle_delay: Duration::from_millis(section.settle_delay_ms),
            click_timeout: Duration::from_millis(section.click_timeout_ms),
            capture_window: Duration::from_millis(section.capture_window_ms),
            teardown_timeout: Duration::from_millis(section.teardown_timeout_ms),
            play_selector: section.play_selector.clone(),
            overlay_selector: section.overlay_selector.clone(),
        }
    }
}

impl ExtractionSettings {
    fn overlay_script(&self) -> String {
        let selector = serde_json::to_string(&self.overlay_selector)
            .unwrap_or_else(|_| "\"\"".to_string());
        format!(
            "(() => {{
    const overlay = document.querySelector({selector});
    if (overlay) {{
        overlay.style.pointerEvents = 'none';
        overlay.style.opacity = '0';
    }}
}})()"
        )
    }
}

/// Scrapes manifest URLs from a page, retrying with the next timeout profile
/// while nothing has been found.
pub struct ManifestExtractor {
    sessions: Arc<dyn SessionFactory>,
    settings: ExtractionSettings,
    metrics: Arc<Mutex<ExtractionMetrics>>,
}

impl ManifestExtractor {
    pub fn new(sessions: Arc<dyn SessionFactory>, settings: ExtractionSettings) -> Self {
        Self {
            sessions,
            settings,
            metrics: Arc::new(Mutex::new(ExtractionMetrics::default())),
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        let launcher = BrowserLauncher::new(config.clone());
        Self::new(
            Arc::new(ChromiumSessionFactory::new(launcher)),
            ExtractionSettings::from(&config.extraction),
        )
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    pub fn metrics(&self) -> ExtractionMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn with_metrics<F>(&self, f: F)
    where
        F: FnOnce(&mut ExtractionMetrics),
    {
        let mut guard = self
            .metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }

    /// Never fails: every attempt error is logged and treated as "no links".
    pub async fn extract(&self, url: &str) -> Vec<String> {
        self.with_metrics(|metrics| metrics.record_extraction());
        let total = self.settings.attempts.len();
        for (index, profile) in self.settings.attempts.iter().enumerate() {
            let attempt = index + 1;
            let started = Instant::now();
            self.with_metrics(|metrics| metrics.record_attempt());
            match self.run_attempt(url, attempt, profile).await {
                Ok(links) if !links.is_empty() => {
                    info!(
                        attempt,
                        url,
                        links = links.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "manifest extraction succeeded"
                    );
                    self.with_metrics(|metrics| metrics.record_manifests(links.len() as u64));
                    return links;
                }
                Ok(_) => {
                    info!(attempt, url, "no manifest observed");
                    self.with_metrics(|metrics| metrics.record_empty_attempt());
                }
                Err(err) => {
                    warn!(attempt, url, error = %err, "manifest extraction attempt failed");
                    self.with_metrics(|metrics| metrics.record_failed_attempt());
                }
            }
            if attempt < total {
                info!(
                    next_timeout_s = self.settings.attempts[attempt].navigation_timeout.as_secs(),
                    "retrying with extended timeout"
                );
            }
        }
        Vec::new()
    }

    async fn run_attempt(
        &self,
        url: &str,
        attempt: usize,
        profile: &AttemptProfile,
    ) -> BrowserResult<Vec<String>> {
        let observer = ManifestObserver::new(self.settings.manifest_suffix.clone());
        let mut session = self.sessions.open(&observer).await?;
        self.with_metrics(|metrics| metrics.record_session_open());
        let outcome = self.drive(session.as_mut(), url, attempt, profile).await;
        match timeout(self.settings.teardown_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(attempt, error = %err, "failed to tear down browser session"),
            Err(_) => {
                warn!(
                    attempt,
                    timeout_ms = self.settings.teardown_timeout.as_millis() as u64,
                    "browser session teardown timed out, abandoning it"
                );
                self.with_metrics(|metrics| metrics.record_teardown_timeout());
            }
        }
        outcome?;
        Ok(observer.links())
    }

    async fn drive(
        &self,
        session: &mut dyn ExtractionSession,
        url: &str,
        attempt: usize,
        profile: &AttemptProfile,
    ) -> BrowserResult<()> {
        info!(
            attempt,
            url,
            timeout_s = profile.navigation_timeout.as_secs(),
            "navigating"
        );
        session.navigate(url, profile.navigation_timeout).await?;
        sleep(self.settings.settle_delay).await;

        if let Err(err) = session.evaluate(&self.settings.overlay_script()).await {
            debug!(attempt, error = %err, "overlay suppression script failed");
        }

        match session
            .click(&self.settings.play_selector, self.settings.click_timeout)
            .await
        {
            Ok(true) => info!(attempt, "clicked play control"),
            Ok(false) => info!(attempt, "play control not found"),
            Err(err) => {
                warn!(attempt, error = %err, "play control click failed, continuing");
                self.with_metrics(|metrics| metrics.record_click_failure());
            }
        }

        sleep(self.settings.capture_window).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_configured_timeouts() {
        let settings = ExtractionSettings::from(&ExtractionSection::default());
        assert_eq!(
            settings.attempts,
            vec![
                AttemptProfile {
                    navigation_timeout: Duration::from_secs(60)
                },
                AttemptProfile {
                    navigation_timeout: Duration::from_secs(90)
                },
            ]
        );
        assert_eq!(settings.settle_delay, Duration::from_secs(3));
        assert_eq!(settings.click_timeout, Duration::from_secs(3));
        assert_eq!(settings.capture_window, Duration::from_secs(5));
        assert_eq!(settings.teardown_timeout, Duration::from_secs(15));
    }

    #[test]
    fn overlay_script_quotes_selector() {
        let mut section = ExtractionSection::default();
        section.overlay_selector = "div[data-x='a\"b']".into();
        let script = ExtractionSettings::from(&section).overlay_script();
        assert!(script.contains(r#"document.querySelector("div[data-x='a\"b']")"#));
        assert!(script.contains("overlay.style.opacity = '0'"));
    }
}
