use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BrowserConfig;

use super::error::{BrowserError, BrowserResult};
use super::observer::ManifestObserver;

/// Headroom on top of the longest navigation timeout for CDP round trips.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);
/// How long each shutdown step may take before the process is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Keeps cross-origin iframes in the page's process so the page target sees
/// their network responses. Repeats chromiumoxide's own `TranslateUI` entry
/// because Chromium only honours the last `--disable-features` switch.
const FRAME_ISOLATION_ARGS: [&str; 2] = [
    "--disable-site-isolation-trials",
    "--disable-features=IsolateOrigins,site-per-process,TranslateUI",
];

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<BrowserConfig>,
}

impl BrowserLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Starts a fresh Chromium process with its own throwaway profile directory.
    pub async fn launch(&self) -> BrowserResult<BrowserAutomation> {
        let session_id = Uuid::new_v4();
        let profile_dir = tempfile::Builder::new()
            .prefix("streamclip-profile-")
            .tempdir()?;
        let chromium_config = self.build_chromium_config(&profile_dir)?;
        info!(
            session = %session_id,
            executable = %self.config.chromium.executable_path,
            headless = self.config.chromium.headless,
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        Ok(BrowserAutomation {
            session_id,
            browser,
            handler_task: Some(handler_task),
            _profile_dir: profile_dir,
        })
    }

    fn request_timeout(&self) -> Duration {
        let longest = self
            .config
            .extraction
            .navigation_timeouts_seconds
            .iter()
            .copied()
            .max()
            .unwrap_or(30);
        Duration::from_secs(longest) + REQUEST_TIMEOUT_MARGIN
    }

    fn build_chromium_config(&self, profile_dir: &TempDir) -> BrowserResult<ChromiumConfig> {
        let viewport = &self.config.viewport;
        let mut builder = ChromiumConfig::builder()
            .chrome_executable(&self.config.chromium.executable_path)
            .user_data_dir(profile_dir.path())
            .request_timeout(self.request_timeout())
            .viewport(ChromiumViewport {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: viewport.width >= viewport.height,
                has_touch: false,
            });

        if !self.config.chromium.headless {
            builder = builder.with_head();
        }
        if !self.config.chromium.sandbox {
            builder = builder.no_sandbox();
        }

        builder = builder.args(self.launch_args());

        builder.build().map_err(BrowserError::Configuration)
    }

    fn launch_args(&self) -> Vec<String> {
        let chromium = &self.config.chromium;
        let viewport = &self.config.viewport;
        let mut args = vec![format!(
            "--window-size={},{}",
            viewport.width, viewport.height
        )];
        if chromium.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if chromium.mute_audio {
            args.push("--mute-audio".into());
        }
        if !chromium.site_isolation {
            args.extend(FRAME_ISOLATION_ARGS.iter().map(|arg| arg.to_string()));
        }
        args.push("--no-first-run".into());
        args.push("--disable-background-timer-throttling".into());
        args.extend(chromium.extra_args.iter().cloned());
        args
    }
}

#[derive(Debug)]
pub struct BrowserAutomation {
    session_id: Uuid,
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    _profile_dir: TempDir,
}

impl BrowserAutomation {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn new_context(&self) -> BrowserResult<BrowserContext> {
        let params = CreateTargetParams::new("about:blank");
        let page = self.browser.new_page(params).await?;
        Ok(BrowserContext { page })
    }

    /// Closes the browser, escalating to a kill when Chromium does not answer
    /// or does not exit within the grace period.
    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!(session = %self.session_id, "Shutting down Chromium instance");
        let closed = match timeout(SHUTDOWN_GRACE, self.browser.close()).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "Failed to close browser gracefully");
                false
            }
            Err(_) => {
                warn!("Browser close request timed out");
                false
            }
        };
        let exited = closed
            && match timeout(SHUTDOWN_GRACE, self.browser.wait()).await {
                Ok(Ok(_)) => true,
                Ok(Err(err)) => {
                    warn!(error = %err, "Failed to reap Chromium process");
                    false
                }
                Err(_) => {
                    warn!("Chromium did not exit after close");
                    false
                }
            };
        if !exited {
            if let Some(Err(err)) = self.browser.kill().await {
                warn!(error = %err, "Failed to kill Chromium process");
            }
        }

        if let Some(mut handle) = self.handler_task.take() {
            match timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "Browser handler join error"),
                Err(_) => {
                    debug!("Browser handler still running after shutdown, aborting");
                    handle.abort();
                }
            }
        }
        Ok(())
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!(
                    session = %self.session_id,
                    "BrowserAutomation dropped without explicit shutdown"
                );
                handle.abort();
            }
        }
    }
}

#[derive(Debug)]
pub struct BrowserContext {
    page: Page,
}

impl BrowserContext {
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Feeds every response URL seen by the page into `observer` until the
    /// returned task is aborted or the page goes away.
    pub async fn watch_responses(&self, observer: &ManifestObserver) -> BrowserResult<JoinHandle<()>> {
        let mut events = self.page.event_listener::<EventResponseReceived>().await?;
        let observer = observer.clone();
        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let url = &event.response.url;
                if observer.observe(url) {
                    info!(url = %url, "Found manifest response");
                }
            }
        }))
    }

    pub async fn goto(&self, url: &str, limit: Duration) -> BrowserResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        match timeout(limit, self.page.goto(params)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} ({}s)",
                limit.as_secs()
            ))),
        }
    }

    pub async fn evaluate(&self, script: &str) -> BrowserResult<()> {
        self.page
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?;
        Ok(())
    }

    /// Clicks the first element matching `selector`. `Ok(false)` means nothing matched.
    pub async fn click(&self, selector: &str, limit: Duration) -> BrowserResult<bool> {
        let element = match self.page.find_element(selector).await {
            Ok(element) => element,
            Err(err) => {
                debug!(selector, error = %err, "element lookup found nothing");
                return Ok(false);
            }
        };
        match timeout(limit, element.click()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(BrowserError::Timeout(format!("click on {selector}"))),
        }
    }
}
