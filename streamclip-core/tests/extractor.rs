use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use streamclip_core::browser::{
    BrowserError, BrowserResult, ExtractionSession, ExtractionSettings, ManifestExtractor,
    ManifestObserver, SessionFactory,
};
use streamclip_core::config::ExtractionSection;

#[derive(Clone)]
enum Script {
    /// Navigation succeeds and these response URLs are seen during page load.
    Responses(Vec<&'static str>),
    NavigationTimeout,
    /// Responses arrive, but clicking the play control errors out.
    ClickError(Vec<&'static str>),
    /// Responses arrive, but the browser never finishes closing.
    HangingClose(Vec<&'static str>),
}

#[derive(Default)]
struct Journal {
    opened: usize,
    closed: usize,
    navigation_timeouts: Vec<Duration>,
    scripts_run: usize,
}

struct MockFactory {
    scripts: Mutex<VecDeque<Script>>,
    journal: Arc<Mutex<Journal>>,
}

impl MockFactory {
    fn new(scripts: Vec<Script>) -> (Arc<Self>, Arc<Mutex<Journal>>) {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let factory = Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            journal: Arc::clone(&journal),
        });
        (factory, journal)
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn open(&self, observer: &ManifestObserver) -> BrowserResult<Box<dyn ExtractionSession>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected extra attempt");
        self.journal.lock().unwrap().opened += 1;
        Ok(Box::new(MockSession {
            script,
            observer: observer.clone(),
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct MockSession {
    script: Script,
    observer: ManifestObserver,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl ExtractionSession for MockSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.journal.lock().unwrap().navigation_timeouts.push(timeout);
        match &self.script {
            Script::NavigationTimeout => Err(BrowserError::Timeout(format!("navigation to {url}"))),
            Script::Responses(urls) | Script::ClickError(urls) | Script::HangingClose(urls) => {
                for response in urls {
                    self.observer.observe(response);
                }
                Ok(())
            }
        }
    }

    async fn evaluate(&mut self, _script: &str) -> BrowserResult<()> {
        self.journal.lock().unwrap().scripts_run += 1;
        Ok(())
    }

    async fn click(&mut self, _selector: &str, _timeout: Duration) -> BrowserResult<bool> {
        match self.script {
            Script::ClickError(_) => Err(BrowserError::Script("element detached".into())),
            _ => Ok(false),
        }
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        if let Script::HangingClose(_) = self.script {
            std::future::pending::<()>().await;
        }
        self.journal.lock().unwrap().closed += 1;
        Ok(())
    }
}

fn extractor(factory: Arc<MockFactory>) -> ManifestExtractor {
    ManifestExtractor::new(factory, ExtractionSettings::from(&ExtractionSection::default()))
}

#[tokio::test(start_paused = true)]
async fn first_attempt_hit_skips_retry() {
    let (factory, journal) = MockFactory::new(vec![
        Script::Responses(vec![
            "https://cdn.example/app.js",
            "https://cdn.example/stream.m3u8",
        ]),
        Script::Responses(vec!["https://cdn.example/other.m3u8"]),
    ]);
    let extractor = extractor(factory);

    let links = extractor.extract("https://example.com/match").await;

    assert_eq!(links, vec!["https://cdn.example/stream.m3u8".to_string()]);
    let journal = journal.lock().unwrap();
    assert_eq!(journal.opened, 1);
    assert_eq!(journal.closed, 1);
    assert_eq!(journal.navigation_timeouts, vec![Duration::from_secs(60)]);
    assert_eq!(journal.scripts_run, 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_on_first_attempt_retries_with_longer_limit() {
    let (factory, journal) = MockFactory::new(vec![
        Script::NavigationTimeout,
        Script::Responses(vec!["https://cdn.example/stream.m3u8"]),
    ]);
    let extractor = extractor(factory);

    let links = extractor.extract("https://example.com/match").await;

    assert_eq!(links, vec!["https://cdn.example/stream.m3u8".to_string()]);
    let journal = journal.lock().unwrap();
    assert_eq!(
        journal.navigation_timeouts,
        vec![Duration::from_secs(60), Duration::from_secs(90)]
    );
    assert_eq!(journal.closed, 2, "failed sessions are torn down too");
    assert_eq!(extractor.metrics().failed_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn no_manifest_after_both_attempts_is_empty() {
    let (factory, journal) = MockFactory::new(vec![
        Script::Responses(vec!["https://cdn.example/app.js"]),
        Script::Responses(vec![]),
    ]);
    let extractor = extractor(factory);

    let links = extractor.extract("https://example.com/match").await;

    assert!(links.is_empty());
    assert_eq!(journal.lock().unwrap().opened, 2);
    let metrics = extractor.metrics();
    assert_eq!(metrics.attempts, 2);
    assert_eq!(metrics.empty_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn both_attempts_failing_is_not_an_error() {
    let (factory, _journal) =
        MockFactory::new(vec![Script::NavigationTimeout, Script::NavigationTimeout]);
    let extractor = extractor(factory);

    assert!(extractor.extract("https://example.com/match").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn click_failure_does_not_discard_links() {
    let (factory, _journal) = MockFactory::new(vec![Script::ClickError(vec![
        "https://cdn.example/master.m3u8",
        "https://cdn.example/720p.m3u8",
        "https://cdn.example/master.m3u8",
    ])]);
    let extractor = extractor(factory);

    let links = extractor.extract("https://example.com/match").await;

    assert_eq!(
        links,
        vec![
            "https://cdn.example/master.m3u8".to_string(),
            "https://cdn.example/720p.m3u8".to_string(),
            "https://cdn.example/master.m3u8".to_string(),
        ]
    );
    assert_eq!(extractor.metrics().click_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_teardown_does_not_block_extraction() {
    let (factory, journal) = MockFactory::new(vec![Script::HangingClose(vec![
        "https://cdn.example/stream.m3u8",
    ])]);
    let extractor = extractor(factory);
    let started = tokio::time::Instant::now();

    let links = tokio::time::timeout(
        Duration::from_secs(3_600),
        extractor.extract("https://example.com/match"),
    )
    .await
    .expect("extraction must finish even if the browser never closes");

    assert_eq!(links, vec!["https://cdn.example/stream.m3u8".to_string()]);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(journal.lock().unwrap().closed, 0);
    assert_eq!(extractor.metrics().teardown_timeouts, 1);
}
