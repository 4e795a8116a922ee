mod automation;
mod error;
mod extractor;
mod metrics;
mod observer;

pub use automation::{BrowserAutomation, BrowserContext, BrowserLauncher};
pub use error::{BrowserError, BrowserResult};
pub use extractor::{
    AttemptProfile, ChromiumSessionFactory, ExtractionSession, ExtractionSettings,
    ManifestExtractor, SessionFactory,
};
pub use metrics::ExtractionMetrics;
pub use observer::ManifestObserver;
