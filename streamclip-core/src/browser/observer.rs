use std::sync::{Arc, Mutex};

/// Accumulates response URLs that look like stream manifests.
///
/// Clones share the same accumulator: the session keeps one handle and hands
/// another to the response listener, then reads the links back after teardown.
#[derive(Debug, Clone)]
pub struct ManifestObserver {
    suffix: Arc<str>,
    links: Arc<Mutex<Vec<String>>>,
}

impl ManifestObserver {
    pub fn new(suffix: impl Into<String>) -> Self {
        let suffix: String = suffix.into();
        Self {
            suffix: Arc::from(suffix),
            links: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Records `url` if it contains the manifest suffix. Duplicates are kept in
    /// first-seen order.
    pub fn observe(&self, url: &str) -> bool {
        if !url.contains(&*self.suffix) {
            return false;
        }
        let mut guard = self
            .links
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push(url.to_string());
        true
    }

    pub fn links(&self) -> Vec<String> {
        self.links
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.links
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_matching_urls_in_order_with_duplicates() {
        let observer = ManifestObserver::new(".m3u8");
        assert!(!observer.observe("https://cdn.example/player.js"));
        assert!(observer.observe("https://cdn.example/master.m3u8?token=abc"));
        assert!(observer.observe("https://cdn.example/720p.m3u8"));
        assert!(observer.observe("https://cdn.example/master.m3u8?token=abc"));
        assert_eq!(
            observer.links(),
            vec![
                "https://cdn.example/master.m3u8?token=abc".to_string(),
                "https://cdn.example/720p.m3u8".to_string(),
                "https://cdn.example/master.m3u8?token=abc".to_string(),
            ]
        );
    }

    #[test]
    fn clones_share_the_accumulator() {
        let observer = ManifestObserver::new(".m3u8");
        let listener = observer.clone();
        listener.observe("https://cdn.example/stream.m3u8");
        assert_eq!(observer.len(), 1);
        assert!(!observer.is_empty());
    }
}
