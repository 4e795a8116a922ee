use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    pub extractions: u64,
    pub sessions_opened: u64,
    pub attempts: u64,
    pub failed_attempts: u64,
    pub empty_attempts: u64,
    pub click_failures: u64,
    pub teardown_timeouts: u64,
    pub manifests_collected: u64,
}

impl ExtractionMetrics {
    pub fn record_extraction(&mut self) {
        self.extractions = self.extractions.saturating_add(1);
    }

    pub fn record_session_open(&mut self) {
        self.sessions_opened = self.sessions_opened.saturating_add(1);
    }

    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub fn record_failed_attempt(&mut self) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
    }

    pub fn record_empty_attempt(&mut self) {
        self.empty_attempts = self.empty_attempts.saturating_add(1);
    }

    pub fn record_click_failure(&mut self) {
        self.click_failures = self.click_failures.saturating_add(1);
    }

    pub fn record_teardown_timeout(&mut self) {
        self.teardown_timeouts = self.teardown_timeouts.saturating_add(1);
    }

    pub fn record_manifests(&mut self, count: u64) {
        self.manifests_collected = self.manifests_collected.saturating_add(count);
    }

    pub fn hit_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            let hits = self
                .attempts
                .saturating_sub(self.failed_attempts)
                .saturating_sub(self.empty_attempts);
            (hits as f64 / self.attempts as f64) * 100.0
        }
    }
}
