//! Aggregate result of one extraction batch.

use serde::{Deserialize, Serialize};

use crate::util::constants::MAX_ERROR_SAMPLES;

/// URL plus the error that failed it, kept as a bounded sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkError {
    pub url: String,
    pub error: String,
}

/// Outcome of one `run_batch` invocation.
///
/// Invariant: `succeeded + failed == processed <= requested`. `processed`
/// counts every link attempted, success or failure; error samples are capped
/// so a pathological batch cannot balloon the response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub requested: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub error_samples: Vec<LinkError>,
}

impl ExtractionOutcome {
    #[must_use]
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, url: &str, error: &str) {
        self.processed += 1;
        self.failed += 1;
        if self.error_samples.len() < MAX_ERROR_SAMPLES {
            self.error_samples.push(LinkError {
                url: url.to_string(),
                error: error.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting_invariant() {
        let mut outcome = ExtractionOutcome::new(10);
        outcome.record_success();
        outcome.record_success();
        outcome.record_failure("https://hh.example/resume/aa", "boom");

        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.succeeded + outcome.failed, outcome.processed);
        assert!(outcome.processed <= outcome.requested);
        assert_eq!(outcome.error_samples.len(), 1);
    }

    #[test]
    fn test_error_samples_bounded() {
        let mut outcome = ExtractionOutcome::new(100);
        for i in 0..20 {
            outcome.record_failure(&format!("https://hh.example/resume/{i:x}"), "nope");
        }
        assert_eq!(outcome.failed, 20);
        assert_eq!(outcome.error_samples.len(), MAX_ERROR_SAMPLES);
    }
}
