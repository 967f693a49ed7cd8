//! Mock processor with configurable outcome and concurrency tracking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::processor::{ProcessOutcome, Processor, ProcessorError};

enum Behavior {
    Succeed { file_count: usize },
    Fail(String),
}

/// Mock implementation of [`Processor`].
///
/// Tracks how many calls ran concurrently so tests can assert pool bounds.
pub struct MockProcessor {
    behavior: Behavior,
    delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl MockProcessor {
    /// Processor that succeeds with the given file count.
    pub fn succeeding(file_count: usize) -> Self {
        Self {
            behavior: Behavior::Succeed { file_count },
            delay: None,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Processor that always fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            behavior: Behavior::Fail(message.to_string()),
            delay: None,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold each call open for the given duration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total completed calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Processor for MockProcessor {
    async fn process(&self, _payload: &Value) -> Result<ProcessOutcome, ProcessorError> {
        let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Succeed { file_count } => Ok(ProcessOutcome {
                file_count: *file_count,
                merged_file: None,
            }),
            Behavior::Fail(message) => Err(ProcessorError::Other(message.clone())),
        }
    }
}
