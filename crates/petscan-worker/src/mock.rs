//! Mock Image Analyzer
//!
//! For testing purposes - answers without starting a worker.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::analyzer::ImageAnalyzer;
use crate::error::{AnalysisError, InvokeError, WorkerError};
use crate::translate::{translate, AnalysisReport};

#[derive(Debug, Clone)]
enum MockBehavior {
    /// Translate this text as if a worker had printed it
    Output(String),
    /// Fail as if the worker had exited with this code and output
    Exit(i32, String),
    /// Fail as if the worker had run out of time
    Timeout,
}

/// Mock analyzer for testing
///
/// Records every call so tests can assert that rejected requests never
/// reached the analyzer.
#[derive(Debug)]
pub struct MockAnalyzer {
    behavior: MockBehavior,
    calls: AtomicUsize,
    last_image: Mutex<Option<Vec<u8>>>,
}

impl MockAnalyzer {
    /// Succeed with a fixed classification
    pub fn classifying(label: &str) -> Self {
        Self::with_output(
            serde_json::json!({ "success": true, "classification": label }).to_string(),
        )
    }

    /// Respond as if the worker printed `output` and exited 0
    pub fn with_output(output: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Output(output.into()))
    }

    /// Respond as if the worker exited with `code`
    pub fn failing(code: i32, output: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Exit(code, output.into()))
    }

    /// Respond as if the worker timed out
    pub fn timing_out() -> Self {
        Self::with_behavior(MockBehavior::Timeout)
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        }
    }

    /// Number of times `analyze` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bytes passed to the most recent call
    pub fn last_image(&self) -> Option<Vec<u8>> {
        self.last_image.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::classifying("cat")
    }
}

#[async_trait]
impl ImageAnalyzer for MockAnalyzer {
    fn description(&self) -> &str {
        "mock image analyzer"
    }

    async fn analyze(&self, image: &[u8]) -> Result<AnalysisReport, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_image.lock() {
            *last = Some(image.to_vec());
        }

        match &self.behavior {
            MockBehavior::Output(text) => translate(text).map_err(|e: AnalysisError| e.into()),
            MockBehavior::Exit(code, output) => Err(InvokeError::WorkerFailed {
                exit_code: Some(*code),
                output: output.clone(),
            }
            .into()),
            MockBehavior::Timeout => Err(InvokeError::Timeout {
                budget: std::time::Duration::from_secs(60),
            }
            .into()),
        }
    }
}
