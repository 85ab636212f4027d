//! Image analyzers - the seam between request handling and the worker

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{AnalysisError, InvokeError, WorkerError};
use crate::invoker::ProcessInvoker;
use crate::translate::{embedded_error, translate, AnalysisReport};

/// Trait for image analyzers
///
/// The gateway holds one analyzer and calls it once per accepted upload.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyze one image
    ///
    /// # Arguments
    /// * `image` - The raw uploaded bytes
    ///
    /// # Returns
    /// * `Ok(AnalysisReport)` - Translated worker result
    /// * `Err(WorkerError)` - If the worker could not run or reported failure
    async fn analyze(&self, image: &[u8]) -> Result<AnalysisReport, WorkerError>;

    /// Get a description of this analyzer (for logging)
    fn description(&self) -> &str {
        "image analyzer"
    }
}

/// Analyzer that runs the out-of-process worker for every image
#[derive(Debug, Clone)]
pub struct WorkerAnalyzer {
    invoker: ProcessInvoker,
}

impl WorkerAnalyzer {
    pub fn new(invoker: ProcessInvoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl ImageAnalyzer for WorkerAnalyzer {
    fn description(&self) -> &str {
        "subprocess worker analyzer"
    }

    async fn analyze(&self, image: &[u8]) -> Result<AnalysisReport, WorkerError> {
        let outcome = match self.invoker.execute(image).await {
            Ok(outcome) => outcome,
            // A failing worker usually still prints its own failure payload
            Err(InvokeError::WorkerFailed { exit_code, output }) => {
                return Err(match embedded_error(&output) {
                    Some(reported) => {
                        warn!(exit_code = ?exit_code, error = %reported, "Worker exited with a reported failure");
                        WorkerError::Analysis(reported)
                    }
                    None => InvokeError::WorkerFailed { exit_code, output }.into(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let report = translate(&outcome.output).map_err(|e: AnalysisError| {
            warn!(error = %e, "Worker output could not be translated");
            e
        })?;

        info!(
            classification = %report.classification,
            detections = report.detections.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Image analyzed"
        );
        Ok(report)
    }
}
