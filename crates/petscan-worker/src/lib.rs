//! Out-of-process image analysis
//!
//! Each analysis runs the worker program in its own subprocess:
//!
//! - **Catalog**: worker programs compiled into the binary, copied to a
//!   temporary file per job
//! - **Process Invoker**: stages the upload and the worker, runs
//!   `<interpreter> <worker> <input>` under a time budget, and captures the
//!   merged stdout/stderr stream
//! - **Result Translator**: turns the captured output into a report or a
//!   worker-reported error
//!
//! Staged files are deleted on every exit path, including timeout.
//!
//! ## Usage
//!
//! ```ignore
//! use petscan_worker::{ImageAnalyzer, InvokerConfig, ProcessInvoker, WorkerAnalyzer};
//!
//! let analyzer = WorkerAnalyzer::new(ProcessInvoker::new(InvokerConfig::default()));
//! let report = analyzer.analyze(&image_bytes).await?;
//! println!("Classification: {}", report.classification);
//! ```

pub mod analyzer;
pub mod catalog;
pub mod error;
pub mod invoker;
pub mod mock;
pub mod staging;
pub mod translate;

pub use analyzer::{ImageAnalyzer, WorkerAnalyzer};
pub use catalog::{WorkerCatalog, WorkerProgram, DEFAULT_WORKER};
pub use error::{AnalysisError, InvokeError, Result, WorkerError};
pub use invoker::{InvokerConfig, JobState, ProcessInvoker, ProcessOutcome};
pub use mock::MockAnalyzer;
pub use staging::StagedFile;
pub use translate::{translate, AnalysisMetadata, AnalysisReport, Visualizations};
