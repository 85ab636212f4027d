//! Process Invoker
//!
//! Runs the analysis worker out of process, one subprocess per job:
//!
//! 1. **Staging**: the uploaded payload and the embedded worker program are
//!    written to fresh temporary files
//! 2. **Running**: `<interpreter> <worker> <input>` is spawned with stderr
//!    merged into stdout; the combined stream is drained while waiting for
//!    exit under a wall-clock budget
//! 3. **Completed | TimedOut | Failed**: the outcome is reported and every
//!    staged file is deleted
//!
//! Staged files are owned by the job. `run` consumes them, so they are gone
//! by the time it returns, whichever way it returns. The child is spawned
//! with kill-on-drop, so dropping an in-flight job also ends the worker.
//!
//! On unix the worker leads its own process group. The budget bounds the
//! worker's own exit; once it exits or times out the whole group is killed,
//! so forked helpers neither outlive the job nor hold its output open.

use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{WorkerCatalog, DEFAULT_WORKER};
use crate::error::{InvokeError, Result};
use crate::staging::StagedFile;

/// Default worker interpreter
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Default execution budget (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default time allowed for the output stream to close after the worker exits
pub const DEFAULT_OUTPUT_GRACE_MILLIS: u64 = 2_000;

/// Lifecycle of a single analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Staging,
    Running,
    Completed,
    TimedOut,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Staging => write!(f, "staging"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::TimedOut => write!(f, "timed_out"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Configuration for worker execution
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Program used to run the worker (e.g. `python3`, `/bin/sh`)
    pub interpreter: PathBuf,
    /// Resource name of the worker in the catalog
    pub worker: String,
    /// Wall-clock budget per job
    pub timeout: Duration,
    /// Directory for staged files (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
    /// How long leftover descendants may hold the output open after the
    /// worker itself exits before they are killed
    pub output_grace: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            worker: DEFAULT_WORKER.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temp_dir: None,
            output_grace: Duration::from_millis(DEFAULT_OUTPUT_GRACE_MILLIS),
        }
    }
}

impl InvokerConfig {
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.worker = worker.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_output_grace(mut self, grace: Duration) -> Self {
        self.output_grace = grace;
        self
    }
}

/// Result of a worker that exited successfully within its budget
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    /// Combined stdout + stderr, lossily decoded as UTF-8
    pub output: String,
    pub elapsed: Duration,
}

/// Stages and supervises worker subprocesses
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    config: InvokerConfig,
    catalog: Arc<WorkerCatalog>,
}

impl ProcessInvoker {
    /// Create an invoker backed by the embedded worker catalog
    pub fn new(config: InvokerConfig) -> Self {
        Self::with_catalog(config, WorkerCatalog::embedded())
    }

    /// Create an invoker with a custom catalog
    pub fn with_catalog(config: InvokerConfig, catalog: WorkerCatalog) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
        }
    }

    /// Whether the configured worker resolves in the catalog
    pub fn has_worker(&self) -> bool {
        self.catalog.contains(&self.config.worker)
    }

    /// Stage, run and clean up one job with the configured budget
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn execute(&self, payload: &[u8]) -> Result<ProcessOutcome> {
        debug!(state = %JobState::Staging, "Analysis job created");

        // Staging is plain file I/O; keep it off the async workers
        let invoker = self.clone();
        let payload = payload.to_vec();
        let (worker, input) = tokio::task::spawn_blocking(move || {
            let input = invoker.stage_input(&payload)?;
            let worker = invoker.stage_worker()?;
            Ok::<_, InvokeError>((worker, input))
        })
        .await
        .map_err(|e| staging_failed("job", e))??;

        self.run(worker, input, self.config.timeout).await
    }

    /// Write the payload to a fresh temporary file
    pub fn stage_input(&self, payload: &[u8]) -> Result<StagedFile> {
        let mut file = self
            .temp_file("pet-", ".jpg")
            .map_err(|e| staging_failed("input", e))?;
        file.write_all(payload)
            .and_then(|()| file.flush())
            .map_err(|e| staging_failed("input", e))?;
        let written = file
            .as_file()
            .metadata()
            .map(|m| m.len())
            .map_err(|e| staging_failed("input", e))?;

        let staged = StagedFile::new(file.into_temp_path(), "input");
        if written == 0 {
            return Err(staging_failed("input", "no bytes were written"));
        }

        info!(path = %staged.path().display(), bytes = written, "Temporary input created");
        Ok(staged)
    }

    /// Copy the configured worker program to a fresh executable temp file
    pub fn stage_worker(&self) -> Result<StagedFile> {
        let program = self.catalog.get(&self.config.worker).ok_or_else(|| {
            error!(
                worker = %self.config.worker,
                available = ?self.catalog.names(),
                "Worker program not found"
            );
            InvokeError::WorkerMissing(self.config.worker.clone())
        })?;

        let mut file = self
            .temp_file(&program.temp_prefix(), &program.temp_suffix())
            .map_err(|e| staging_failed("worker", e))?;
        let mut source = program.source();
        let copied = std::io::copy(&mut source, &mut file)
            .and_then(|n| file.flush().map(|()| n))
            .map_err(|e| staging_failed("worker", e))?;

        let staged = StagedFile::new(file.into_temp_path(), "worker");
        if copied != program.source().len() as u64 {
            return Err(staging_failed(
                "worker",
                format!("copied {} of {} bytes", copied, program.source().len()),
            ));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(0o755))
                .map_err(|e| staging_failed("worker", e))?;
        }

        info!(path = %staged.path().display(), worker = %program.name(), "Worker program staged");
        Ok(staged)
    }

    /// Run a staged worker against a staged input
    ///
    /// Both staged files are consumed and deleted before this returns.
    #[instrument(
        skip_all,
        fields(
            worker = %worker.path().display(),
            input = %input.path().display(),
            budget = ?budget,
        )
    )]
    pub async fn run(
        &self,
        worker: StagedFile,
        input: StagedFile,
        budget: Duration,
    ) -> Result<ProcessOutcome> {
        // One pipe for both streams so the output keeps the worker's ordering
        let (mut reader, writer) = std::io::pipe()
            .map_err(|e| InvokeError::Spawn(format!("failed to create output pipe: {}", e)))?;
        let stderr_writer = writer
            .try_clone()
            .map_err(|e| InvokeError::Spawn(format!("failed to clone output pipe: {}", e)))?;

        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(worker.path())
            .arg(input.path())
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        // Own process group, so helpers the worker forks die with it
        #[cfg(unix)]
        command.process_group(0);

        debug!(command = ?command, "Spawning worker");
        let spawned = command.spawn();
        // The parent's write ends must close or the drain never sees EOF
        drop(command);

        let mut child = spawned.map_err(|e| {
            error!(
                interpreter = %self.config.interpreter.display(),
                error = %e,
                "Failed to spawn worker"
            );
            InvokeError::Spawn(format!("{}: {}", self.config.interpreter.display(), e))
        })?;

        let group = child.id();
        debug!(state = %JobState::Running, pid = ?group, "Worker started");
        let started = Instant::now();

        let mut drain = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });

        // The budget covers the worker only; descendants holding the pipe
        // open are dealt with below
        let status = match tokio::time::timeout(budget, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                error!(error = %e, "Lost track of worker");
                kill_group(group);
                if let Err(kill_err) = child.start_kill() {
                    warn!(error = %kill_err, "Failed to kill worker");
                }
                return Err(InvokeError::Output(e.to_string()));
            }
            Err(_) => {
                warn!(
                    state = %JobState::TimedOut,
                    budget = ?budget,
                    "Worker exceeded its budget, killing"
                );
                kill_group(group);
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill worker");
                }
                if tokio::time::timeout(self.config.output_grace, &mut drain)
                    .await
                    .is_err()
                {
                    warn!("Worker output still open after kill");
                }
                return Err(InvokeError::Timeout { budget });
            }
        };

        // Whatever the worker left running in its group goes with it; bytes
        // already in the pipe stay readable
        kill_group(group);

        let bytes = match tokio::time::timeout(self.config.output_grace, &mut drain).await {
            Ok(Ok(Ok(bytes))) => bytes,
            Ok(Ok(Err(e))) => return Err(output_lost(e)),
            Ok(Err(e)) => return Err(output_lost(e)),
            Err(_) => {
                return Err(output_lost(format!(
                    "output still open {:?} after worker exit",
                    self.config.output_grace
                )));
            }
        };

        let elapsed = started.elapsed();
        let output = String::from_utf8_lossy(&bytes).into_owned();
        for line in output.lines() {
            debug!(target: "worker", "{}", line);
        }

        match status.code() {
            Some(0) => {
                info!(
                    state = %JobState::Completed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    output_bytes = bytes.len(),
                    "Worker completed"
                );
                Ok(ProcessOutcome {
                    exit_code: 0,
                    output,
                    elapsed,
                })
            }
            exit_code => {
                warn!(
                    state = %JobState::Failed,
                    exit_code = ?exit_code,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Worker failed"
                );
                Err(InvokeError::WorkerFailed { exit_code, output })
            }
        }
    }

    fn temp_file(&self, prefix: &str, suffix: &str) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix(suffix);
        match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

fn output_lost(err: impl fmt::Display) -> InvokeError {
    error!(error = %err, "Lost worker output");
    InvokeError::Output(err.to_string())
}

/// SIGKILL every process left in the worker's group
#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = group else {
        return;
    };
    match signal::killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "Killed worker process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "Failed to kill worker process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

fn staging_failed(what: &'static str, err: impl fmt::Display) -> InvokeError {
    let err = InvokeError::staging(what, err);
    error!(error = %err, "Staging failed");
    err
}
