//! Process Invoker integration tests
//!
//! These run real subprocesses through `/bin/sh` with small shell workers
//! registered in place of the embedded analyzer, and check:
//! 1. OUTCOMES: completed, failed, and timed out jobs are reported as such
//! 2. CLEANUP: no staged file survives a job, whatever its outcome
//! 3. CAPTURE: stderr is merged into stdout and large output is drained
//! 4. DESCENDANTS: helpers the worker forks never hold a job open

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use petscan_worker::{
    ImageAnalyzer, InvokeError, InvokerConfig, ProcessInvoker, WorkerAnalyzer, WorkerCatalog,
    WorkerError, WorkerProgram,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn invoker_for(dir: &Path, script: &str, timeout: Duration) -> ProcessInvoker {
    let catalog = WorkerCatalog::new().with_program(WorkerProgram::new(
        "worker.sh",
        script.as_bytes().to_vec(),
    ));
    ProcessInvoker::with_catalog(
        InvokerConfig::default()
            .with_interpreter("/bin/sh")
            .with_worker("worker.sh")
            .with_timeout(timeout)
            .with_temp_dir(dir),
        catalog,
    )
}

/// Files left in the staging directory, excluding test bookkeeping
fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_none_or(|ext| ext != "pid"))
        .collect()
}

/// Wait briefly for the process recorded in `pid_file` to be gone
async fn assert_exits(pid_file: &Path) {
    if !Path::new("/proc/self").exists() {
        return;
    }
    let pid = std::fs::read_to_string(pid_file).unwrap();
    let proc_entry = PathBuf::from(format!("/proc/{}", pid.trim()));
    // A killed orphan is reaped by init, not by us
    for _ in 0..100 {
        if !proc_entry.exists() || is_zombie(&proc_entry) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("process {} still running", pid.trim());
}

fn is_zombie(proc_entry: &Path) -> bool {
    std::fs::read_to_string(proc_entry.join("stat"))
        .ok()
        .and_then(|stat| stat.rsplit(')').next().map(|rest| rest.trim_start().starts_with('Z')))
        .unwrap_or(false)
}

// =============================================================================
// OUTCOMES
// =============================================================================

#[tokio::test]
async fn test_completed_job_receives_both_paths() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = invoker_for(dir.path(), "echo \"$0 $1\"\ncat \"$1\"\n", Duration::from_secs(10));

    let outcome = invoker.execute(b"PIXELS").await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    let mut lines = outcome.output.lines();
    let args: Vec<&str> = lines.next().unwrap().split(' ').collect();
    assert_eq!(args.len(), 2);
    assert!(args[0].ends_with(".sh"), "worker path: {}", args[0]);
    assert!(args[1].ends_with(".jpg"), "input path: {}", args[1]);
    assert_eq!(lines.next(), Some("PIXELS"));

    assert!(!Path::new(args[0]).exists());
    assert!(!Path::new(args[1]).exists());
    assert!(leftovers(dir.path()).is_empty());
}

#[tokio::test]
async fn test_non_zero_exit_is_failure_with_output() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = invoker_for(
        dir.path(),
        "echo '{\"success\": false, \"error\": \"bad image\"}'\nexit 3\n",
        Duration::from_secs(10),
    );

    let err = invoker.execute(b"img").await.unwrap_err();

    match err {
        InvokeError::WorkerFailed { exit_code, output } => {
            assert_eq!(exit_code, Some(3));
            assert!(output.contains("bad image"));
        }
        other => panic!("expected WorkerFailed, got {:?}", other),
    }
    assert!(leftovers(dir.path()).is_empty());
}

#[tokio::test]
async fn test_timeout_kills_worker_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("worker.pid");
    let script = format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display());
    let invoker = invoker_for(dir.path(), &script, Duration::from_millis(500));

    let started = std::time::Instant::now();
    let err = invoker.execute(b"img").await.unwrap_err();

    assert!(matches!(err, InvokeError::Timeout { budget } if budget == Duration::from_millis(500)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(leftovers(dir.path()).is_empty());

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let proc_entry = PathBuf::from(format!("/proc/{}", pid.trim()));
    if Path::new("/proc/self").exists() {
        // Give the kernel a moment to reap
        for _ in 0..50 {
            if !proc_entry.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!proc_entry.exists(), "worker {} still running", pid.trim());
    }
}

#[tokio::test]
async fn test_background_helper_does_not_hold_completed_job() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("helper.pid");
    let script = format!(
        "sleep 30 &\necho $! > '{}'\necho '{{\"success\": true}}'\n",
        pid_file.display()
    );
    let invoker = invoker_for(dir.path(), &script, Duration::from_secs(5));

    let started = std::time::Instant::now();
    let outcome = invoker.execute(b"img").await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.output, "{\"success\": true}\n");
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(leftovers(dir.path()).is_empty());
    assert_exits(&pid_file).await;
}

#[tokio::test]
async fn test_timeout_kills_forked_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("helper.pid");
    let script = format!("sleep 30 &\necho $! > '{}'\nwait\n", pid_file.display());
    let invoker = invoker_for(dir.path(), &script, Duration::from_millis(500));

    let started = std::time::Instant::now();
    let err = invoker.execute(b"img").await.unwrap_err();

    assert!(matches!(err, InvokeError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(leftovers(dir.path()).is_empty());
    assert_exits(&pid_file).await;
}

#[tokio::test]
async fn test_escaped_output_holder_is_bounded() {
    if std::process::Command::new("setsid").arg("true").status().is_err() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let catalog = WorkerCatalog::new().with_program(WorkerProgram::new(
        "worker.sh",
        b"setsid sleep 2 &\necho done\n".to_vec(),
    ));
    let invoker = ProcessInvoker::with_catalog(
        InvokerConfig::default()
            .with_interpreter("/bin/sh")
            .with_worker("worker.sh")
            .with_timeout(Duration::from_secs(5))
            .with_output_grace(Duration::from_millis(300))
            .with_temp_dir(dir.path()),
        catalog,
    );

    let started = std::time::Instant::now();
    let err = invoker.execute(b"img").await.unwrap_err();

    assert!(matches!(err, InvokeError::Output(_)));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(leftovers(dir.path()).is_empty());
}

#[tokio::test]
async fn test_missing_interpreter_is_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = WorkerCatalog::new().with_program(WorkerProgram::new("worker.sh", b"true".to_vec()));
    let invoker = ProcessInvoker::with_catalog(
        InvokerConfig::default()
            .with_interpreter("/nonexistent/interpreter")
            .with_worker("worker.sh")
            .with_temp_dir(dir.path()),
        catalog,
    );

    let err = invoker.execute(b"img").await.unwrap_err();

    assert!(matches!(err, InvokeError::Spawn(_)));
    assert!(leftovers(dir.path()).is_empty());
}

#[tokio::test]
async fn test_empty_payload_is_staging_error() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = invoker_for(dir.path(), "echo never\n", Duration::from_secs(10));

    let err = invoker.execute(b"").await.unwrap_err();

    assert!(matches!(err, InvokeError::Staging { .. }));
    assert!(leftovers(dir.path()).is_empty());
}

#[tokio::test]
async fn test_unknown_worker_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = ProcessInvoker::with_catalog(
        InvokerConfig::default().with_temp_dir(dir.path()),
        WorkerCatalog::new(),
    );

    let err = invoker.execute(b"img").await.unwrap_err();

    assert!(matches!(err, InvokeError::WorkerMissing(name) if name == "analyze.py"));
    assert!(leftovers(dir.path()).is_empty());
}

// =============================================================================
// CAPTURE
// =============================================================================

#[tokio::test]
async fn test_stderr_is_merged_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = invoker_for(
        dir.path(),
        "echo one\necho two >&2\necho three\n",
        Duration::from_secs(10),
    );

    let outcome = invoker.execute(b"img").await.unwrap();

    assert_eq!(outcome.output, "one\ntwo\nthree\n");
}

#[tokio::test]
async fn test_large_output_is_fully_drained() {
    let dir = tempfile::tempdir().unwrap();
    // Well past any pipe buffer
    let invoker = invoker_for(
        dir.path(),
        "i=0\nwhile [ $i -lt 20000 ]; do echo \"line $i of chatty worker output\"; i=$((i+1)); done\n",
        Duration::from_secs(30),
    );

    let outcome = invoker.execute(b"img").await.unwrap();

    assert_eq!(outcome.output.lines().count(), 20000);
    assert!(outcome.output.ends_with("line 19999 of chatty worker output\n"));
}

// =============================================================================
// ANALYZER
// =============================================================================

#[tokio::test]
async fn test_analyzer_translates_worker_payload() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = invoker_for(
        dir.path(),
        "echo 'loading models...' >&2\necho '{\"success\": true, \"classification\": \"tabby\"}'\n",
        Duration::from_secs(10),
    );
    let analyzer = WorkerAnalyzer::new(invoker);

    let report = analyzer.analyze(b"img").await.unwrap();

    assert_eq!(report.classification, "tabby");
    assert!(report.detections.is_empty());
    assert_eq!(report.metadata.image_width, "0");
}

#[tokio::test]
async fn test_analyzer_surfaces_reported_failure_from_failed_exit() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = invoker_for(
        dir.path(),
        "echo '{\"success\": false, \"error\": \"Model loading failed\", \"traceback\": \"tb\"}'\nexit 1\n",
        Duration::from_secs(10),
    );
    let analyzer = WorkerAnalyzer::new(invoker);

    let err = analyzer.analyze(b"img").await.unwrap_err();

    match err {
        WorkerError::Analysis(e) => {
            assert_eq!(e.message, "Model loading failed");
            assert_eq!(e.traceback.as_deref(), Some("tb"));
        }
        other => panic!("expected Analysis, got {:?}", other),
    }
}

#[tokio::test]
async fn test_analyzer_keeps_unexplained_failure() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = invoker_for(dir.path(), "echo crashed\nexit 139\n", Duration::from_secs(10));
    let analyzer = WorkerAnalyzer::new(invoker);

    let err = analyzer.analyze(b"img").await.unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Invoke(InvokeError::WorkerFailed { exit_code: Some(139), .. })
    ));
}
