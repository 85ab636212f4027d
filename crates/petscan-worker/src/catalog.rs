//! Worker programs shipped inside this binary
//!
//! The analysis worker has no stable location on disk: it is compiled into
//! the gateway and copied to a fresh temporary file for every job. The
//! catalog maps resource names (the `PETSCAN_WORKER_SCRIPT` setting) to
//! program bytes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Resource name of the built-in image analysis worker
pub const DEFAULT_WORKER: &str = "analyze.py";

const ANALYZE_PY: &[u8] = include_bytes!("../resources/analyze.py");

/// A named worker program
#[derive(Debug, Clone)]
pub struct WorkerProgram {
    name: String,
    source: Cow<'static, [u8]>,
}

impl WorkerProgram {
    /// Create a program from its resource name and contents
    pub fn new(name: impl Into<String>, source: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// File stem used as the staged copy's prefix, e.g. `analyze-`
    pub(crate) fn temp_prefix(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("worker");
        format!("{}-", stem)
    }

    /// Extension (with dot) kept on the staged copy, e.g. `.py`
    pub(crate) fn temp_suffix(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default()
    }
}

/// Registry of worker programs available for staging
#[derive(Debug, Clone, Default)]
pub struct WorkerCatalog {
    programs: HashMap<String, WorkerProgram>,
}

impl WorkerCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every program compiled into this crate
    pub fn embedded() -> Self {
        Self::new().with_program(WorkerProgram::new(DEFAULT_WORKER, ANALYZE_PY))
    }

    /// Register a program, replacing any previous one with the same name
    pub fn register(&mut self, program: WorkerProgram) {
        info!(
            name = %program.name,
            bytes = program.source.len(),
            "Registered worker program"
        );
        self.programs.insert(program.name.clone(), program);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_program(mut self, program: WorkerProgram) -> Self {
        self.register(program);
        self
    }

    /// Look up a program by resource name
    pub fn get(&self, name: &str) -> Option<&WorkerProgram> {
        self.programs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Names of all registered programs
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.programs.keys().cloned().collect();
        names.sort();
        names
    }
}
