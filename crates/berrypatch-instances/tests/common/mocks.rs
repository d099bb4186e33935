//! Mock container runtime

#![allow(dead_code)]

use async_trait::async_trait;
use berrypatch_core::types::RuntimeStatus;
use berrypatch_core::{Error, Result};
use berrypatch_instances::ComposeRuntime;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Runtime operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOp {
    Apply,
    TearDown,
}

/// Record of one runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCall {
    pub op: RuntimeOp,
    pub project: String,
    pub manifest: PathBuf,
    /// Manifest content at the time of the call
    pub manifest_content: String,
}

/// Recording runtime with injectable failures
///
/// Clones share state, so a test can keep one handle while the controller
/// owns another.
#[derive(Clone, Default)]
pub struct MockRuntime {
    calls: Arc<Mutex<Vec<RuntimeCall>>>,
    failures: Arc<Mutex<HashMap<RuntimeOp, String>>>,
    running: Arc<Mutex<HashMap<String, bool>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `op` fail with `stderr`
    pub fn fail(&self, op: RuntimeOp, stderr: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(op, stderr.to_string());
    }

    pub fn succeed(&self, op: RuntimeOp) {
        self.failures.lock().unwrap().remove(&op);
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: RuntimeOp) -> Vec<RuntimeCall> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    pub fn is_running(&self, project: &str) -> bool {
        self.running
            .lock()
            .unwrap()
            .get(project)
            .copied()
            .unwrap_or(false)
    }

    fn record(&self, op: RuntimeOp, project: &str, manifest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(RuntimeCall {
            op,
            project: project.to_string(),
            manifest: manifest.to_path_buf(),
            manifest_content: fs::read_to_string(manifest).unwrap_or_default(),
        });
        if let Some(stderr) = self.failures.lock().unwrap().get(&op) {
            let command = match op {
                RuntimeOp::Apply => "docker compose up -d",
                RuntimeOp::TearDown => "docker compose down",
            };
            return Err(Error::runtime(command, stderr.clone()));
        }
        self.running
            .lock()
            .unwrap()
            .insert(project.to_string(), op == RuntimeOp::Apply);
        Ok(())
    }
}

#[async_trait]
impl ComposeRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn apply(&self, project: &str, manifest: &Path) -> Result<()> {
        self.record(RuntimeOp::Apply, project, manifest)
    }

    async fn tear_down(&self, project: &str, manifest: &Path) -> Result<()> {
        self.record(RuntimeOp::TearDown, project, manifest)
    }

    async fn status(&self, project: &str, _manifest: &Path) -> RuntimeStatus {
        match self.running.lock().unwrap().get(project) {
            Some(true) => RuntimeStatus::Running,
            Some(false) => RuntimeStatus::Stopped,
            None => RuntimeStatus::Unknown,
        }
    }
}
