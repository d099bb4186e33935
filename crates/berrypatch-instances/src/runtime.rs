//! Container runtime adapter

use async_trait::async_trait;
use berrypatch_core::types::RuntimeStatus;
use berrypatch_core::{BerrypatchConfig, Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Compose-style orchestrator consumed by the lifecycle controller
#[async_trait]
pub trait ComposeRuntime: Send + Sync {
    /// Runtime name, for diagnostics
    fn name(&self) -> &'static str;

    /// Create or update the services described by `manifest`
    async fn apply(&self, project: &str, manifest: &Path) -> Result<()>;

    /// Stop and remove the services described by `manifest`
    async fn tear_down(&self, project: &str, manifest: &Path) -> Result<()>;

    /// Live status; any failure to ask is reported as `Unknown`
    async fn status(&self, project: &str, manifest: &Path) -> RuntimeStatus;
}

/// [`ComposeRuntime`] driving `docker compose` (or a compatible CLI)
#[derive(Debug, Clone)]
pub struct DockerComposeRuntime {
    command: Vec<String>,
}

impl DockerComposeRuntime {
    /// `command` is the program followed by its leading arguments,
    /// e.g. `["docker", "compose"]`
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub fn from_config(config: &BerrypatchConfig) -> Self {
        Self::new(config.compose_command.clone())
    }

    fn command_line(&self, project: &str, manifest: &Path, args: &[&str]) -> String {
        format!(
            "{} -p {} -f {} {}",
            self.command.join(" "),
            project,
            manifest.display(),
            args.join(" ")
        )
    }

    async fn compose(
        &self,
        project: &str,
        manifest: &Path,
        args: &[&str],
    ) -> Result<std::process::Output> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| Error::invalid_config("compose command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg("-p")
            .arg(project)
            .arg("-f")
            .arg(manifest)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = manifest.parent() {
            cmd.current_dir(dir);
        }

        debug!("Running: {}", self.command_line(project, manifest, args));
        let output = cmd.output().await.map_err(|e| {
            Error::runtime(self.command_line(project, manifest, args), e.to_string())
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Compose command failed (project: {}): {}", project, stderr);
        }
        Ok(output)
    }

    async fn run_checked(&self, project: &str, manifest: &Path, args: &[&str]) -> Result<()> {
        let output = self.compose(project, manifest, args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::runtime(
                self.command_line(project, manifest, args),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }
}

#[async_trait]
impl ComposeRuntime for DockerComposeRuntime {
    fn name(&self) -> &'static str {
        "docker-compose"
    }

    async fn apply(&self, project: &str, manifest: &Path) -> Result<()> {
        self.run_checked(project, manifest, &["up", "-d", "--remove-orphans"])
            .await
    }

    async fn tear_down(&self, project: &str, manifest: &Path) -> Result<()> {
        self.run_checked(project, manifest, &["down"]).await
    }

    async fn status(&self, project: &str, manifest: &Path) -> RuntimeStatus {
        match self
            .compose(project, manifest, &["ps", "--status", "running", "-q"])
            .await
        {
            Ok(output) if output.status.success() => {
                if String::from_utf8_lossy(&output.stdout).trim().is_empty() {
                    RuntimeStatus::Stopped
                } else {
                    RuntimeStatus::Running
                }
            }
            Ok(_) => RuntimeStatus::Unknown,
            Err(e) => {
                debug!("Status query for {} failed: {}", project, e);
                RuntimeStatus::Unknown
            }
        }
    }
}
