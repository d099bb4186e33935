//! Remote source synchronization
//!
//! Keeps the local mirror of a remote app collection up to date. Every sync
//! clones into a staging sibling first. A new mirror is that staging
//! directory renamed into place; an existing one is moved aside, replaced,
//! and deleted afterwards. A sync interrupted between those two renames is
//! repaired by the next one.

use async_trait::async_trait;
use berrypatch_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Refreshes a local mirror from a remote locator
///
/// Implementations must be idempotent and leave `mirror` untouched on
/// failure.
#[async_trait]
pub trait SourceSync: Send + Sync {
    async fn sync(&self, namespace: &str, url: &str, mirror: &Path) -> Result<()>;
}

/// [`SourceSync`] backed by the `git` CLI
#[derive(Debug, Clone)]
pub struct GitSync {
    timeout: Duration,
}

impl GitSync {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn git(&self, namespace: &str, args: &[&str], cwd: Option<&Path>) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!("Running: git {}", args.join(" "));
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::sync(
                    namespace,
                    format!(
                        "git {} timed out after {}s",
                        args.first().copied().unwrap_or_default(),
                        self.timeout.as_secs()
                    ),
                )
            })?
            .map_err(|e| Error::sync(namespace, format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::sync(namespace, stderr.trim().to_string()));
        }
        Ok(())
    }

    /// Shallow-clone `url` into the staging sibling of `mirror`
    async fn clone_to_staging(&self, namespace: &str, url: &str, mirror: &Path) -> Result<PathBuf> {
        let staging = sibling_path(mirror, STAGING_SUFFIX);
        if let Some(parent) = mirror.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if staging.exists() {
            tokio::fs::remove_dir_all(&staging).await?;
        }

        let staging_str = staging.to_string_lossy();
        let cloned = self
            .git(namespace, &["clone", "--depth", "1", url, &staging_str], None)
            .await;
        if let Err(e) = cloned {
            if staging.exists() {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                    warn!("Failed to clean up {}: {}", staging.display(), cleanup);
                }
            }
            return Err(e);
        }
        Ok(staging)
    }
}

#[async_trait]
impl SourceSync for GitSync {
    async fn sync(&self, namespace: &str, url: &str, mirror: &Path) -> Result<()> {
        restore_interrupted_swap(mirror).await?;
        if mirror.exists() && !mirror.join(".git").exists() {
            return Err(Error::sync(
                namespace,
                format!(
                    "{} exists but is not a git checkout; refusing to overwrite it",
                    mirror.display()
                ),
            ));
        }

        let staging = self.clone_to_staging(namespace, url, mirror).await?;
        if mirror.exists() {
            info!("Replacing {} mirror at {}", namespace, mirror.display());
            swap_into_place(&staging, mirror).await
        } else {
            info!("Cloned {} into {}", url, mirror.display());
            tokio::fs::rename(&staging, mirror).await?;
            Ok(())
        }
    }
}

const STAGING_SUFFIX: &str = "staging";
const RETIRED_SUFFIX: &str = "old";

/// `.<name>.<suffix>` beside `mirror`
fn sibling_path(mirror: &Path, suffix: &str) -> PathBuf {
    let name = mirror
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mirror".to_string());
    mirror.with_file_name(format!(".{}.{}", name, suffix))
}

/// Replace `mirror` with the complete checkout at `staging`
///
/// The old mirror is put back if the second rename fails.
async fn swap_into_place(staging: &Path, mirror: &Path) -> Result<()> {
    let retired = sibling_path(mirror, RETIRED_SUFFIX);
    if retired.exists() {
        tokio::fs::remove_dir_all(&retired).await?;
    }

    tokio::fs::rename(mirror, &retired).await?;
    if let Err(e) = tokio::fs::rename(staging, mirror).await {
        tokio::fs::rename(&retired, mirror).await?;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::remove_dir_all(&retired).await {
        warn!("Failed to remove {}: {}", retired.display(), e);
    }
    Ok(())
}

/// Finish or undo a swap that stopped between its renames
async fn restore_interrupted_swap(mirror: &Path) -> Result<()> {
    let retired = sibling_path(mirror, RETIRED_SUFFIX);
    if !retired.exists() {
        return Ok(());
    }
    if mirror.exists() {
        debug!("Removing leftover {}", retired.display());
        tokio::fs::remove_dir_all(&retired).await?;
    } else {
        warn!("Restoring {} from an interrupted sync", mirror.display());
        tokio::fs::rename(&retired, mirror).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sibling_paths() {
        let mirror = Path::new("/srv/sources/berryfarm");
        assert_eq!(
            sibling_path(mirror, STAGING_SUFFIX),
            PathBuf::from("/srv/sources/.berryfarm.staging")
        );
        assert_eq!(
            sibling_path(mirror, RETIRED_SUFFIX),
            PathBuf::from("/srv/sources/.berryfarm.old")
        );
    }

    #[tokio::test]
    async fn test_swap_replaces_whole_mirror() {
        let temp = TempDir::new().unwrap();
        let mirror = temp.path().join("farm");
        let staging = sibling_path(&mirror, STAGING_SUFFIX);
        std::fs::create_dir_all(mirror.join("apps/gone")).unwrap();
        std::fs::write(mirror.join("apps/gone/berry.json"), "{}").unwrap();
        std::fs::create_dir_all(staging.join("apps/web")).unwrap();
        std::fs::write(staging.join("apps/web/berry.json"), "{}").unwrap();

        swap_into_place(&staging, &mirror).await.unwrap();

        assert!(mirror.join("apps/web/berry.json").is_file());
        assert!(!mirror.join("apps/gone").exists());
        assert!(!staging.exists());
        assert!(!sibling_path(&mirror, RETIRED_SUFFIX).exists());
    }

    #[tokio::test]
    async fn test_interrupted_swap_is_repaired() {
        let temp = TempDir::new().unwrap();
        let mirror = temp.path().join("farm");
        let retired = sibling_path(&mirror, RETIRED_SUFFIX);

        // Stopped after moving the old mirror aside.
        std::fs::create_dir_all(&retired).unwrap();
        std::fs::write(retired.join("keep.txt"), "old").unwrap();
        restore_interrupted_swap(&mirror).await.unwrap();
        assert_eq!(std::fs::read_to_string(mirror.join("keep.txt")).unwrap(), "old");
        assert!(!retired.exists());

        // Stopped after the new mirror was in place.
        std::fs::create_dir_all(&retired).unwrap();
        restore_interrupted_swap(&mirror).await.unwrap();
        assert!(mirror.join("keep.txt").is_file());
        assert!(!retired.exists());
    }

    #[tokio::test]
    async fn test_refuses_non_git_directory() {
        let temp = TempDir::new().unwrap();
        let mirror = temp.path().join("farm");
        std::fs::create_dir_all(&mirror).unwrap();
        std::fs::write(mirror.join("keep.txt"), "data").unwrap();

        let sync = GitSync::new(Duration::from_secs(5));
        let err = sync
            .sync("berryfarm", "https://invalid.example/farm.git", &mirror)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sync { .. }));
        assert!(mirror.join("keep.txt").exists());
    }
}
