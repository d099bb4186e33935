//! Resolved Berrypatch configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default storage root
pub const DEFAULT_ROOT: &str = "/usr/local/Berrypatch";

/// Address of the public app collection
pub const FARM_BASE_ADDRESS: &str = "github.com/berrypatch/berryfarm";

/// Namespace name of the local authoring source
pub const LOCAL_NAMESPACE: &str = "local";

/// Namespace name of the public app collection
pub const FARM_NAMESPACE: &str = "berryfarm";

const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 120;

/// Kind of app source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Directory authored on this device
    Local,
    /// Local mirror of a remote collection
    Remote,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Local => write!(f, "local"),
            SourceKind::Remote => write!(f, "remote"),
        }
    }
}

/// One entry of the source priority list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Namespace name used to qualify app references
    pub name: String,
    pub kind: SourceKind,
    /// Local directory (the mirror for remote sources)
    pub path: PathBuf,
    /// Remote locator for remote sources
    pub url: Option<String>,
    /// Subdirectory of `path` holding app directories
    pub apps_subdir: Option<PathBuf>,
}

impl SourceSpec {
    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Local,
            path: path.into(),
            url: None,
            apps_subdir: None,
        }
    }

    pub fn remote(
        name: impl Into<String>,
        url: impl Into<String>,
        mirror: impl Into<PathBuf>,
        apps_subdir: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Remote,
            path: mirror.into(),
            url: Some(url.into()),
            apps_subdir,
        }
    }

    /// Directory scanned for app subdirectories
    pub fn apps_dir(&self) -> PathBuf {
        match &self.apps_subdir {
            Some(sub) => self.path.join(sub),
            None => self.path.clone(),
        }
    }
}

/// Configuration threaded through every component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BerrypatchConfig {
    /// Storage root; every other path hangs off it
    pub root: PathBuf,
    /// App sources in search priority order (first wins)
    pub sources: Vec<SourceSpec>,
    /// Maximum wait for an instance lock
    pub lock_timeout_secs: u64,
    /// Upper bound for a single source sync step
    pub sync_timeout_secs: u64,
    /// Program and leading arguments of the compose CLI
    pub compose_command: Vec<String>,
}

impl BerrypatchConfig {
    /// Default configuration rooted at `root`
    ///
    /// Sources: the local authoring directory first, then the berryfarm
    /// mirror, so local apps shadow remote ones.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let sources_dir = root.join("sources");
        Self {
            sources: vec![
                SourceSpec::local(LOCAL_NAMESPACE, sources_dir.join(LOCAL_NAMESPACE)),
                SourceSpec::remote(
                    FARM_NAMESPACE,
                    format!("https://{}.git", FARM_BASE_ADDRESS),
                    sources_dir.join(FARM_BASE_ADDRESS),
                    Some(PathBuf::from("apps")),
                ),
            ],
            root,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            sync_timeout_secs: DEFAULT_SYNC_TIMEOUT_SECS,
            compose_command: vec!["docker".to_string(), "compose".to_string()],
        }
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.root.join("instances")
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Look up a source by namespace name
    pub fn source(&self, name: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Resolve a possibly relative path against the root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for BerrypatchConfig {
    fn default() -> Self {
        Self::for_root(DEFAULT_ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = BerrypatchConfig::for_root("/srv/berry");
        assert_eq!(config.instances_dir(), PathBuf::from("/srv/berry/instances"));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "local");
        assert_eq!(
            config.sources[0].apps_dir(),
            PathBuf::from("/srv/berry/sources/local")
        );
        assert_eq!(config.sources[1].kind, SourceKind::Remote);
        assert_eq!(
            config.sources[1].apps_dir(),
            PathBuf::from("/srv/berry/sources/github.com/berrypatch/berryfarm/apps")
        );
    }

    #[test]
    fn test_resolve_path() {
        let config = BerrypatchConfig::for_root("/srv/berry");
        assert_eq!(
            config.resolve_path(Path::new("sources/mine")),
            PathBuf::from("/srv/berry/sources/mine")
        );
        assert_eq!(
            config.resolve_path(Path::new("/opt/apps")),
            PathBuf::from("/opt/apps")
        );
    }
}
