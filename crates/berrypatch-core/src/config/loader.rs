//! Configuration loader with precedence
//!
//! Builds a [`BerrypatchConfig`] from the following sources (low to high):
//! 1. Built-in defaults
//! 2. Optional `<root>/config.yaml`
//! 3. Environment variables (`BERRYPATCH_*`, `FARM_ROOT`)
//! 4. CLI flags (handled by caller)
//!
//! The storage root itself is chosen first (CLI flag, then `BERRYPATCH_ROOT`,
//! then the default) because it locates `config.yaml`.
//!
//! Only the binary calls this loader. Library components receive the
//! resulting value through their constructors and never read the environment.

use super::settings::{BerrypatchConfig, SourceKind, SourceSpec, DEFAULT_ROOT, FARM_NAMESPACE};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the optional configuration file under the root
pub const CONFIG_FILE: &str = "config.yaml";

/// On-disk configuration overlay
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    lock_timeout_secs: Option<u64>,
    sync_timeout_secs: Option<u64>,
    compose_command: Option<Vec<String>>,
    sources: Option<Vec<SourceEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SourceEntry {
    name: String,
    kind: SourceKind,
    path: PathBuf,
    url: Option<String>,
    apps_subdir: Option<PathBuf>,
}

/// Loads configuration for one process invocation
#[derive(Debug, Default)]
pub struct ConfigLoader {
    root_override: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit root (e.g. from `--root`), ignoring `BERRYPATCH_ROOT`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_override: Some(root.into()),
        }
    }

    /// Build the configuration
    pub fn load(&self) -> Result<BerrypatchConfig> {
        let root = self.resolve_root();
        debug!("Using berrypatch root: {}", root.display());

        let mut config = BerrypatchConfig::for_root(root);

        let config_path = config.root.join(CONFIG_FILE);
        if config_path.exists() {
            let file = Self::load_file(&config_path)?;
            config = Self::apply_file(config, file)?;
        }

        Self::apply_env_overrides(&mut config)?;
        Self::validate(&config)?;

        Ok(config)
    }

    fn resolve_root(&self) -> PathBuf {
        if let Some(root) = &self.root_override {
            return root.clone();
        }
        env::var("BERRYPATCH_ROOT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    fn load_file(path: &Path) -> Result<ConfigFile> {
        debug!("Loading configuration overlay from {}", path.display());
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    fn apply_file(mut config: BerrypatchConfig, file: ConfigFile) -> Result<BerrypatchConfig> {
        if let Some(secs) = file.lock_timeout_secs {
            config.lock_timeout_secs = secs;
        }
        if let Some(secs) = file.sync_timeout_secs {
            config.sync_timeout_secs = secs;
        }
        if let Some(command) = file.compose_command {
            config.compose_command = command;
        }
        if let Some(entries) = file.sources {
            config.sources = entries
                .into_iter()
                .map(|entry| SourceSpec {
                    path: config.resolve_path(&entry.path),
                    name: entry.name,
                    kind: entry.kind,
                    url: entry.url,
                    apps_subdir: entry.apps_subdir,
                })
                .collect();
        }
        Ok(config)
    }

    fn apply_env_overrides(config: &mut BerrypatchConfig) -> Result<()> {
        if let Ok(val) = env::var("FARM_ROOT") {
            if let Some(farm) = config.sources.iter_mut().find(|s| s.name == FARM_NAMESPACE) {
                farm.path = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("BERRYPATCH_LOCK_TIMEOUT_SECS") {
            config.lock_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("BERRYPATCH_LOCK_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("BERRYPATCH_SYNC_TIMEOUT_SECS") {
            config.sync_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("BERRYPATCH_SYNC_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("BERRYPATCH_COMPOSE_COMMAND") {
            config.compose_command = val.split_whitespace().map(str::to_string).collect();
        }

        Ok(())
    }

    fn validate(config: &BerrypatchConfig) -> Result<()> {
        if config.compose_command.is_empty() {
            return Err(Error::invalid_config("compose-command must not be empty"));
        }

        let mut seen = HashSet::new();
        for source in &config.sources {
            if source.name.is_empty() || source.name.contains('/') {
                return Err(Error::invalid_config(format!(
                    "Invalid source name '{}': must be non-empty and contain no '/'",
                    source.name
                )));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(Error::invalid_config(format!(
                    "Duplicate source name '{}'",
                    source.name
                )));
            }
            if source.kind == SourceKind::Remote && source.url.is_none() {
                return Err(Error::invalid_config(format!(
                    "Remote source '{}' needs a url",
                    source.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "BERRYPATCH_ROOT",
        "FARM_ROOT",
        "BERRYPATCH_LOCK_TIMEOUT_SECS",
        "BERRYPATCH_SYNC_TIMEOUT_SECS",
        "BERRYPATCH_COMPOSE_COMMAND",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_for_explicit_root() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let config = ConfigLoader::with_root(temp.path()).load().unwrap();
        assert_eq!(config, BerrypatchConfig::for_root(temp.path()));
    }

    #[test]
    #[serial]
    fn test_root_from_env() {
        clear_env();
        let temp = TempDir::new().unwrap();
        env::set_var("BERRYPATCH_ROOT", temp.path());
        let config = ConfigLoader::new().load().unwrap();
        clear_env();
        assert_eq!(config.root, temp.path());
    }

    #[test]
    #[serial]
    fn test_cli_root_beats_env() {
        clear_env();
        let from_flag = TempDir::new().unwrap();
        env::set_var("BERRYPATCH_ROOT", "/nonexistent/berrypatch");
        let config = ConfigLoader::with_root(from_flag.path()).load().unwrap();
        clear_env();
        assert_eq!(config.root, from_flag.path());
    }

    #[test]
    #[serial]
    fn test_file_overlay() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"
lock-timeout-secs: 3
compose-command: [docker-compose]
sources:
  - name: mine
    kind: local
    path: sources/mine
  - name: farm
    kind: remote
    url: https://example.com/farm.git
    path: /opt/farm
    apps-subdir: apps
"#,
        )
        .unwrap();

        let config = ConfigLoader::with_root(temp.path()).load().unwrap();
        assert_eq!(config.lock_timeout_secs, 3);
        assert_eq!(config.sync_timeout_secs, 120);
        assert_eq!(config.compose_command, vec!["docker-compose".to_string()]);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].path, temp.path().join("sources/mine"));
        assert_eq!(config.sources[1].apps_dir(), PathBuf::from("/opt/farm/apps"));
    }

    #[test]
    #[serial]
    fn test_env_beats_file() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "lock-timeout-secs: 3\n").unwrap();
        env::set_var("BERRYPATCH_LOCK_TIMEOUT_SECS", "42");
        env::set_var("FARM_ROOT", "/mnt/farm");
        let config = ConfigLoader::with_root(temp.path()).load().unwrap();
        clear_env();

        assert_eq!(config.lock_timeout_secs, 42);
        assert_eq!(
            config.source(FARM_NAMESPACE).unwrap().path,
            PathBuf::from("/mnt/farm")
        );
    }

    #[test]
    #[serial]
    fn test_invalid_env_number() {
        clear_env();
        let temp = TempDir::new().unwrap();
        env::set_var("BERRYPATCH_SYNC_TIMEOUT_SECS", "soon");
        let result = ConfigLoader::with_root(temp.path()).load();
        clear_env();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    #[serial]
    fn test_remote_without_url_rejected() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "sources:\n  - name: farm\n    kind: remote\n    path: farm\n",
        )
        .unwrap();
        let result = ConfigLoader::with_root(temp.path()).load();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    #[serial]
    fn test_duplicate_source_names_rejected() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "sources:\n  - {name: a, kind: local, path: x}\n  - {name: a, kind: local, path: y}\n",
        )
        .unwrap();
        let result = ConfigLoader::with_root(temp.path()).load();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }
}
