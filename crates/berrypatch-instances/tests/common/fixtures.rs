//! Temporary Berrypatch roots

#![allow(dead_code)]

use super::mocks::MockRuntime;
use berrypatch_apps::SourceRegistry;
use berrypatch_core::{BerrypatchConfig, SourceSpec};
use berrypatch_instances::{InstanceStore, LifecycleController};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;

/// An isolated root with the default sources and a mock runtime
pub struct InstanceFixture {
    temp_dir: TempDir,
    config: BerrypatchConfig,
    pub runtime: MockRuntime,
}

impl InstanceFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = BerrypatchConfig::for_root(temp_dir.path());
        config.lock_timeout_secs = 1;
        Self {
            temp_dir,
            config,
            runtime: MockRuntime::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &BerrypatchConfig {
        &self.config
    }

    pub fn local_apps(&self) -> PathBuf {
        self.config
            .source("local")
            .map(SourceSpec::apps_dir)
            .unwrap()
    }

    pub fn farm_apps(&self) -> PathBuf {
        self.config
            .source("berryfarm")
            .map(SourceSpec::apps_dir)
            .unwrap()
    }

    pub fn store(&self) -> InstanceStore {
        InstanceStore::new(self.config.instances_dir(), Duration::from_millis(200))
    }

    /// Controller over a fresh scan of the sources
    pub fn controller(&self) -> LifecycleController {
        let registry = SourceRegistry::scan(&self.config.sources).unwrap();
        LifecycleController::new(registry, self.store(), Box::new(self.runtime.clone()))
    }

    pub fn manifest(&self, instance_id: &str) -> String {
        fs::read_to_string(self.store().manifest_path(instance_id)).unwrap()
    }

    /// Every path under the root, relative and sorted
    pub fn snapshot(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(self.root())
            .min_depth(1)
            .into_iter()
            .map(|entry| {
                entry
                    .unwrap()
                    .path()
                    .strip_prefix(self.root())
                    .unwrap()
                    .to_path_buf()
            })
            .collect();
        paths.sort();
        paths
    }
}
