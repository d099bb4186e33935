//! Source fixtures

#![allow(dead_code)]

use berrypatch_core::{BerrypatchConfig, SourceSpec};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary Berrypatch root with the default `local` + `berryfarm` sources
pub struct SourceFixture {
    temp_dir: TempDir,
    config: BerrypatchConfig,
}

impl SourceFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = BerrypatchConfig::for_root(temp_dir.path());
        Self { temp_dir, config }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &BerrypatchConfig {
        &self.config
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.config.sources
    }

    /// App directory of a configured source
    pub fn apps_dir(&self, namespace: &str) -> PathBuf {
        self.config
            .source(namespace)
            .map(SourceSpec::apps_dir)
            .unwrap()
    }

    pub fn local_apps(&self) -> PathBuf {
        self.apps_dir("local")
    }

    pub fn farm_apps(&self) -> PathBuf {
        self.apps_dir("berryfarm")
    }
}
