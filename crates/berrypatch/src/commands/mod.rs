//! Command implementations
//!
//! Every command loads the configuration once and builds the components it
//! needs from it.

pub mod apps;
pub mod check;
pub mod install;
pub mod instance;
pub mod status;
pub mod update;

use std::path::Path;

use anyhow::{Context, Result};
use berrypatch_apps::SourceRegistry;
use berrypatch_core::{BerrypatchConfig, ConfigLoader};
use berrypatch_instances::{DockerComposeRuntime, InstanceStore, LifecycleController};

fn load_config(root: Option<&Path>) -> Result<BerrypatchConfig> {
    let loader = match root {
        Some(root) => ConfigLoader::with_root(root),
        None => ConfigLoader::new(),
    };
    loader.load().context("Failed to load configuration")
}

fn load_registry(config: &BerrypatchConfig) -> Result<SourceRegistry> {
    SourceRegistry::scan(&config.sources).context("Failed to scan app sources")
}

fn controller(root: Option<&Path>) -> Result<LifecycleController> {
    let config = load_config(root)?;
    let registry = load_registry(&config)?;
    Ok(LifecycleController::new(
        registry,
        InstanceStore::from_config(&config),
        Box::new(DockerComposeRuntime::from_config(&config)),
    ))
}

fn instance_store(root: Option<&Path>) -> Result<InstanceStore> {
    Ok(InstanceStore::from_config(&load_config(root)?))
}

fn format_version(version: Option<&str>) -> String {
    version.unwrap_or("-").to_string()
}

fn format_timestamp(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
