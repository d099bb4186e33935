//! Source registry
//!
//! App definitions are discovered in an ordered list of sources. Order is
//! search priority: when the same app name exists in several namespaces the
//! first one wins, and the losing namespaces are reported as shadowed.

use crate::app::AppDefinition;
use crate::sync::SourceSync;
use berrypatch_core::types::AppRef;
use berrypatch_core::{Error, Result, SourceKind, SourceSpec};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// All apps found in one source
#[derive(Debug, Clone)]
pub struct SourceNamespace {
    name: String,
    kind: SourceKind,
    identifier: String,
    apps_dir: PathBuf,
    apps: BTreeMap<String, AppDefinition>,
}

impl SourceNamespace {
    /// Scan the app directories of one source
    ///
    /// A source whose directory does not exist yet (e.g. a remote that was
    /// never synced) is empty. Malformed app directories are skipped with a
    /// warning.
    pub fn scan(spec: &SourceSpec) -> Result<Self> {
        let apps_dir = spec.apps_dir();
        let identifier = spec
            .url
            .clone()
            .unwrap_or_else(|| spec.path.display().to_string());

        let mut namespace = Self {
            name: spec.name.clone(),
            kind: spec.kind,
            identifier,
            apps_dir: apps_dir.clone(),
            apps: BTreeMap::new(),
        };

        if !apps_dir.is_dir() {
            debug!(
                "Source {} has no app directory at {}",
                spec.name,
                apps_dir.display()
            );
            return Ok(namespace);
        }

        for dir in app_dirs(&apps_dir)? {
            match AppDefinition::load(&dir, &spec.name) {
                Ok(app) => {
                    namespace.apps.insert(app.name().to_string(), app);
                }
                Err(e) => warn!("Skipping malformed app at {}: {}", dir.display(), e),
            }
        }

        debug!("Source {}: {} apps", spec.name, namespace.apps.len());
        Ok(namespace)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Path or remote locator of the source
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn apps_dir(&self) -> &Path {
        &self.apps_dir
    }

    pub fn get(&self, name: &str) -> Option<&AppDefinition> {
        self.apps.get(name)
    }

    /// Apps sorted by name
    pub fn apps(&self) -> impl Iterator<Item = &AppDefinition> {
        self.apps.values()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Sorted, non-hidden subdirectories of `dir`
fn app_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Outcome of looking up an app by name
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub app: &'a AppDefinition,
    /// Lower-priority namespaces that also define this app name
    pub shadowed: &'a [String],
}

impl<'a> Resolution<'a> {
    pub fn namespace(&self) -> &'a str {
        self.app.namespace()
    }

    pub fn is_shadowing(&self) -> bool {
        !self.shadowed.is_empty()
    }
}

/// One row of the app listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppListing {
    pub namespace: String,
    pub name: String,
    pub version: Option<String>,
    pub description: String,
    /// Higher-priority namespace that hides this entry from unqualified lookups
    pub shadowed_by: Option<String>,
}

/// Every known app, across sources in priority order
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    specs: Vec<SourceSpec>,
    namespaces: Vec<SourceNamespace>,
    /// app name -> namespaces defining it, in priority order
    index: BTreeMap<String, Vec<String>>,
}

impl SourceRegistry {
    /// Scan `sources`, keeping their order as search priority
    pub fn scan(sources: &[SourceSpec]) -> Result<Self> {
        let namespaces = sources
            .iter()
            .map(SourceNamespace::scan)
            .collect::<Result<Vec<_>>>()?;

        let mut registry = Self {
            specs: sources.to_vec(),
            namespaces,
            index: BTreeMap::new(),
        };
        registry.rebuild_index();
        Ok(registry)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for namespace in &self.namespaces {
            for app in namespace.apps() {
                self.index
                    .entry(app.name().to_string())
                    .or_default()
                    .push(namespace.name().to_string());
            }
        }
    }

    /// Namespaces in priority order
    pub fn namespaces(&self) -> &[SourceNamespace] {
        &self.namespaces
    }

    pub fn namespace(&self, name: &str) -> Option<&SourceNamespace> {
        self.namespaces.iter().find(|ns| ns.name() == name)
    }

    /// Find an app by name
    ///
    /// With a `namespace_hint` only that namespace is consulted. Without one,
    /// the highest-priority namespace defining `name` wins and the others are
    /// reported in [`Resolution::shadowed`].
    pub fn resolve(&self, name: &str, namespace_hint: Option<&str>) -> Result<Resolution<'_>> {
        if let Some(hint) = namespace_hint {
            let app = self
                .namespace(hint)
                .and_then(|ns| ns.get(name))
                .ok_or_else(|| Error::app_not_found(format!("{}/{}", hint, name)))?;
            return Ok(Resolution { app, shadowed: &[] });
        }

        let owners = self
            .index
            .get(name)
            .ok_or_else(|| Error::app_not_found(name))?;
        let (winner, shadowed) = owners
            .split_first()
            .ok_or_else(|| Error::app_not_found(name))?;
        let app = self
            .namespace(winner)
            .and_then(|ns| ns.get(name))
            .ok_or_else(|| Error::app_not_found(name))?;

        if !shadowed.is_empty() {
            debug!(
                "App {} resolved to {}, shadowing {}",
                name,
                winner,
                shadowed.join(", ")
            );
        }
        Ok(Resolution { app, shadowed })
    }

    pub fn resolve_ref(&self, app_ref: &AppRef) -> Result<Resolution<'_>> {
        self.resolve(&app_ref.name, app_ref.namespace.as_deref())
    }

    /// Every (namespace, app) pair, namespaces in priority order
    pub fn list_apps(&self) -> Vec<AppListing> {
        self.namespaces
            .iter()
            .flat_map(|ns| {
                ns.apps().map(move |app| {
                    let winner = self
                        .index
                        .get(app.name())
                        .and_then(|owners| owners.first())
                        .filter(|owner| owner.as_str() != ns.name());
                    AppListing {
                        namespace: ns.name().to_string(),
                        name: app.name().to_string(),
                        version: app.version().map(str::to_string),
                        description: app.description().to_string(),
                        shadowed_by: winner.cloned(),
                    }
                })
            })
            .collect()
    }

    /// Refresh a remote namespace's mirror and rescan it
    ///
    /// On failure the previous mirror and the in-memory namespace are kept.
    pub async fn sync(&mut self, namespace: &str, syncer: &dyn SourceSync) -> Result<()> {
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == namespace)
            .cloned()
            .ok_or_else(|| Error::sync(namespace, "no such source"))?;

        let url = match (spec.kind, spec.url.as_deref()) {
            (SourceKind::Remote, Some(url)) => url,
            _ => return Err(Error::sync(namespace, "not a remote source")),
        };

        syncer.sync(namespace, url, &spec.path).await?;
        info!("Synced {} from {}", namespace, url);

        let rescanned = SourceNamespace::scan(&spec)?;
        if let Some(slot) = self.namespaces.iter_mut().find(|ns| ns.name() == namespace) {
            *slot = rescanned;
        }
        self.rebuild_index();
        Ok(())
    }

    /// Sync every remote source, returning per-namespace outcomes
    pub async fn sync_all(&mut self, syncer: &dyn SourceSync) -> Vec<(String, Result<()>)> {
        let remotes: Vec<String> = self
            .specs
            .iter()
            .filter(|s| s.kind == SourceKind::Remote)
            .map(|s| s.name.clone())
            .collect();

        let mut outcomes = Vec::with_capacity(remotes.len());
        for name in remotes {
            let outcome = self.sync(&name, syncer).await;
            if let Err(e) = &outcome {
                warn!("Sync of {} failed: {}", name, e);
            }
            outcomes.push((name, outcome));
        }
        outcomes
    }
}
