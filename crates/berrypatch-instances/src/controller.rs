//! Instance lifecycle controller
//!
//! Each operation runs one short protocol under the instance lock:
//! resolve app, resolve configuration, hydrate, commit, transition, then
//! call the runtime. Validation happens before the first write. When the
//! runtime fails after a commit, the state transition is undone and the
//! previous manifest is restored, and the runtime error is returned as is.

use crate::lock::InstanceLock;
use crate::runtime::ComposeRuntime;
use crate::store::{validate_instance_id, InstanceStore};
use berrypatch_apps::{
    AppDefinition, ConfigurationResolver, Overrides, RenderContext, SourceRegistry,
    TemplateHydrator,
};
use berrypatch_core::types::{AppRef, InstanceRecord, InstanceState, RuntimeStatus};
use berrypatch_core::{Error, Result};
use std::fs;
use tracing::{debug, info, warn};

/// Options for [`LifecycleController::install`]
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Instance id; defaults to the app name
    pub instance_id: Option<String>,
    pub overrides: Overrides,
    /// Start the instance once installed
    pub autostart: bool,
}

/// Stored record plus what the runtime reports right now
#[derive(Debug, Clone)]
pub struct InstanceStatus {
    pub record: InstanceRecord,
    pub runtime: RuntimeStatus,
}

/// Outcome of [`LifecycleController::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub instance_id: String,
    /// Re-rendering produces the stored manifest byte for byte
    pub up_to_date: bool,
    pub installed_version: Option<String>,
    pub available_version: Option<String>,
}

/// Orchestrates installs, reconfigures and runtime calls
pub struct LifecycleController {
    registry: SourceRegistry,
    store: InstanceStore,
    runtime: Box<dyn ComposeRuntime>,
    hydrator: TemplateHydrator,
}

impl LifecycleController {
    pub fn new(
        registry: SourceRegistry,
        store: InstanceStore,
        runtime: Box<dyn ComposeRuntime>,
    ) -> Self {
        Self {
            registry,
            store,
            runtime,
            hydrator: TemplateHydrator::new(),
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    /// Install an app as a new instance
    pub async fn install(
        &self,
        app_ref: &AppRef,
        options: InstallOptions,
    ) -> Result<InstanceRecord> {
        let resolution = self.registry.resolve_ref(app_ref)?;
        if resolution.is_shadowing() {
            warn!(
                "Using {} from {}; also defined in {}",
                resolution.app.name(),
                resolution.namespace(),
                resolution.shadowed.join(", ")
            );
        }
        let app = resolution.app;

        let instance_id = options
            .instance_id
            .clone()
            .unwrap_or_else(|| app.name().to_string());
        validate_instance_id(&instance_id)?;

        if self.store.exists(&instance_id) {
            return Err(Error::duplicate_instance(&instance_id));
        }
        let configuration = ConfigurationResolver::new(app).resolve(None, &options.overrides)?;
        let data_dir = self.store.data_dir(&instance_id);
        let manifest = self
            .hydrator
            .render_app(app, &RenderContext::new(&configuration, &data_dir))?;

        // Locking creates the instance directory, so it follows every input check.
        let lock = self.store.lock(&instance_id).await?;
        if self.store.exists(&instance_id) {
            return Err(Error::duplicate_instance(&instance_id));
        }

        let data_dir_existed = data_dir.exists();
        self.store
            .create(&lock, &instance_id, app.identity().clone())?;

        let committed = self
            .store
            .copy_auxiliary_files(&lock, &instance_id, app.dir(), app.auxiliary_files())
            .and_then(|_| {
                self.store.commit(
                    &lock,
                    &instance_id,
                    app.identity().clone(),
                    configuration,
                    &manifest,
                )
            })
            .and_then(|_| {
                self.store
                    .transition(&lock, &instance_id, InstanceState::Configured)
            })
            .and_then(|_| {
                self.store
                    .transition(&lock, &instance_id, InstanceState::Installed)
            });
        let record = match committed {
            Ok(record) => record,
            Err(e) => {
                warn!("Install of {} failed, cleaning up: {}", instance_id, e);
                if let Err(cleanup) = self.store.remove(&lock, &instance_id, !data_dir_existed) {
                    warn!("Cleanup of {} failed: {}", instance_id, cleanup);
                }
                return Err(e);
            }
        };
        info!("Installed {} as {}", app.identity(), instance_id);

        if options.autostart {
            return self.start_locked(&lock, record).await;
        }
        Ok(record)
    }

    /// Re-resolve an instance's configuration with new overrides
    ///
    /// A running instance is re-applied; if that fails the previous manifest
    /// and record are restored.
    pub async fn reconfigure(
        &self,
        instance_id: &str,
        overrides: &Overrides,
    ) -> Result<InstanceRecord> {
        self.rebuild(instance_id, overrides).await
    }

    /// Rebuild an instance against the current app definition
    ///
    /// Carries the stored configuration forward and picks up the app's
    /// current version.
    pub async fn upgrade(&self, instance_id: &str) -> Result<InstanceRecord> {
        let before = self.store.load(instance_id)?;
        let record = self.rebuild(instance_id, &Overrides::new()).await?;
        if before.app.version != record.app.version {
            info!(
                "Upgraded {} from {} to {}",
                instance_id,
                before.app.version.as_deref().unwrap_or("unversioned"),
                record.app.version.as_deref().unwrap_or("unversioned")
            );
        }
        Ok(record)
    }

    async fn rebuild(&self, instance_id: &str, overrides: &Overrides) -> Result<InstanceRecord> {
        let lock = self.store.lock(instance_id).await?;
        let record = self.store.load(instance_id)?;
        if !record.state.is_reconfigurable() {
            return Err(Error::illegal_transition(
                instance_id,
                record.state,
                InstanceState::Configured,
            ));
        }

        let app = self.current_app(&record)?;
        let configuration =
            ConfigurationResolver::new(app).resolve(Some(&record.configuration), overrides)?;
        let manifest = self
            .hydrator
            .render_app(app, &RenderContext::new(&configuration, &record.data_dir))?;

        let committed = self
            .store
            .copy_auxiliary_files(&lock, instance_id, app.dir(), app.auxiliary_files())
            .and_then(|_| {
                self.store.commit(
                    &lock,
                    instance_id,
                    app.identity().clone(),
                    configuration,
                    &manifest,
                )
            })
            .and_then(|_| {
                self.store
                    .transition(&lock, instance_id, InstanceState::Configured)
            })
            .and_then(|_| {
                self.store
                    .transition(&lock, instance_id, InstanceState::Installed)
            });
        let installed = match committed {
            Ok(record) => record,
            Err(e) => {
                warn!("Rebuilding {} failed, restoring it: {}", instance_id, e);
                if let Err(undo) = self.store.rollback(&lock, instance_id) {
                    warn!("Restoring {} failed: {}", instance_id, undo);
                }
                return Err(e);
            }
        };
        info!("Reconfigured {}", instance_id);

        if record.state == InstanceState::Running {
            return self.start_locked(&lock, installed).await;
        }
        // Nothing to apply, so the new manifest stands.
        self.store.discard_backup(&lock, instance_id)?;
        Ok(installed)
    }

    /// Bring an installed or stopped instance up
    pub async fn start(&self, instance_id: &str) -> Result<InstanceRecord> {
        let lock = self.store.lock(instance_id).await?;
        let record = self.store.load(instance_id)?;
        self.start_locked(&lock, record).await
    }

    async fn start_locked(
        &self,
        lock: &InstanceLock,
        record: InstanceRecord,
    ) -> Result<InstanceRecord> {
        let instance_id = record.instance_id.as_str();
        let previous = record.state;
        let running = self
            .store
            .transition(lock, instance_id, InstanceState::Running)?;

        if let Err(e) = self.runtime.apply(instance_id, &running.manifest_path).await {
            warn!("Starting {} failed: {}", instance_id, e);
            self.undo_apply(lock, instance_id, previous)?;
            return Err(e);
        }

        self.store.discard_backup(lock, instance_id)?;
        info!("Started {}", instance_id);
        Ok(running)
    }

    /// Restore the state (and, after an unconfirmed commit, the manifest)
    /// recorded before a failed apply
    fn undo_apply(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
        previous: InstanceState,
    ) -> Result<()> {
        match self.store.rollback(lock, instance_id)? {
            Some(restored) => {
                debug!("Restored {} in state {}", instance_id, restored.state);
            }
            None => {
                self.store.revert(lock, instance_id, previous)?;
            }
        }
        Ok(())
    }

    /// Tear a running instance down
    pub async fn stop(&self, instance_id: &str) -> Result<InstanceRecord> {
        let lock = self.store.lock(instance_id).await?;
        self.stop_locked(&lock, instance_id).await
    }

    async fn stop_locked(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
    ) -> Result<InstanceRecord> {
        let record = self.store.load(instance_id)?;
        let previous = record.state;
        let stopped = self
            .store
            .transition(lock, instance_id, InstanceState::Stopped)?;

        if let Err(e) = self.runtime.tear_down(instance_id, &record.manifest_path).await {
            warn!("Stopping {} failed: {}", instance_id, e);
            self.store.revert(lock, instance_id, previous)?;
            return Err(e);
        }
        info!("Stopped {}", instance_id);
        Ok(stopped)
    }

    /// Tear down (if running) and bring up again
    pub async fn restart(&self, instance_id: &str) -> Result<InstanceRecord> {
        let lock = self.store.lock(instance_id).await?;
        let record = self.store.load(instance_id)?;
        let record = if record.state == InstanceState::Running {
            self.stop_locked(&lock, instance_id).await?
        } else {
            record
        };
        self.start_locked(&lock, record).await
    }

    /// Stored record plus live runtime status
    pub async fn status(&self, instance_id: &str) -> Result<InstanceStatus> {
        let record = self.store.load(instance_id)?;
        let runtime = if record.manifest_path.is_file() {
            self.runtime.status(instance_id, &record.manifest_path).await
        } else {
            RuntimeStatus::Stopped
        };
        Ok(InstanceStatus { record, runtime })
    }

    /// Status of every instance
    pub async fn status_all(&self) -> Result<Vec<InstanceStatus>> {
        let mut statuses = Vec::new();
        for record in self.store.list()? {
            statuses.push(self.status(&record.instance_id).await?);
        }
        Ok(statuses)
    }

    /// Whether rebuilding against the current app would change the manifest
    pub fn check(&self, instance_id: &str) -> Result<CheckReport> {
        let record = self.store.load(instance_id)?;
        let app = self.current_app(&record)?;
        let configuration = ConfigurationResolver::new(app)
            .resolve(Some(&record.configuration), &Overrides::new())?;
        let rendered = self
            .hydrator
            .render_app(app, &RenderContext::new(&configuration, &record.data_dir))?;

        let stored = if record.manifest_path.is_file() {
            Some(fs::read(&record.manifest_path)?)
        } else {
            None
        };

        Ok(CheckReport {
            instance_id: instance_id.to_string(),
            up_to_date: stored.as_deref() == Some(rendered.as_bytes()),
            installed_version: record.app.version.clone(),
            available_version: app.version().map(str::to_string),
        })
    }

    /// Remove an instance, tearing it down first if running
    pub async fn remove(&self, instance_id: &str, wipe_data: bool) -> Result<()> {
        let lock = self.store.lock(instance_id).await?;
        let record = self.store.load(instance_id)?;
        let previous = record.state;
        // A removal interrupted after the transition can be retried.
        if previous != InstanceState::Removed {
            self.store
                .transition(&lock, instance_id, InstanceState::Removed)?;
        }

        if previous == InstanceState::Running {
            if let Err(e) = self.runtime.tear_down(instance_id, &record.manifest_path).await {
                warn!("Tearing down {} failed: {}", instance_id, e);
                self.store.revert(&lock, instance_id, previous)?;
                return Err(e);
            }
        }

        self.store.remove(&lock, instance_id, wipe_data)?;
        info!("Uninstalled {}", instance_id);
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<InstanceRecord>> {
        self.store.list()
    }

    /// The app an instance was installed from, as currently defined
    fn current_app(&self, record: &InstanceRecord) -> Result<&AppDefinition> {
        Ok(self.registry.resolve_ref(&record.app.to_ref())?.app)
    }
}
