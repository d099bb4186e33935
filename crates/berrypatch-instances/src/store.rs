//! Instance store
//!
//! One directory per instance under `<root>/instances`:
//!
//! ```text
//! instances/
//! ├── .grafana.lock
//! └── grafana/
//!     ├── berry-meta.json
//!     ├── docker-compose.yml
//!     ├── docker-compose.yml.bak   (only between commit and confirmed apply)
//!     ├── berry-meta.json.bak
//!     ├── .aux.bak/                (auxiliary files replaced by that commit)
//!     └── appdata/
//! ```
//!
//! Every file write goes through a temp file in the same directory followed
//! by a rename, so readers never observe a partial manifest or record.

use crate::lock::InstanceLock;
use berrypatch_apps::is_valid_app_name;
use berrypatch_core::types::{
    AppIdentity, InstanceRecord, InstanceState, ResolvedConfiguration, INSTANCE_DATA_DIR,
    INSTANCE_MANIFEST_FILE, INSTANCE_METADATA_FILE,
};
use berrypatch_core::{BerrypatchConfig, Error, Result};
use chrono::Utc;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const BACKUP_SUFFIX: &str = "bak";
const AUX_BACKUP_DIR: &str = ".aux.bak";
const AUX_SAVED_DIR: &str = "files";
const AUX_ADDED_FILE: &str = "added.json";

/// Durable, file-backed instance records
#[derive(Debug, Clone)]
pub struct InstanceStore {
    instances_dir: PathBuf,
    lock_timeout: Duration,
}

/// A fully written manifest waiting to replace the live one
///
/// Dropping it without [`InstanceStore::promote`] deletes the temp file and
/// leaves the live manifest untouched.
#[derive(Debug)]
pub struct StagedManifest {
    instance_id: String,
    temp: NamedTempFile,
}

impl StagedManifest {
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

impl InstanceStore {
    pub fn new(instances_dir: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            instances_dir: instances_dir.into(),
            lock_timeout,
        }
    }

    pub fn from_config(config: &BerrypatchConfig) -> Self {
        Self::new(config.instances_dir(), config.lock_timeout())
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    pub fn instance_dir(&self, instance_id: &str) -> PathBuf {
        self.instances_dir.join(instance_id)
    }

    pub fn metadata_path(&self, instance_id: &str) -> PathBuf {
        self.instance_dir(instance_id).join(INSTANCE_METADATA_FILE)
    }

    pub fn manifest_path(&self, instance_id: &str) -> PathBuf {
        self.instance_dir(instance_id).join(INSTANCE_MANIFEST_FILE)
    }

    pub fn data_dir(&self, instance_id: &str) -> PathBuf {
        self.instance_dir(instance_id).join(INSTANCE_DATA_DIR)
    }

    pub fn lock_path(&self, instance_id: &str) -> PathBuf {
        self.instances_dir.join(format!(".{}.lock", instance_id))
    }

    /// Take the instance's exclusive lock, waiting up to the lock timeout
    pub async fn lock(&self, instance_id: &str) -> Result<InstanceLock> {
        validate_instance_id(instance_id)?;
        InstanceLock::acquire(instance_id, &self.lock_path(instance_id), self.lock_timeout).await
    }

    /// [`lock`](Self::lock) for callers outside a runtime
    pub fn lock_blocking(&self, instance_id: &str) -> Result<InstanceLock> {
        validate_instance_id(instance_id)?;
        InstanceLock::acquire_blocking(instance_id, &self.lock_path(instance_id), self.lock_timeout)
    }

    pub fn exists(&self, instance_id: &str) -> bool {
        self.metadata_path(instance_id).is_file()
    }

    /// Create a NEW instance record and its data directory
    ///
    /// A data directory left behind by an earlier removal without wipe is
    /// reused.
    pub fn create(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
        app: AppIdentity,
    ) -> Result<InstanceRecord> {
        self.check_lock(lock, instance_id)?;
        if self.exists(instance_id) {
            return Err(Error::duplicate_instance(instance_id));
        }

        let data_dir = self.data_dir(instance_id);
        fs::create_dir_all(&data_dir)?;

        let now = Utc::now();
        let record = InstanceRecord {
            instance_id: instance_id.to_string(),
            app,
            state: InstanceState::New,
            configuration: ResolvedConfiguration::new(),
            manifest_path: self.manifest_path(instance_id),
            data_dir,
            installed_at: now,
            updated_at: now,
        };
        self.save(&record)?;
        info!("Created instance {} ({})", instance_id, record.app);
        Ok(record)
    }

    /// Load an instance record
    pub fn load(&self, instance_id: &str) -> Result<InstanceRecord> {
        validate_instance_id(instance_id)?;
        let path = self.metadata_path(instance_id);
        if !path.is_file() {
            return Err(Error::instance_not_found(instance_id));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every readable instance, sorted by id
    pub fn list(&self) -> Result<Vec<InstanceRecord>> {
        if !self.instances_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.instances_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str() {
                if is_valid_app_name(id) {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.exists(&id) {
                continue;
            }
            match self.load(&id) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable instance {}: {}", id, e),
            }
        }
        Ok(records)
    }

    /// Write `manifest_text` to a temp file beside the live manifest
    pub fn stage_manifest(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
        manifest_text: &str,
    ) -> Result<StagedManifest> {
        self.check_lock(lock, instance_id)?;
        let dir = self.instance_dir(instance_id);
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(manifest_text.as_bytes())?;
        temp.as_file().sync_all()?;
        debug!("Staged manifest for {} at {}", instance_id, temp.path().display());

        Ok(StagedManifest {
            instance_id: instance_id.to_string(),
            temp,
        })
    }

    /// Atomically replace the live manifest and update the record
    ///
    /// When a manifest already exists, it and the current record are backed
    /// up first so [`InstanceStore::rollback`] can restore them. The new
    /// record is fully written to a temp file before the manifest is
    /// renamed into place, leaving only the second rename between the two
    /// files agreeing again.
    pub fn promote(
        &self,
        lock: &InstanceLock,
        staged: StagedManifest,
        app: AppIdentity,
        configuration: ResolvedConfiguration,
    ) -> Result<InstanceRecord> {
        let instance_id = staged.instance_id.clone();
        self.check_lock(lock, &instance_id)?;
        let mut record = self.load(&instance_id)?;

        let manifest_path = self.manifest_path(&instance_id);
        if manifest_path.is_file() {
            copy_atomic(&manifest_path, &backup_path(&manifest_path))?;
            copy_atomic(
                &self.metadata_path(&instance_id),
                &backup_path(&self.metadata_path(&instance_id)),
            )?;
        }

        record.app = app;
        record.configuration = configuration;
        record.manifest_path = manifest_path.clone();
        record.updated_at = Utc::now();
        let metadata_path = self.metadata_path(&instance_id);
        let staged_record = stage_file(&metadata_path, &record_json(&record)?)?;

        staged
            .temp
            .persist(&manifest_path)
            .map_err(|e| Error::Io(e.error))?;
        staged_record
            .persist(&metadata_path)
            .map_err(|e| Error::Io(e.error))?;

        info!("Committed manifest for {}", instance_id);
        Ok(record)
    }

    /// Stage and promote in one step
    pub fn commit(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
        app: AppIdentity,
        configuration: ResolvedConfiguration,
        manifest_text: &str,
    ) -> Result<InstanceRecord> {
        let staged = self.stage_manifest(lock, instance_id, manifest_text)?;
        self.promote(lock, staged, app, configuration)
    }

    /// Copy auxiliary app files into the instance directory
    ///
    /// Paths are relative to `source_dir`. Files that would land on the
    /// record, the manifest, a backup or the data directory are skipped.
    ///
    /// Once the instance has a manifest, the files about to be replaced are
    /// saved first and [`InstanceStore::rollback`] puts them back.
    pub fn copy_auxiliary_files(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
        source_dir: &Path,
        files: &[PathBuf],
    ) -> Result<()> {
        self.check_lock(lock, instance_id)?;
        let dir = self.instance_dir(instance_id);
        let files: Vec<&Path> = files
            .iter()
            .map(PathBuf::as_path)
            .filter(|rel_path| {
                let reserved = is_reserved(rel_path);
                if reserved {
                    warn!(
                        "Not copying {} into {}: reserved path",
                        rel_path.display(),
                        instance_id
                    );
                }
                !reserved
            })
            .collect();

        if self.manifest_path(instance_id).is_file() {
            save_auxiliary_files(&dir, &files)?;
        }
        for rel_path in files {
            let content = fs::read(source_dir.join(rel_path))?;
            write_atomic(&dir.join(rel_path), &content)?;
        }
        Ok(())
    }

    /// Move along a legal edge of the state machine
    pub fn transition(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
        next: InstanceState,
    ) -> Result<InstanceRecord> {
        self.check_lock(lock, instance_id)?;
        let mut record = self.load(instance_id)?;
        if !record.state.can_transition_to(next) {
            return Err(Error::illegal_transition(instance_id, record.state, next));
        }
        debug!("{}: {} -> {}", instance_id, record.state, next);
        record.state = next;
        record.updated_at = Utc::now();
        self.save(&record)?;
        Ok(record)
    }

    /// Restore a state recorded before a failed runtime call
    ///
    /// Unlike [`InstanceStore::transition`] this ignores the edge table; it
    /// only ever undoes a transition made under the same lock.
    pub fn revert(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
        previous: InstanceState,
    ) -> Result<InstanceRecord> {
        self.check_lock(lock, instance_id)?;
        let mut record = self.load(instance_id)?;
        warn!("Reverting {} from {} to {}", instance_id, record.state, previous);
        record.state = previous;
        record.updated_at = Utc::now();
        self.save(&record)?;
        Ok(record)
    }

    /// Whether a commit left backups that have not been confirmed yet
    pub fn has_backup(&self, instance_id: &str) -> bool {
        backup_path(&self.manifest_path(instance_id)).is_file()
    }

    /// Restore the auxiliary files, manifest and record saved by the last
    /// commit
    ///
    /// Returns `None` when there is no manifest to restore (first commit).
    pub fn rollback(
        &self,
        lock: &InstanceLock,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>> {
        self.check_lock(lock, instance_id)?;
        if restore_auxiliary_files(&self.instance_dir(instance_id))? {
            warn!("Restored auxiliary files of {}", instance_id);
        }
        let manifest_path = self.manifest_path(instance_id);
        let metadata_path = self.metadata_path(instance_id);
        let manifest_backup = backup_path(&manifest_path);
        let metadata_backup = backup_path(&metadata_path);

        if !manifest_backup.is_file() || !metadata_backup.is_file() {
            return Ok(None);
        }

        fs::rename(&manifest_backup, &manifest_path)?;
        fs::rename(&metadata_backup, &metadata_path)?;
        warn!("Rolled back {} to its previous manifest", instance_id);
        self.load(instance_id).map(Some)
    }

    /// Drop backups once the committed manifest is confirmed applied
    pub fn discard_backup(&self, lock: &InstanceLock, instance_id: &str) -> Result<()> {
        self.check_lock(lock, instance_id)?;
        for path in [
            backup_path(&self.manifest_path(instance_id)),
            backup_path(&self.metadata_path(instance_id)),
        ] {
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }
        let aux_backup = self.instance_dir(instance_id).join(AUX_BACKUP_DIR);
        if aux_backup.is_dir() {
            fs::remove_dir_all(&aux_backup)?;
        }
        Ok(())
    }

    /// Delete an instance
    ///
    /// The record, manifest, backups and auxiliary files always go. The data
    /// directory is deleted only with `wipe_data`.
    pub fn remove(&self, lock: &InstanceLock, instance_id: &str, wipe_data: bool) -> Result<()> {
        self.check_lock(lock, instance_id)?;
        if !self.exists(instance_id) {
            return Err(Error::instance_not_found(instance_id));
        }

        let dir = self.instance_dir(instance_id);
        if wipe_data {
            fs::remove_dir_all(&dir)?;
            info!("Removed instance {} and its data", instance_id);
            return Ok(());
        }

        // Record last, so a crash part-way leaves a loadable instance.
        let metadata_path = self.metadata_path(instance_id);
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_data_dir = path.file_name() == Some(OsStr::new(INSTANCE_DATA_DIR));
            if path == metadata_path || is_data_dir {
                continue;
            }
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        fs::remove_file(&metadata_path)?;
        info!(
            "Removed instance {}; data kept at {}",
            instance_id,
            self.data_dir(instance_id).display()
        );
        Ok(())
    }

    fn save(&self, record: &InstanceRecord) -> Result<()> {
        write_atomic(&self.metadata_path(&record.instance_id), &record_json(record)?)
    }

    fn check_lock(&self, lock: &InstanceLock, instance_id: &str) -> Result<()> {
        if lock.covers(instance_id) {
            Ok(())
        } else {
            Err(Error::instance_busy(instance_id, self.lock_path(instance_id)))
        }
    }
}

/// Reject ids that are not plain directory names
pub fn validate_instance_id(instance_id: &str) -> Result<()> {
    if is_valid_app_name(instance_id) {
        Ok(())
    } else {
        Err(Error::invalid_instance_id(instance_id))
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn is_reserved(rel_path: &Path) -> bool {
    let first = match rel_path.components().next() {
        Some(Component::Normal(first)) => first,
        _ => return true,
    };
    if rel_path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return true;
    }
    let first = first.to_string_lossy();
    first == INSTANCE_DATA_DIR
        || first == AUX_BACKUP_DIR
        || first.starts_with(INSTANCE_METADATA_FILE)
        || first.starts_with(INSTANCE_MANIFEST_FILE)
}

fn record_json(record: &InstanceRecord) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(record)?)
}

/// Write `content` to a synced temp file beside `path`
fn stage_file(path: &Path, content: &[u8]) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io(std::io::Error::other("path has no parent directory")))?;
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    stage_file(path, content)?
        .persist(path)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn copy_atomic(from: &Path, to: &Path) -> Result<()> {
    let content = fs::read(from)?;
    write_atomic(to, &content)
}

/// Save the current copies of `files` under the instance's auxiliary backup
///
/// Files that do not exist yet are listed instead, so a restore can delete
/// them again.
fn save_auxiliary_files(instance_dir: &Path, files: &[&Path]) -> Result<()> {
    let backup_dir = instance_dir.join(AUX_BACKUP_DIR);
    if backup_dir.exists() {
        fs::remove_dir_all(&backup_dir)?;
    }
    let saved_dir = backup_dir.join(AUX_SAVED_DIR);
    fs::create_dir_all(&saved_dir)?;

    let mut added = Vec::new();
    for rel_path in files {
        let live = instance_dir.join(rel_path);
        if live.is_file() {
            copy_atomic(&live, &saved_dir.join(rel_path))?;
        } else {
            added.push(rel_path.to_path_buf());
        }
    }
    write_atomic(
        &backup_dir.join(AUX_ADDED_FILE),
        &serde_json::to_vec_pretty(&added)?,
    )
}

/// Undo [`save_auxiliary_files`]; `false` when there was no backup
fn restore_auxiliary_files(instance_dir: &Path) -> Result<bool> {
    let backup_dir = instance_dir.join(AUX_BACKUP_DIR);
    if !backup_dir.is_dir() {
        return Ok(false);
    }

    let added_path = backup_dir.join(AUX_ADDED_FILE);
    if added_path.is_file() {
        let added: Vec<PathBuf> = serde_json::from_slice(&fs::read(&added_path)?)?;
        for rel_path in added.iter().filter(|p| !is_reserved(p)) {
            let path = instance_dir.join(rel_path);
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }
    }

    let saved_dir = backup_dir.join(AUX_SAVED_DIR);
    if saved_dir.is_dir() {
        for entry in WalkDir::new(&saved_dir).min_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel_path = entry
                .path()
                .strip_prefix(&saved_dir)
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            copy_atomic(entry.path(), &instance_dir.join(rel_path))?;
        }
    }

    fs::remove_dir_all(&backup_dir)?;
    Ok(true)
}
