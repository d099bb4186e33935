//! Mock collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use berrypatch_apps::SourceSync;
use berrypatch_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type SyncHook = Box<dyn Fn(&Path) + Send + Sync>;

/// Records sync calls; optionally fails or populates the mirror
#[derive(Default)]
pub struct MockSync {
    calls: Mutex<Vec<(String, String, PathBuf)>>,
    failure: Option<String>,
    on_sync: Option<SyncHook>,
}

impl MockSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every sync with `message` after recording the call
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Run `hook` against the mirror path on every successful sync
    pub fn populating<F>(hook: F) -> Self
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        Self {
            on_sync: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceSync for MockSync {
    async fn sync(&self, namespace: &str, url: &str, mirror: &Path) -> Result<()> {
        self.calls.lock().unwrap().push((
            namespace.to_string(),
            url.to_string(),
            mirror.to_path_buf(),
        ));
        if let Some(message) = &self.failure {
            return Err(Error::sync(namespace, message.clone()));
        }
        if let Some(hook) = &self.on_sync {
            hook(mirror);
        }
        Ok(())
    }
}
