//! Builders for app directories on disk

#![allow(dead_code)]

use berrypatch_core::types::{APP_METADATA_FILE, APP_TEMPLATE_FILE};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const WEB_TEMPLATE: &str = "services:\n  web:\n    image: nginx:alpine\n    ports:\n      - \"{{ PORT }}:80\"\n    volumes:\n      - \"{{ APPDATA_DIR }}:/usr/share/nginx/html\"\n";

/// Writes `berry.json`, the template and extra files for one app
pub struct AppBuilder {
    name: String,
    version: Option<String>,
    variables: Vec<Value>,
    template: String,
    extra_files: Vec<(String, String)>,
}

impl AppBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            variables: Vec::new(),
            template: "services:\n  app:\n    image: busybox\n".to_string(),
            extra_files: Vec::new(),
        }
    }

    /// `PORT` (number, default 3000) published by an nginx service
    pub fn web(name: &str) -> Self {
        Self::new(name)
            .with_variable(json!({"name": "PORT", "type": "number", "default": 3000}))
            .with_template(WEB_TEMPLATE)
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn with_variable(mut self, variable: Value) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }

    pub fn with_file(mut self, rel_path: &str, content: &str) -> Self {
        self.extra_files
            .push((rel_path.to_string(), content.to_string()));
        self
    }

    pub fn write_to(self, apps_dir: &Path) -> PathBuf {
        let dir = apps_dir.join(&self.name);
        if dir.exists() {
            fs::remove_dir_all(&dir).unwrap();
        }
        fs::create_dir_all(&dir).unwrap();

        let mut metadata = json!({"name": self.name, "variables": self.variables});
        if let Some(version) = self.version {
            metadata["version"] = Value::String(version);
        }
        fs::write(dir.join(APP_METADATA_FILE), metadata.to_string()).unwrap();
        fs::write(dir.join(APP_TEMPLATE_FILE), self.template).unwrap();
        for (rel_path, content) in self.extra_files {
            let path = dir.join(rel_path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }
}
