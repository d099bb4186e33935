//! Builders for app directories on disk

#![allow(dead_code)]

use berrypatch_core::types::{APP_METADATA_FILE, APP_TEMPLATE_FILE};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Minimal compose template referencing `PORT`
pub const WEB_TEMPLATE: &str = "services:\n  web:\n    image: nginx:alpine\n    ports:\n      - \"{{ PORT }}:80\"\n    volumes:\n      - \"{{ APPDATA_DIR }}:/usr/share/nginx/html\"\n";

/// Fluent builder writing a `berry.json` + template pair
pub struct AppBuilder {
    name: String,
    description: String,
    version: Option<String>,
    variables: Vec<Value>,
    template: String,
    extra_files: Vec<(PathBuf, String)>,
}

impl AppBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("{} test app", name),
            version: None,
            variables: Vec::new(),
            template: "services:\n  app:\n    image: busybox\n".to_string(),
            extra_files: Vec::new(),
        }
    }

    /// `PORT` (number, default 3000) with a web template
    pub fn web(name: &str) -> Self {
        Self::new(name)
            .with_variable(json!({"name": "PORT", "type": "number", "default": 3000}))
            .with_template(WEB_TEMPLATE)
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
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
            .push((PathBuf::from(rel_path), content.to_string()));
        self
    }

    /// Write the app under `apps_dir/<name>` and return that directory
    pub fn write_to(self, apps_dir: &Path) -> PathBuf {
        let dir = apps_dir.join(&self.name);
        fs::create_dir_all(&dir).unwrap();

        let mut metadata = json!({
            "name": self.name,
            "description": self.description,
            "variables": self.variables,
        });
        if let Some(version) = self.version {
            metadata["version"] = Value::String(version);
        }
        fs::write(
            dir.join(APP_METADATA_FILE),
            serde_json::to_string_pretty(&metadata).unwrap(),
        )
        .unwrap();
        fs::write(dir.join(APP_TEMPLATE_FILE), self.template).unwrap();

        for (rel_path, content) in self.extra_files {
            let path = dir.join(rel_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }
}
