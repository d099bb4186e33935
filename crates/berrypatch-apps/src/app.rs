//! App definitions
//!
//! An app directory holds `berry.json`, `docker-compose.tmpl.yml` and any
//! number of auxiliary files that are copied verbatim into each instance.

use crate::schema::{validate_declarations, APPDATA_DIR_VARIABLE};
use crate::template::ManifestTemplate;
use berrypatch_core::types::{
    AppIdentity, AppMetadataFile, VariableDeclaration, APP_METADATA_FILE, APP_TEMPLATE_FILE,
};
use berrypatch_core::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

static APP_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("app name regex is valid"));

/// Whether `name` is usable as an app name or instance id
pub fn is_valid_app_name(name: &str) -> bool {
    APP_NAME_RE.is_match(name)
}

/// Parsed, validated and immutable app definition
#[derive(Debug, Clone)]
pub struct AppDefinition {
    identity: AppIdentity,
    description: String,
    variables: Vec<VariableDeclaration>,
    template: ManifestTemplate,
    auxiliary_files: Vec<PathBuf>,
    dir: PathBuf,
}

impl AppDefinition {
    /// Load the app in `dir` into `namespace`
    ///
    /// All validation happens here: the variable schema, the template
    /// syntax, and the cross-check that every template placeholder is a
    /// declared variable (or the implicit `APPDATA_DIR`).
    pub fn load(dir: &Path, namespace: &str) -> Result<Self> {
        let dir_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::schema(format!("Invalid app directory: {}", dir.display())))?;

        let metadata_path = dir.join(APP_METADATA_FILE);
        if !metadata_path.is_file() {
            return Err(Error::schema(format!(
                "{} not found in {}",
                APP_METADATA_FILE,
                dir.display()
            )));
        }
        let template_path = dir.join(APP_TEMPLATE_FILE);
        if !template_path.is_file() {
            return Err(Error::schema(format!(
                "{} not found in {}",
                APP_TEMPLATE_FILE,
                dir.display()
            )));
        }

        let content = fs::read_to_string(&metadata_path)?;
        let metadata: AppMetadataFile = serde_json::from_str(&content).map_err(|e| {
            Error::schema(format!("Failed to parse {}: {}", metadata_path.display(), e))
        })?;

        if metadata.name != dir_name {
            return Err(Error::schema(format!(
                "App name '{}' does not match its directory '{}'",
                metadata.name, dir_name
            )));
        }
        if !is_valid_app_name(&metadata.name) {
            return Err(Error::schema(format!(
                "Invalid app name '{}': must match ^[a-z0-9][a-z0-9._-]*$",
                metadata.name
            )));
        }

        let variables = validate_declarations(&metadata.variables)?;
        let template = ManifestTemplate::parse(fs::read_to_string(&template_path)?)?;

        let unknown = template.first_unknown(|name| {
            name == APPDATA_DIR_VARIABLE || variables.iter().any(|v| v.name == name)
        });
        if let Some(name) = unknown {
            return Err(Error::unresolved_placeholder(name));
        }

        let auxiliary_files = Self::collect_auxiliary_files(dir)?;

        debug!(
            "Loaded app {}/{} ({} variables, {} auxiliary files)",
            namespace,
            metadata.name,
            variables.len(),
            auxiliary_files.len()
        );

        Ok(Self {
            identity: AppIdentity::new(namespace, metadata.name, metadata.version),
            description: metadata.description,
            variables,
            template,
            auxiliary_files,
            dir: dir.to_path_buf(),
        })
    }

    fn collect_auxiliary_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1)
        {
            let entry = entry.map_err(|e| {
                Error::schema(format!("Failed to walk {}: {}", dir.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel_path = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| Error::schema(format!("Failed to compute relative path: {}", e)))?;
            if rel_path == Path::new(APP_METADATA_FILE) || rel_path == Path::new(APP_TEMPLATE_FILE)
            {
                continue;
            }
            files.push(rel_path.to_path_buf());
        }
        Ok(files)
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn namespace(&self) -> &str {
        &self.identity.namespace
    }

    pub fn version(&self) -> Option<&str> {
        self.identity.version.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Variables in declaration order
    pub fn variables(&self) -> &[VariableDeclaration] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDeclaration> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn template(&self) -> &ManifestTemplate {
        &self.template
    }

    /// Auxiliary files, relative to [`AppDefinition::dir`]
    pub fn auxiliary_files(&self) -> &[PathBuf] {
        &self.auxiliary_files
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = "services:\n  web:\n    image: nginx\n    ports: [\"{{ PORT }}:80\"]\n    volumes: [\"{{ APPDATA_DIR }}:/data\"]\n";

    fn write_app(root: &Path, name: &str, metadata: &str, template: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(APP_METADATA_FILE), metadata).unwrap();
        fs::write(dir.join(APP_TEMPLATE_FILE), template).unwrap();
        dir
    }

    #[test]
    fn test_load_valid_app() {
        let temp = TempDir::new().unwrap();
        let dir = write_app(
            temp.path(),
            "web",
            r#"{"name": "web", "version": "2.0", "variables": [{"name": "PORT", "type": "number", "default": 8080}]}"#,
            TEMPLATE,
        );
        fs::create_dir_all(dir.join("conf")).unwrap();
        fs::write(dir.join("conf/nginx.conf"), "server {}").unwrap();
        fs::write(dir.join("README.md"), "# web").unwrap();

        let app = AppDefinition::load(&dir, "local").unwrap();
        assert_eq!(app.identity().to_string(), "local/web@2.0");
        assert_eq!(app.variables().len(), 1);
        assert!(app.variable("PORT").is_some());
        assert_eq!(
            app.auxiliary_files(),
            &[PathBuf::from("README.md"), PathBuf::from("conf/nginx.conf")]
        );
    }

    #[test]
    fn test_undeclared_placeholder_fails_load() {
        let temp = TempDir::new().unwrap();
        let dir = write_app(temp.path(), "web", r#"{"name": "web"}"#, TEMPLATE);
        let err = AppDefinition::load(&dir, "local").unwrap_err();
        assert!(matches!(err, Error::UnresolvedPlaceholder { ref name } if name == "PORT"));
    }

    #[test]
    fn test_name_must_match_directory() {
        let temp = TempDir::new().unwrap();
        let dir = write_app(temp.path(), "web", r#"{"name": "other"}"#, "services: {}\n");
        assert!(matches!(
            AppDefinition::load(&dir, "local"),
            Err(Error::Schema { .. })
        ));
    }

    #[test]
    fn test_missing_template_fails() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("web");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(APP_METADATA_FILE), r#"{"name": "web"}"#).unwrap();
        assert!(matches!(
            AppDefinition::load(&dir, "local"),
            Err(Error::Schema { .. })
        ));
    }

    #[test]
    fn test_malformed_metadata_fails() {
        let temp = TempDir::new().unwrap();
        let dir = write_app(temp.path(), "web", "{not json", "services: {}\n");
        assert!(matches!(
            AppDefinition::load(&dir, "local"),
            Err(Error::Schema { .. })
        ));
    }

    #[test]
    fn test_app_name_pattern() {
        assert!(is_valid_app_name("grafana"));
        assert!(is_valid_app_name("home-assistant.2"));
        assert!(!is_valid_app_name("Grafana"));
        assert!(!is_valid_app_name("-grafana"));
        assert!(!is_valid_app_name("a/b"));
        assert!(!is_valid_app_name(""));
    }
}
