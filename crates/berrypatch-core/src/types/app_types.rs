//! App definition file format and identities

use super::variable_types::VariableSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// File name of the app definition record
pub const APP_METADATA_FILE: &str = "berry.json";

/// File name of the manifest template
pub const APP_TEMPLATE_FILE: &str = "docker-compose.tmpl.yml";

/// Contents of `berry.json`
///
/// ```json
/// {
///   "name": "grafana",
///   "description": "Dashboards for everything",
///   "version": "1.2.0",
///   "variables": [
///     { "name": "PORT", "type": "number", "default": 3000 },
///     { "name": "ADMIN_PASSWORD", "required": true }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadataFile {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub variables: Vec<VariableSpec>,
}

/// Fully qualified identity of an app
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppIdentity {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl AppIdentity {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }

    /// Reference that resolves to exactly this namespace/app pair
    pub fn to_ref(&self) -> AppRef {
        AppRef {
            namespace: Some(self.namespace.clone()),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

/// User-supplied app reference: `name` or `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRef {
    pub namespace: Option<String>,
    pub name: String,
}

impl AppRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl FromStr for AppRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                if name.contains('/') {
                    return Err(format!(
                        "Invalid app reference '{}'. Use <name> or <namespace>/<name>",
                        s
                    ));
                }
                Ok(Self::qualified(namespace, name))
            }
            None if !s.is_empty() => Ok(Self::new(s)),
            _ => Err(format!(
                "Invalid app reference '{}'. Use <name> or <namespace>/<name>",
                s
            )),
        }
    }
}

impl fmt::Display for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}
