//! Instance records and the instance state machine

use super::app_types::AppIdentity;
use super::variable_types::ResolvedConfiguration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// File name of the instance metadata record
pub const INSTANCE_METADATA_FILE: &str = "berry-meta.json";

/// File name of the hydrated manifest
pub const INSTANCE_MANIFEST_FILE: &str = "docker-compose.yml";

/// Name of the reserved data directory inside an instance directory
pub const INSTANCE_DATA_DIR: &str = "appdata";

/// Instance lifecycle state
///
/// ```text
/// NEW -> CONFIGURED -> INSTALLED -> RUNNING <-> STOPPED
///            ^______________|__________|__________|     (reconfigure)
/// any non-terminal state -> REMOVED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    New,
    Configured,
    Installed,
    Running,
    Stopped,
    Removed,
}

impl InstanceState {
    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(self, next: InstanceState) -> bool {
        use InstanceState::*;
        match (self, next) {
            (Removed, _) => false,
            (_, Removed) => true,
            (New, Configured) => true,
            (Configured, Configured) | (Configured, Installed) => true,
            (Installed, Running) | (Installed, Configured) => true,
            (Running, Stopped) | (Running, Configured) => true,
            (Stopped, Running) | (Stopped, Configured) => true,
            _ => false,
        }
    }

    /// States a reconfigure or upgrade may start from
    pub fn is_reconfigurable(self) -> bool {
        matches!(
            self,
            Self::Configured | Self::Installed | Self::Running | Self::Stopped
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Removed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Configured => "CONFIGURED",
            Self::Installed => "INSTALLED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted instance metadata (`berry-meta.json`)
///
/// The manifest body is stored next to it, never inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub app: AppIdentity,
    pub state: InstanceState,
    #[serde(default)]
    pub configuration: ResolvedConfiguration,
    pub manifest_path: PathBuf,
    pub data_dir: PathBuf,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live status reported by the container runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    Running,
    Stopped,
    Unknown,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
