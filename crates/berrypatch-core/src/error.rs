//! Error types for Berrypatch

use crate::types::{InstanceState, VariableType};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using berrypatch-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every Berrypatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// App definition or variable declaration is malformed
    #[error("Invalid app definition: {message}")]
    Schema { message: String },

    /// A raw value could not be converted to the declared variable type
    #[error("Cannot use '{value}' for variable {name}: expected a {expected}")]
    TypeCoercion {
        name: String,
        expected: VariableType,
        value: String,
    },

    /// No app with this name in the requested namespace(s)
    #[error("App not found: {name}")]
    AppNotFound { name: String },

    /// Refreshing a remote source failed; the previous mirror is untouched
    #[error("Failed to sync source '{namespace}': {message}")]
    Sync { namespace: String, message: String },

    /// Required variables with no override, prior value or default
    #[error("Missing required variable(s): {}", .names.join(", "))]
    MissingRequiredVariables { names: Vec<String> },

    /// Override supplied for a variable the app does not declare
    #[error("Unknown variable '{name}' for app {app}")]
    UnknownVariable { app: String, name: String },

    /// Template placeholder without a matching variable
    #[error("Template references undeclared variable: {name}")]
    UnresolvedPlaceholder { name: String },

    /// Hydrated manifest is not a valid compose document
    #[error("Generated manifest is invalid: {message}")]
    InvalidManifest { message: String },

    /// Instance id already taken
    #[error("Instance already exists: {instance_id}")]
    DuplicateInstance { instance_id: String },

    /// Instance id unusable as a directory name
    #[error("Invalid instance id '{instance_id}': must match ^[a-z0-9][a-z0-9._-]*$")]
    InvalidInstanceId { instance_id: String },

    /// No instance with this id
    #[error("Instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// State change not present in the transition table
    #[error("Illegal state transition for {instance_id}: {from} -> {to}")]
    IllegalTransition {
        instance_id: String,
        from: InstanceState,
        to: InstanceState,
    },

    /// Instance lock could not be acquired within the configured wait
    #[error(
        "Instance {instance_id} is busy: another berrypatch process holds {}",
        .lock_path.display()
    )]
    InstanceBusy {
        instance_id: String,
        lock_path: PathBuf,
    },

    /// Container runtime failure, stderr preserved verbatim
    #[error("{command} failed:\n{stderr}")]
    Runtime { command: String, stderr: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Template engine failure
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a type coercion error
    pub fn type_coercion(
        name: impl Into<String>,
        expected: VariableType,
        value: impl Into<String>,
    ) -> Self {
        Self::TypeCoercion {
            name: name.into(),
            expected,
            value: value.into(),
        }
    }

    /// Create an app not found error
    pub fn app_not_found(name: impl Into<String>) -> Self {
        Self::AppNotFound { name: name.into() }
    }

    /// Create a sync error
    pub fn sync(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sync {
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    /// Create a missing required variables error
    pub fn missing_required(names: Vec<String>) -> Self {
        Self::MissingRequiredVariables { names }
    }

    /// Create an unknown variable error
    pub fn unknown_variable(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownVariable {
            app: app.into(),
            name: name.into(),
        }
    }

    /// Create an unresolved placeholder error
    pub fn unresolved_placeholder(name: impl Into<String>) -> Self {
        Self::UnresolvedPlaceholder { name: name.into() }
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// Create a duplicate instance error
    pub fn duplicate_instance(instance_id: impl Into<String>) -> Self {
        Self::DuplicateInstance {
            instance_id: instance_id.into(),
        }
    }

    /// Create an invalid instance id error
    pub fn invalid_instance_id(instance_id: impl Into<String>) -> Self {
        Self::InvalidInstanceId {
            instance_id: instance_id.into(),
        }
    }

    /// Create an instance not found error
    pub fn instance_not_found(instance_id: impl Into<String>) -> Self {
        Self::InstanceNotFound {
            instance_id: instance_id.into(),
        }
    }

    /// Create an illegal transition error
    pub fn illegal_transition(
        instance_id: impl Into<String>,
        from: InstanceState,
        to: InstanceState,
    ) -> Self {
        Self::IllegalTransition {
            instance_id: instance_id.into(),
            from,
            to,
        }
    }

    /// Create an instance busy error
    pub fn instance_busy(instance_id: impl Into<String>, lock_path: impl Into<PathBuf>) -> Self {
        Self::InstanceBusy {
            instance_id: instance_id.into(),
            lock_path: lock_path.into(),
        }
    }

    /// Create a runtime error
    pub fn runtime(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Runtime {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Errors detected before any durable state is touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. }
                | Self::TypeCoercion { .. }
                | Self::MissingRequiredVariables { .. }
                | Self::UnknownVariable { .. }
                | Self::UnresolvedPlaceholder { .. }
                | Self::InvalidManifest { .. }
        )
    }

    /// Store/lifecycle preconditions checked before a protocol begins
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::DuplicateInstance { .. }
                | Self::InvalidInstanceId { .. }
                | Self::InstanceNotFound { .. }
                | Self::IllegalTransition { .. }
                | Self::InstanceBusy { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_lists_every_name() {
        let err = Error::missing_required(vec!["API_KEY".to_string(), "PORT".to_string()]);
        assert_eq!(
            err.to_string(),
            "Missing required variable(s): API_KEY, PORT"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_runtime_error_keeps_stderr_verbatim() {
        let stderr = "service \"web\" refers to undefined network frontend: invalid compose project";
        let err = Error::runtime("docker compose up -d", stderr);
        assert!(err.to_string().ends_with(stderr));
        assert!(!err.is_validation());
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_illegal_transition_message() {
        let err = Error::illegal_transition("grafana", InstanceState::New, InstanceState::Running);
        assert_eq!(
            err.to_string(),
            "Illegal state transition for grafana: NEW -> RUNNING"
        );
        assert!(err.is_precondition());
    }
}
