//! # berrypatch-instances
//!
//! Installed instances of Berrypatch apps:
//! - File-backed instance store with crash-safe manifest commits
//! - Per-instance advisory locking
//! - The instance state machine
//! - Container runtime adapter
//! - Lifecycle controller composing apps, store and runtime

pub mod controller;
pub mod lock;
pub mod runtime;
pub mod store;

pub use controller::{CheckReport, InstallOptions, InstanceStatus, LifecycleController};
pub use lock::InstanceLock;
pub use runtime::{ComposeRuntime, DockerComposeRuntime};
pub use store::{validate_instance_id, InstanceStore, StagedManifest};
