//! # berrypatch-core
//!
//! Core library for Berrypatch providing:
//! - The error taxonomy shared by every crate
//! - Type definitions for variables, apps and instances
//! - Configuration (root path, source priority list, timeouts)

pub mod config;
pub mod error;
pub mod types;

pub use config::{BerrypatchConfig, ConfigLoader, SourceKind, SourceSpec};
pub use error::{Error, Result};
