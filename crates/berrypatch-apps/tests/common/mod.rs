//! Common test utilities for berrypatch-apps
//!
//! - App directory builders
//! - Source fixtures rooted in a temporary directory
//! - A scripted [`SourceSync`](berrypatch_apps::SourceSync) mock

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
