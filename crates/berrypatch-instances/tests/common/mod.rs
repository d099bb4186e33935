//! Common test utilities for berrypatch-instances
//!
//! - App directory builders
//! - A temporary Berrypatch root wired to a controller
//! - A recording [`ComposeRuntime`](berrypatch_instances::ComposeRuntime) mock

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
