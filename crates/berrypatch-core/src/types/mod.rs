//! Type definitions for Berrypatch

mod app_types;
mod instance_types;
mod variable_types;

pub use app_types::*;
pub use instance_types::*;
pub use variable_types::*;
