//! Configuration loading and management

mod loader;
mod settings;

pub use loader::{ConfigLoader, CONFIG_FILE};
pub use settings::{
    BerrypatchConfig, SourceKind, SourceSpec, DEFAULT_ROOT, FARM_BASE_ADDRESS, FARM_NAMESPACE,
    LOCAL_NAMESPACE,
};
