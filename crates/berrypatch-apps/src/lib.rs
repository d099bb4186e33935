//! # berrypatch-apps
//!
//! Everything between an app directory on disk and a hydrated manifest:
//! - Variable schema validation and coercion
//! - App definition loading
//! - Source discovery, priority resolution and remote sync
//! - Configuration resolution with override > prior > default precedence
//! - Template hydration with manifest validation

pub mod app;
pub mod hydrator;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod sync;
pub mod template;

pub use app::{is_valid_app_name, AppDefinition};
pub use hydrator::{validate_manifest, RenderContext, TemplateHydrator};
pub use resolver::{ConfigurationResolver, Overrides};
pub use schema::{coerce, validate_declaration, validate_declarations, APPDATA_DIR_VARIABLE};
pub use source::{AppListing, Resolution, SourceNamespace, SourceRegistry};
pub use sync::{GitSync, SourceSync};
pub use template::ManifestTemplate;
