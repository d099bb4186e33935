//! Manifest hydration
//!
//! Renders a manifest template against a resolved configuration and checks
//! that the result is a compose document before anyone can persist it.

use crate::app::AppDefinition;
use crate::schema::APPDATA_DIR_VARIABLE;
use crate::template::{ManifestTemplate, VALUES_KEY};
use berrypatch_core::types::ResolvedConfiguration;
use berrypatch_core::{Error, Result};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::debug;

const TEMPLATE_NAME: &str = "docker-compose.yml";

/// Variables visible to a template: the resolved configuration plus the
/// implicit data directory
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub configuration: &'a ResolvedConfiguration,
    pub data_dir: &'a Path,
}

impl<'a> RenderContext<'a> {
    pub fn new(configuration: &'a ResolvedConfiguration, data_dir: &'a Path) -> Self {
        Self {
            configuration,
            data_dir,
        }
    }

    fn contains(&self, name: &str) -> bool {
        name == APPDATA_DIR_VARIABLE || self.configuration.contains(name)
    }

    /// Every value as its raw text, under one map keyed by variable name
    fn to_tera_context(&self) -> Context {
        let mut values: BTreeMap<&str, String> = self
            .configuration
            .iter()
            .map(|(name, value)| (name, value.to_raw()))
            .collect();
        values.insert(APPDATA_DIR_VARIABLE, self.data_dir.display().to_string());

        let mut ctx = Context::new();
        ctx.insert(VALUES_KEY, &values);
        ctx
    }
}

/// Renders manifest templates
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateHydrator;

impl TemplateHydrator {
    pub fn new() -> Self {
        Self
    }

    /// Render raw template text
    ///
    /// Fails with [`Error::UnresolvedPlaceholder`] for a placeholder missing
    /// from `context` and with [`Error::InvalidManifest`] when the output is
    /// not a compose document. Output is a pure function of the inputs.
    pub fn render(&self, template_text: &str, context: &RenderContext<'_>) -> Result<String> {
        let template = ManifestTemplate::parse(template_text)?;
        self.render_template(&template, context)
    }

    /// Render an app's template
    pub fn render_app(&self, app: &AppDefinition, context: &RenderContext<'_>) -> Result<String> {
        debug!("Hydrating manifest for {}", app.identity());
        self.render_template(app.template(), context)
    }

    fn render_template(
        &self,
        template: &ManifestTemplate,
        context: &RenderContext<'_>,
    ) -> Result<String> {
        if let Some(name) = template.first_unknown(|name| context.contains(name)) {
            return Err(Error::unresolved_placeholder(name));
        }

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(TEMPLATE_NAME, template.engine_text())
            .map_err(|e| Error::Template(e.to_string()))?;
        let rendered = tera
            .render(TEMPLATE_NAME, &context.to_tera_context())
            .map_err(|e| Error::Template(e.to_string()))?;

        validate_manifest(&rendered)?;
        Ok(rendered)
    }
}

/// Check that `text` is a compose document with at least one service
pub fn validate_manifest(text: &str) -> Result<()> {
    let doc: Value = serde_yaml_ng::from_str(text)
        .map_err(|e| Error::invalid_manifest(format!("not valid YAML: {}", e)))?;

    let root = doc
        .as_mapping()
        .ok_or_else(|| Error::invalid_manifest("top level must be a mapping"))?;
    let services = root
        .get("services")
        .ok_or_else(|| Error::invalid_manifest("missing 'services' section"))?
        .as_mapping()
        .ok_or_else(|| Error::invalid_manifest("'services' must be a mapping"))?;

    if services.is_empty() {
        return Err(Error::invalid_manifest("'services' must define at least one service"));
    }
    if let Some((name, _)) = services.iter().find(|(_, svc)| !svc.is_mapping()) {
        return Err(Error::invalid_manifest(format!(
            "service {} must be a mapping",
            serde_yaml_ng::to_string(name)?.trim()
        )));
    }
    Ok(())
}
