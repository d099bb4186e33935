//! Configuration resolution
//!
//! For each declared variable, in declaration order, the value comes from
//! the first of:
//! 1. an explicit override (raw text, coerced to the declared type)
//! 2. the prior instance configuration (re-coerced against the current schema)
//! 3. the declared default
//! 4. nothing, if the variable is required (collected, then reported together)
//! 5. the zero value of the declared type

use crate::app::AppDefinition;
use crate::schema::coerce;
use berrypatch_core::types::{ResolvedConfiguration, VariableValue};
use berrypatch_core::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// User-supplied raw values, keyed by variable name
pub type Overrides = BTreeMap<String, String>;

/// Merges overrides, prior configuration and defaults for one app
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationResolver<'a> {
    app: &'a AppDefinition,
}

impl<'a> ConfigurationResolver<'a> {
    pub fn new(app: &'a AppDefinition) -> Self {
        Self { app }
    }

    /// Produce the full configuration or fail without a partial result
    pub fn resolve(
        &self,
        prior: Option<&ResolvedConfiguration>,
        overrides: &Overrides,
    ) -> Result<ResolvedConfiguration> {
        if let Some(name) = overrides.keys().find(|k| self.app.variable(k).is_none()) {
            return Err(Error::unknown_variable(self.app.name(), name.clone()));
        }

        let mut resolved = ResolvedConfiguration::new();
        let mut missing = Vec::new();

        for decl in self.app.variables() {
            let value = if let Some(raw) = overrides.get(&decl.name) {
                coerce(decl, raw)?
            } else if let Some(previous) = prior.and_then(|p| p.get(&decl.name)) {
                coerce(decl, &previous.to_raw())?
            } else if let Some(default) = &decl.default {
                default.clone()
            } else if decl.required {
                missing.push(decl.name.clone());
                continue;
            } else {
                VariableValue::zero(decl.var_type)
            };
            resolved.insert(decl.name.clone(), value);
        }

        if !missing.is_empty() {
            return Err(Error::missing_required(missing));
        }

        if let Some(prior) = prior {
            for (name, _) in prior.iter().filter(|(n, _)| self.app.variable(n).is_none()) {
                debug!("Dropping {} from prior configuration: no longer declared", name);
            }
        }

        Ok(resolved)
    }
}
