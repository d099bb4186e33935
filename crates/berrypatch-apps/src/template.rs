//! Manifest template scanning
//!
//! Templates support exactly one construct: `{{ NAME }}` substitution of a
//! variable by identifier. Block tags, comments, filters and expressions
//! are rejected when the template is parsed so a broken template never makes
//! it past app loading.

use berrypatch_core::{Error, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
});

const UNSUPPORTED_OPENERS: &[&str] = &["{{", "{%", "{#"];

/// Name of the single map the rendering engine sees
pub(crate) const VALUES_KEY: &str = "vars";

/// A manifest template with its placeholder set extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTemplate {
    text: String,
    placeholders: BTreeSet<String>,
    /// `text` with every placeholder rewritten to a string-keyed lookup, so
    /// engine keywords such as `true` or `not` are plain variable names
    engine_text: String,
}

impl ManifestTemplate {
    /// Scan `text` for placeholders
    ///
    /// Fails with [`Error::Schema`] on any template syntax other than plain
    /// `{{ NAME }}` substitution.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let placeholders = PLACEHOLDER_RE
            .captures_iter(&text)
            .map(|caps| caps[1].to_string())
            .collect();

        let remainder = PLACEHOLDER_RE.replace_all(&text, "");
        for (line_no, line) in remainder.lines().enumerate() {
            if let Some(opener) = UNSUPPORTED_OPENERS.iter().find(|o| line.contains(*o)) {
                return Err(Error::schema(format!(
                    "Unsupported template syntax '{}' near line {}: only {{{{ NAME }}}} substitution is allowed",
                    opener,
                    line_no + 1
                )));
            }
        }

        let engine_text = PLACEHOLDER_RE
            .replace_all(&text, format!("{{{{ {}[\"${{1}}\"] }}}}", VALUES_KEY).as_str())
            .into_owned();

        Ok(Self {
            text,
            placeholders,
            engine_text,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn engine_text(&self) -> &str {
        &self.engine_text
    }

    /// Every variable name referenced by the template
    pub fn placeholders(&self) -> &BTreeSet<String> {
        &self.placeholders
    }

    /// First referenced name (in sorted order) not accepted by `is_known`
    pub fn first_unknown<F>(&self, is_known: F) -> Option<&str>
    where
        F: Fn(&str) -> bool,
    {
        self.placeholders
            .iter()
            .map(String::as_str)
            .find(|name| !is_known(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_placeholders() {
        let template = ManifestTemplate::parse(
            "services:\n  web:\n    ports: [\"{{PORT}}:80\"]\n    volumes: [\"{{ APPDATA_DIR }}:/data\"]\n    image: \"nginx:{{  TAG }}\"\n",
        )
        .unwrap();
        let names: Vec<_> = template.placeholders().iter().cloned().collect();
        assert_eq!(names, vec!["APPDATA_DIR", "PORT", "TAG"]);
    }

    #[test]
    fn test_plain_yaml_braces_allowed() {
        let template =
            ManifestTemplate::parse("services: {web: {image: nginx}}\nlabels: {a: b}\n").unwrap();
        assert!(template.placeholders().is_empty());
    }

    #[test]
    fn test_rejects_block_tags() {
        for text in [
            "{% if DEBUG %}x{% endif %}",
            "{# comment #}",
            "{{ PORT | default(value=1) }}",
            "{{ PORT + 1 }}",
            "{{- PORT }}",
            "{{ 1PORT }}",
        ] {
            assert!(
                matches!(ManifestTemplate::parse(text), Err(Error::Schema { .. })),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_placeholders_become_keyed_lookups() {
        let template = ManifestTemplate::parse("a: {{ not }}\nb: {{True}}\n").unwrap();
        assert_eq!(
            template.engine_text(),
            "a: {{ vars[\"not\"] }}\nb: {{ vars[\"True\"] }}\n"
        );
    }

    #[test]
    fn test_first_unknown() {
        let template = ManifestTemplate::parse("a: {{ B }}\nc: {{ A }}\n").unwrap();
        assert_eq!(template.first_unknown(|n| n == "B"), Some("A"));
        assert_eq!(template.first_unknown(|_| true), None);
    }
}
