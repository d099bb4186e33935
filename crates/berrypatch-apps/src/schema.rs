//! Variable schema validation and value coercion
//!
//! Author-controlled `berry.json` variable entries are checked once, at the
//! parse boundary, and turned into [`VariableDeclaration`]s. Raw user input
//! (always text, from the command line or a prompt) is converted to the
//! declared type with [`coerce`].

use berrypatch_core::types::{VariableDeclaration, VariableSpec, VariableType, VariableValue};
use berrypatch_core::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Name of the implicit variable holding the instance data directory
pub const APPDATA_DIR_VARIABLE: &str = "APPDATA_DIR";

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier regex is valid")
});

const TRUE_TOKENS: &[&str] = &["true", "yes", "1"];
const FALSE_TOKENS: &[&str] = &["false", "no", "0"];

/// Whether `name` is a valid variable identifier
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Validate one variable entry into a typed declaration
///
/// Fails with [`Error::Schema`] when:
/// - the name does not match `^[A-Za-z][A-Za-z0-9_]*$`
/// - the type is not `string`, `boolean` or `number`
/// - the variable is required and also carries a non-empty default
/// - the default does not convert to the declared type
pub fn validate_declaration(spec: &VariableSpec) -> Result<VariableDeclaration> {
    if !is_valid_identifier(&spec.name) {
        return Err(Error::schema(format!(
            "Invalid variable name '{}': must match ^[A-Za-z][A-Za-z0-9_]*$",
            spec.name
        )));
    }

    let var_type = match spec.var_type.as_deref() {
        None => VariableType::String,
        Some(raw) => VariableType::parse(raw).ok_or_else(|| {
            Error::schema(format!(
                "Variable {} has unknown type '{}'. Valid types: string, boolean, number",
                spec.name, raw
            ))
        })?,
    };

    let default = match &spec.default {
        None | Some(serde_json::Value::Null) => None,
        Some(raw) => Some(coerce_default(&spec.name, var_type, raw)?),
    };

    let default = match default {
        Some(value) if spec.required => {
            if !value.is_empty() {
                return Err(Error::schema(format!(
                    "Variable {} is required and cannot also declare a default",
                    spec.name
                )));
            }
            None
        }
        other => other,
    };

    Ok(VariableDeclaration {
        name: spec.name.clone(),
        description: spec.description.clone(),
        required: spec.required,
        default,
        var_type,
    })
}

/// Validate a whole, ordered variable list
///
/// Declaration order is preserved. Names must be unique and must not shadow
/// the implicit `APPDATA_DIR` variable.
pub fn validate_declarations(specs: &[VariableSpec]) -> Result<Vec<VariableDeclaration>> {
    let mut seen = HashSet::new();
    let mut declarations = Vec::with_capacity(specs.len());

    for spec in specs {
        let declaration = validate_declaration(spec)?;
        if declaration.name == APPDATA_DIR_VARIABLE {
            return Err(Error::schema(format!(
                "Variable name {} is reserved",
                APPDATA_DIR_VARIABLE
            )));
        }
        if !seen.insert(declaration.name.clone()) {
            return Err(Error::schema(format!(
                "Variable {} is declared more than once",
                declaration.name
            )));
        }
        declarations.push(declaration);
    }

    Ok(declarations)
}

/// Convert a raw textual value to the declared type
///
/// - `string`: taken as-is
/// - `boolean`: case-insensitive `true/false/yes/no/1/0`
/// - `number`: decimal integer or float
pub fn coerce(declaration: &VariableDeclaration, raw: &str) -> Result<VariableValue> {
    coerce_as(&declaration.name, declaration.var_type, raw)
}

fn coerce_as(name: &str, var_type: VariableType, raw: &str) -> Result<VariableValue> {
    match var_type {
        VariableType::String => Ok(VariableValue::String(raw.to_string())),
        VariableType::Boolean => {
            let token = raw.trim().to_ascii_lowercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                Ok(VariableValue::Boolean(true))
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                Ok(VariableValue::Boolean(false))
            } else {
                Err(Error::type_coercion(name, var_type, raw))
            }
        }
        VariableType::Number => parse_number(raw.trim())
            .map(VariableValue::Number)
            .ok_or_else(|| Error::type_coercion(name, var_type, raw)),
    }
}

fn parse_number(text: &str) -> Option<serde_json::Number> {
    let decimal = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    if !decimal {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(serde_json::Number::from(int));
    }
    if let Ok(int) = text.parse::<u64>() {
        return Some(serde_json::Number::from(int));
    }
    let float = text.parse::<f64>().ok()?;
    // Whole floats become integers so re-coercing their text is stable.
    if float.fract() == 0.0 {
        if float >= i64::MIN as f64 && float < i64::MAX as f64 {
            return Some(serde_json::Number::from(float as i64));
        }
        if float >= 0.0 && float < u64::MAX as f64 {
            return Some(serde_json::Number::from(float as u64));
        }
    }
    serde_json::Number::from_f64(float)
}

/// Defaults arrive as arbitrary JSON scalars; they go through the same
/// textual coercion as user input so `"3000"` and `3000` agree.
fn coerce_default(
    name: &str,
    var_type: VariableType,
    raw: &serde_json::Value,
) -> Result<VariableValue> {
    let text = match raw {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(Error::schema(format!(
                "Variable {} has a non-scalar default: {}",
                name, other
            )))
        }
    };
    coerce_as(name, var_type, &text).map_err(|e| {
        Error::schema(format!("Variable {} has an invalid default: {}", name, e))
    })
}
