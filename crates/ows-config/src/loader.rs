//! Configuration file loading.
//!
//! Documents are JSON or YAML, chosen by file extension. Before parsing,
//! `${VAR}` and `${VAR:-default}` are replaced from the environment.

use ows_common::{ConfigError, ConfigResult};
use renderer::band_math::IndexRegistry;
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::ResolvedConfig;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Read, expand and parse a configuration file into a raw document.
pub fn load_document(path: impl AsRef<Path>) -> ConfigResult<Value> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| {
        ConfigError::Parse(format!(
            "{}: expected a .json, .yaml or .yml file",
            path.display()
        ))
    })?;
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    let doc = parse_document(&content, format)?;
    info!(path = %path.display(), format = ?format, "Loaded configuration document");
    Ok(doc)
}

/// Load and resolve a configuration file with the built-in index functions.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<ResolvedConfig> {
    ResolvedConfig::from_document(&load_document(path)?)
}

pub fn load_config_with(path: impl AsRef<Path>, registry: &IndexRegistry) -> ConfigResult<ResolvedConfig> {
    ResolvedConfig::from_document_with(&load_document(path)?, registry)
}

/// Expand environment references and parse.
pub fn parse_document(content: &str, format: Format) -> ConfigResult<Value> {
    let content = expand_env_vars(content)?;
    match format {
        Format::Json => Ok(serde_json::from_str(&content)?),
        Format::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("YAML error: {}", e)))?;
            yaml_to_json(yaml)
        }
    }
}

// ============================================================================
// YAML conversion
// ============================================================================

/// Convert a YAML tree, stringifying scalar mapping keys (`0: false` becomes `"0"`).
fn yaml_to_json(value: serde_yaml::Value) -> ConfigResult<Value> {
    use serde_yaml::Value as Yaml;
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<ConfigResult<_>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut out = Map::with_capacity(mapping.len());
            for (k, v) in mapping {
                let key = match k {
                    Yaml::String(s) => s,
                    Yaml::Bool(b) => b.to_string(),
                    Yaml::Number(n) => n.to_string(),
                    other => {
                        return Err(ConfigError::Parse(format!(
                            "unsupported mapping key: {:?}",
                            other
                        )))
                    }
                };
                out.insert(key, yaml_to_json(v)?);
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => {
            let tagged = *tagged;
            yaml_to_json(tagged.value)?
        }
    })
}

fn yaml_number(n: &serde_yaml::Number) -> ConfigResult<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::from(u));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ConfigError::Parse(format!("unsupported number: {}", n)))
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in document text.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(content: &str) -> ConfigResult<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(ConfigError::Parse(format!(
                            "Unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> ConfigResult<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim())
            .map_err(|_| ConfigError::Parse(format!("Environment variable {} not set", expr)))
    }
}
