//! Typed layers built from resolved layer bodies.

use chrono::{DateTime, Utc};
use ows_common::{
    BoundingBox, ConfigError, ConfigResult, GroupBy, SearchWindow, TimeError, TimeResolution,
};
use renderer::band_math::IndexRegistry;
use renderer::bands::BandIndex;
use renderer::flags::FlagDefinitions;
use renderer::style::{ResolvedStyleDef, StyleContext};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::raw::NodeId;
use crate::resource_limits::ResolvedResourceLimits;

const KNOWN_KEYS: &[&str] = &[
    "name",
    "title",
    "abstract",
    "bands",
    "flags",
    "time_resolution",
    "resource_limits",
    "styling",
];

/// A fully resolved, validated layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    pub name: String,
    pub title: String,
    pub abstract_text: String,
    /// Title of the folder the layer was declared in.
    pub folder: Option<String>,
    pub bands: BandIndex,
    /// Flag definitions keyed by band; the band may belong to another product.
    pub flag_bands: BTreeMap<String, FlagDefinitions>,
    pub time_resolution: TimeResolution,
    pub resource_limits: ResolvedResourceLimits,
    /// Styles in declaration order.
    pub styles: Vec<ResolvedStyleDef>,
    pub default_style: String,
    /// Unrecognised keys, kept verbatim.
    pub extra: Map<String, Value>,
}

/// Everything needed to build a layer once inheritance is resolved.
pub(crate) struct LayerParts<'a> {
    pub name: &'a str,
    pub folder: Option<String>,
    pub body: &'a Map<String, Value>,
    /// Resolved style bodies, in declaration order.
    pub styles: Vec<(NodeId, &'a Map<String, Value>)>,
    pub resource_limits: ResolvedResourceLimits,
}

impl ResolvedLayer {
    pub(crate) fn build(parts: LayerParts<'_>, registry: &IndexRegistry) -> ConfigResult<Self> {
        let node = NodeId::layer(parts.name).to_string();
        let body = parts.body;

        let title = string_field(&node, body, "title")?.unwrap_or_else(|| parts.name.to_string());
        let abstract_text = string_field(&node, body, "abstract")?.unwrap_or_default();

        let bands = match body.get("bands") {
            None | Some(Value::Null) => return Err(ConfigError::missing(&node, "bands")),
            Some(v) => BandIndex::from_value(v).map_err(|e| ConfigError::invalid(&node, "bands", e.to_string()))?,
        };
        let flag_bands = parse_flag_bands(&node, body.get("flags"), &bands)?;

        let time_resolution = match string_field(&node, body, "time_resolution")? {
            None => TimeResolution::default(),
            Some(s) => TimeResolution::parse(&s).ok_or_else(|| {
                ConfigError::invalid(&node, "time_resolution", format!("unknown time resolution '{}'", s))
            })?,
        };

        if parts.styles.is_empty() {
            return Err(ConfigError::missing(&node, "styling.styles"));
        }
        let ctx = StyleContext {
            bands: &bands,
            flag_bands: &flag_bands,
            registry,
        };
        let styles = parts
            .styles
            .iter()
            .map(|(id, style)| ResolvedStyleDef::compile(&id.to_string(), style, ctx))
            .collect::<ConfigResult<Vec<_>>>()?;

        let default_style = match body
            .get("styling")
            .and_then(|s| s.get("default_style"))
            .filter(|v| !v.is_null())
        {
            None => styles[0].name.clone(),
            Some(Value::String(name)) if styles.iter().any(|s| &s.name == name) => name.clone(),
            Some(other) => {
                return Err(ConfigError::invalid(
                    &node,
                    "styling.default_style",
                    format!("{} is not a style of this layer", other),
                ))
            }
        };

        let extra = body
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        debug!(
            layer = parts.name,
            styles = styles.len(),
            time_resolution = ?time_resolution,
            "Built layer"
        );

        Ok(Self {
            name: parts.name.to_string(),
            title,
            abstract_text,
            folder: parts.folder,
            bands,
            flag_bands,
            time_resolution,
            resource_limits: parts.resource_limits,
            styles,
            default_style,
            extra,
        })
    }

    pub fn style(&self, name: &str) -> Option<&ResolvedStyleDef> {
        self.styles.iter().find(|s| s.name == name)
    }

    /// The style used when a request names none.
    pub fn default_style(&self) -> Option<&ResolvedStyleDef> {
        self.style(&self.default_style)
    }

    /// Band context for compiling further styles against this layer.
    pub fn style_context<'a>(&'a self, registry: &'a IndexRegistry) -> StyleContext<'a> {
        StyleContext {
            bands: &self.bands,
            flag_bands: &self.flag_bands,
            registry,
        }
    }

    /// Catalogue search window for a requested instant.
    pub fn search_times(
        &self,
        t: DateTime<Utc>,
        geobox: Option<&BoundingBox>,
    ) -> Result<SearchWindow, TimeError> {
        self.time_resolution.search_times(t, geobox)
    }

    pub fn dataset_groupby(&self) -> GroupBy {
        self.time_resolution.dataset_groupby()
    }
}

fn string_field(node: &str, body: &Map<String, Value>, field: &str) -> ConfigResult<Option<String>> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::invalid(node, field, "expected a string")),
    }
}

/// Parse `flags: [{band, flags_definition}, ...]`.
///
/// Bands the layer declares are canonicalised; other names are kept as
/// given, since mask bands often come from a companion product.
fn parse_flag_bands(
    node: &str,
    value: Option<&Value>,
    bands: &BandIndex,
) -> ConfigResult<BTreeMap<String, FlagDefinitions>> {
    let mut out = BTreeMap::new();
    let items = match value {
        None | Some(Value::Null) => return Ok(out),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ConfigError::invalid(node, "flags", "expected a list")),
    };
    for item in items {
        let band = item
            .get("band")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::missing(node, "flags.band"))?;
        let band = bands.canonical(band).unwrap_or(band).to_string();
        let definition = item
            .get("flags_definition")
            .ok_or_else(|| ConfigError::missing(node, "flags.flags_definition"))?;
        let definitions =
            FlagDefinitions::from_value(definition).map_err(|e| ConfigError::flag(node, e))?;
        if out.insert(band.clone(), definitions).is_some() {
            return Err(ConfigError::Duplicate {
                kind: "flag band",
                name: format!("{}/{}", node, band),
            });
        }
    }
    Ok(out)
}
