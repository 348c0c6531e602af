//! Building a resolved configuration from a document.
//!
//! Resolution runs in two phases over the same resolver. The first resolves
//! layers and named resource limits; the second resolves the styles and
//! inline resource limits found on each resolved layer, so a layer that
//! inherits its styling still gets its own copy of every style.

use ows_common::{ConfigError, ConfigResult};
use renderer::band_math::IndexRegistry;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::layer::{LayerParts, ResolvedLayer};
use crate::raw::{NodeId, RawConfigNode};
use crate::resolver::{resolve, ResolvedNodes};
use crate::resource_limits::ResolvedResourceLimits;

/// A fully resolved configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Top-level sections other than `layers` and `resource_limits`, verbatim.
    pub global: Map<String, Value>,
    pub resource_limits: BTreeMap<String, ResolvedResourceLimits>,
    layers: Vec<ResolvedLayer>,
    index: HashMap<String, usize>,
}

/// A layer as found while walking the (possibly nested) `layers` list.
struct LayerEntry {
    name: String,
    folder: Option<String>,
    body: Map<String, Value>,
}

impl ResolvedConfig {
    /// Resolve a document with the built-in index functions.
    pub fn from_document(doc: &Value) -> ConfigResult<Self> {
        Self::from_document_with(doc, &IndexRegistry::default())
    }

    /// Resolve a document, binding index functions from `registry`.
    pub fn from_document_with(doc: &Value, registry: &IndexRegistry) -> ConfigResult<Self> {
        let root = doc
            .as_object()
            .ok_or_else(|| ConfigError::Parse("configuration root must be a mapping".into()))?;
        let default_describe_maxage = default_describe_maxage(root)?;

        let mut entries = Vec::new();
        if let Some(layers) = root.get("layers").filter(|v| !v.is_null()) {
            flatten_layers(layers, None, "layers", &mut entries)?;
        }

        // Phase one: layers and named resource limits.
        let mut nodes = Vec::new();
        for entry in &entries {
            nodes.push(RawConfigNode::layer(&entry.name, entry.body.clone())?);
        }
        let named_limits = match root.get("resource_limits") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(obj)) => obj.clone(),
            Some(_) => {
                return Err(ConfigError::invalid("root", "resource_limits", "expected a mapping"))
            }
        };
        for (name, body) in &named_limits {
            let id = NodeId::resource_limits(name);
            let body = body
                .as_object()
                .ok_or_else(|| ConfigError::invalid(id.to_string(), "resource_limits", "expected a mapping"))?;
            nodes.push(RawConfigNode::resource_limits(id, body.clone())?);
        }
        let phase_one = resolve(nodes)?;

        // Phase two: styles and inline limits of the resolved layers.
        let mut nodes: Vec<RawConfigNode> = phase_one
            .iter()
            .filter(|(id, _)| matches!(id, NodeId::ResourceLimits(_)))
            .map(|(id, body)| RawConfigNode::new(id.clone(), body.clone()))
            .collect();
        let mut style_ids: HashMap<String, Vec<NodeId>> = HashMap::new();
        for entry in &entries {
            let body = resolved(&phase_one, &NodeId::layer(&entry.name))?;
            let ids = style_ids.entry(entry.name.clone()).or_default();
            for style in layer_styles(&entry.name, body)? {
                ids.push(style.id.clone());
                nodes.push(style);
            }
            if let Some(Value::Object(inline)) = body.get("resource_limits") {
                nodes.push(RawConfigNode::resource_limits(
                    NodeId::LayerLimits(entry.name.clone()),
                    inline.clone(),
                )?);
            }
        }
        let phase_two = resolve(nodes)?;

        // Typed construction.
        let mut resource_limits = BTreeMap::new();
        for name in named_limits.keys() {
            let id = NodeId::resource_limits(name);
            let limits = ResolvedResourceLimits::from_body(
                &id.to_string(),
                resolved(&phase_two, &id)?,
                default_describe_maxage,
            )?;
            resource_limits.insert(name.clone(), limits);
        }

        let mut layers = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        for entry in entries {
            let id = NodeId::layer(&entry.name);
            let body = resolved(&phase_one, &id)?;
            let limits = match body.get("resource_limits") {
                None | Some(Value::Null) => ResolvedResourceLimits::unlimited(default_describe_maxage),
                Some(Value::String(name)) => resource_limits
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownReference(NodeId::resource_limits(name).to_string()))?,
                Some(Value::Object(_)) => {
                    let inline = NodeId::LayerLimits(entry.name.clone());
                    ResolvedResourceLimits::from_body(
                        &inline.to_string(),
                        resolved(&phase_two, &inline)?,
                        default_describe_maxage,
                    )?
                }
                Some(_) => {
                    return Err(ConfigError::invalid(
                        id.to_string(),
                        "resource_limits",
                        "expected a name or a mapping",
                    ))
                }
            };
            let styles = style_ids
                .get(entry.name.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|sid| resolved(&phase_two, sid).map(|style| (sid.clone(), style)))
                .collect::<ConfigResult<Vec<_>>>()?;

            let layer = ResolvedLayer::build(
                LayerParts {
                    name: &entry.name,
                    folder: entry.folder,
                    body,
                    styles,
                    resource_limits: limits,
                },
                registry,
            )?;
            index.insert(layer.name.clone(), layers.len());
            layers.push(layer);
        }

        let global = root
            .iter()
            .filter(|(k, _)| k.as_str() != "layers" && k.as_str() != "resource_limits")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        info!(
            layers = layers.len(),
            styles = layers.iter().map(|l| l.styles.len()).sum::<usize>(),
            resource_limits = resource_limits.len(),
            "Configuration resolved"
        );

        Ok(Self {
            global,
            resource_limits,
            layers,
            index,
        })
    }

    pub fn layer(&self, name: &str) -> Option<&ResolvedLayer> {
        self.index.get(name).map(|&i| &self.layers[i])
    }

    /// Layers in declaration order, folders flattened.
    pub fn layers(&self) -> &[ResolvedLayer] {
        &self.layers
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }
}

fn resolved<'a>(nodes: &'a ResolvedNodes, id: &NodeId) -> ConfigResult<&'a Map<String, Value>> {
    nodes
        .get(id)
        .ok_or_else(|| ConfigError::UnknownReference(id.to_string()))
}

fn default_describe_maxage(root: &Map<String, Value>) -> ConfigResult<u64> {
    match root.get("wcs").and_then(|w| w.get("default_desc_cache_maxage")) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v.as_u64().ok_or_else(|| {
            ConfigError::invalid("wcs", "default_desc_cache_maxage", "expected a non-negative integer")
        }),
    }
}

/// Walk the layer tree. Entries with a `name` are layers; entries without
/// one but with a nested `layers` list are folders.
fn flatten_layers(
    value: &Value,
    folder: Option<&str>,
    path: &str,
    out: &mut Vec<LayerEntry>,
) -> ConfigResult<()> {
    let items = value
        .as_array()
        .ok_or_else(|| ConfigError::invalid(path, "layers", "expected a list"))?;
    for (i, item) in items.iter().enumerate() {
        let here = format!("{}[{}]", path, i);
        let obj = item
            .as_object()
            .ok_or_else(|| ConfigError::invalid(&here, "layers", "expected a mapping"))?;
        match obj.get("name") {
            Some(Value::String(name)) => out.push(LayerEntry {
                name: name.clone(),
                folder: folder.map(str::to_string),
                body: obj.clone(),
            }),
            Some(_) => return Err(ConfigError::invalid(&here, "name", "expected a string")),
            None => match obj.get("layers") {
                Some(children) => {
                    let title = obj.get("title").and_then(Value::as_str).or(folder);
                    debug!(folder = title, "Flattening folder");
                    flatten_layers(children, title, &format!("{}.layers", here), out)?;
                }
                None => return Err(ConfigError::missing(here, "name")),
            },
        }
    }
    Ok(())
}

/// Raw style nodes of a resolved layer body.
fn layer_styles(layer: &str, body: &Map<String, Value>) -> ConfigResult<Vec<RawConfigNode>> {
    let node = NodeId::layer(layer).to_string();
    let styles = match body.get("styling").and_then(|s| s.get("styles")) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ConfigError::invalid(&node, "styling.styles", "expected a list")),
    };
    styles
        .iter()
        .map(|style| {
            let obj = style
                .as_object()
                .ok_or_else(|| ConfigError::invalid(&node, "styling.styles", "expected a mapping"))?;
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ConfigError::missing(&node, "styling.styles.name"))?;
            RawConfigNode::style(layer, name, obj.clone())
        })
        .collect()
}
