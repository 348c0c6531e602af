//! Raw configuration nodes.
//!
//! A node is an untyped mapping plus an optional reference to the node it
//! inherits from. Nodes are built from the configuration document and only
//! ever read by the resolver.

use ows_common::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of an inheritable configuration node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Layer(String),
    Style { layer: String, style: String },
    /// Named resource limits from the document's `resource_limits` section.
    ResourceLimits(String),
    /// Resource limits declared inline on a layer.
    LayerLimits(String),
}

impl NodeId {
    pub fn layer(name: impl Into<String>) -> Self {
        NodeId::Layer(name.into())
    }

    pub fn style(layer: impl Into<String>, style: impl Into<String>) -> Self {
        NodeId::Style {
            layer: layer.into(),
            style: style.into(),
        }
    }

    pub fn resource_limits(name: impl Into<String>) -> Self {
        NodeId::ResourceLimits(name.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Layer(name) => write!(f, "layer:{}", name),
            NodeId::Style { layer, style } => write!(f, "style:{}/{}", layer, style),
            NodeId::ResourceLimits(name) => write!(f, "resource_limits:{}", name),
            NodeId::LayerLimits(layer) => write!(f, "layer:{}/resource_limits", layer),
        }
    }
}

/// An unresolved node: local keys plus the parent it inherits from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawConfigNode {
    pub id: NodeId,
    pub inherits: Option<NodeId>,
    /// Local keys, without `inherits`.
    pub body: Map<String, Value>,
}

impl RawConfigNode {
    pub fn new(id: NodeId, body: Map<String, Value>) -> Self {
        Self {
            id,
            inherits: None,
            body,
        }
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.inherits = Some(parent);
        self
    }

    /// Build a layer node, reading `inherits` as `{layer: X}` or `"X"`.
    pub fn layer(name: &str, mut body: Map<String, Value>) -> ConfigResult<Self> {
        let id = NodeId::layer(name);
        let inherits = match body.remove("inherits") {
            None | Some(Value::Null) => None,
            Some(Value::String(parent)) => Some(NodeId::layer(parent)),
            Some(Value::Object(obj)) => match obj.get("layer").and_then(Value::as_str) {
                Some(parent) => Some(NodeId::layer(parent)),
                None => return Err(bad_reference(&id, "expected {layer: <name>}")),
            },
            Some(_) => return Err(bad_reference(&id, "expected a layer name")),
        };
        Ok(Self { id, inherits, body })
    }

    /// Build a style node, reading `inherits` as `{layer?: L, style: S}`.
    ///
    /// A missing `layer` refers to the style's own layer.
    pub fn style(layer: &str, name: &str, mut body: Map<String, Value>) -> ConfigResult<Self> {
        let id = NodeId::style(layer, name);
        let inherits = match body.remove("inherits") {
            None | Some(Value::Null) => None,
            Some(Value::Object(obj)) => {
                let parent_layer = obj.get("layer").and_then(Value::as_str).unwrap_or(layer);
                match obj.get("style").and_then(Value::as_str) {
                    Some(style) => Some(NodeId::style(parent_layer, style)),
                    None => return Err(bad_reference(&id, "expected {layer?: <name>, style: <name>}")),
                }
            }
            Some(Value::String(style)) => Some(NodeId::style(layer, style)),
            Some(_) => return Err(bad_reference(&id, "expected a style reference")),
        };
        Ok(Self { id, inherits, body })
    }

    /// Build a resource-limits node, reading `inherits` as a name.
    pub fn resource_limits(id: NodeId, mut body: Map<String, Value>) -> ConfigResult<Self> {
        let inherits = match body.remove("inherits") {
            None | Some(Value::Null) => None,
            Some(Value::String(parent)) => Some(NodeId::resource_limits(parent)),
            Some(_) => return Err(bad_reference(&id, "expected a resource limits name")),
        };
        Ok(Self { id, inherits, body })
    }
}

fn bad_reference(id: &NodeId, message: &str) -> ConfigError {
    ConfigError::InvalidReference {
        node: id.to_string(),
        message: message.to_string(),
    }
}
