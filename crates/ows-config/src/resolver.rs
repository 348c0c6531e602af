//! Inheritance resolution.
//!
//! Every node is resolved by first resolving its parent (memoized), then
//! overlaying the node's own keys. Mapping values merge key by key with the
//! child winning; any other value in the child replaces the parent's.

use ows_common::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::raw::{NodeId, RawConfigNode};

/// Fully flattened node bodies, keyed by node id.
pub type ResolvedNodes = BTreeMap<NodeId, Map<String, Value>>;

/// A complete set of raw nodes, ready to resolve.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    nodes: HashMap<NodeId, RawConfigNode>,
}

impl ConfigResolver {
    /// Collect nodes; a repeated id is a duplicate definition.
    pub fn new(nodes: impl IntoIterator<Item = RawConfigNode>) -> ConfigResult<Self> {
        let mut map = HashMap::new();
        for node in nodes {
            if let Some(prev) = map.insert(node.id.clone(), node) {
                return Err(duplicate(&prev.id));
            }
        }
        Ok(Self { nodes: map })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve every node. Either all nodes resolve or none are returned.
    pub fn resolve_all(&self) -> ConfigResult<ResolvedNodes> {
        let mut memo = HashMap::with_capacity(self.nodes.len());
        let mut ids: Vec<&NodeId> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            self.resolve_node(id, &mut memo, &mut Vec::new())?;
        }
        debug!(nodes = memo.len(), "Resolved configuration nodes");
        Ok(memo.into_iter().collect())
    }

    /// Resolve a single node and its ancestors.
    pub fn resolve(&self, id: &NodeId) -> ConfigResult<Map<String, Value>> {
        self.resolve_node(id, &mut HashMap::new(), &mut Vec::new())
    }

    fn resolve_node(
        &self,
        id: &NodeId,
        memo: &mut HashMap<NodeId, Map<String, Value>>,
        visiting: &mut Vec<NodeId>,
    ) -> ConfigResult<Map<String, Value>> {
        if let Some(done) = memo.get(id) {
            return Ok(done.clone());
        }
        if let Some(pos) = visiting.iter().position(|v| v == id) {
            let mut path: Vec<String> = visiting[pos..].iter().map(NodeId::to_string).collect();
            path.push(id.to_string());
            return Err(ConfigError::CyclicInheritance(path));
        }
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ConfigError::UnknownReference(id.to_string()))?;

        let resolved = match &node.inherits {
            None => node.body.clone(),
            Some(parent) => {
                visiting.push(id.clone());
                let base = self.resolve_node(parent, memo, visiting)?;
                visiting.pop();
                deep_merge(&base, &node.body)
            }
        };
        memo.insert(id.clone(), resolved.clone());
        Ok(resolved)
    }
}

/// Resolve a node set in one call.
pub fn resolve(nodes: impl IntoIterator<Item = RawConfigNode>) -> ConfigResult<ResolvedNodes> {
    ConfigResolver::new(nodes)?.resolve_all()
}

/// Overlay `child` onto `parent`.
///
/// Parent key order is kept; keys only the child has are appended.
pub fn deep_merge(parent: &Map<String, Value>, child: &Map<String, Value>) -> Map<String, Value> {
    let mut out = parent.clone();
    for (key, value) in child {
        let merged = match (out.get(key), value) {
            (Some(Value::Object(base)), Value::Object(over)) => Value::Object(deep_merge(base, over)),
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

fn duplicate(id: &NodeId) -> ConfigError {
    let (kind, name) = match id {
        NodeId::Layer(name) => ("layer", name.clone()),
        NodeId::Style { layer, style } => ("style", format!("{}/{}", layer, style)),
        NodeId::ResourceLimits(name) => ("resource limits", name.clone()),
        NodeId::LayerLimits(layer) => ("resource limits", format!("{} (inline)", layer)),
    };
    ConfigError::Duplicate { kind, name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_deep_merge_child_wins() {
        let parent = obj(json!({"a": 1, "m": {"x": 1, "y": {"k": 1}}, "l": [1, 2]}));
        let child = obj(json!({"m": {"y": {"k": 2}, "z": 3}, "l": [3], "n": null}));
        assert_eq!(
            Value::Object(deep_merge(&parent, &child)),
            json!({"a": 1, "m": {"x": 1, "y": {"k": 2}, "z": 3}, "l": [3], "n": null})
        );
    }

    #[test]
    fn test_mapping_replaces_scalar() {
        let parent = obj(json!({"resource_limits": "continental"}));
        let child = obj(json!({"resource_limits": {"inherits": "continental"}}));
        assert_eq!(
            deep_merge(&parent, &child)["resource_limits"],
            json!({"inherits": "continental"})
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let nodes = vec![
            RawConfigNode::new(NodeId::layer("a"), Map::new()),
            RawConfigNode::new(NodeId::layer("a"), Map::new()),
        ];
        assert!(matches!(
            ConfigResolver::new(nodes),
            Err(ConfigError::Duplicate { kind: "layer", .. })
        ));
    }
}
