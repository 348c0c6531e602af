//! Tests for inheritance resolution.

use ows_common::ConfigError;
use ows_config::{resolve, ConfigResolver, NodeId, RawConfigNode, ResolvedConfig};
use serde_json::{json, Map, Value};
use test_utils::reference_config;

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().unwrap().clone()
}

fn node(name: &str, body: Value) -> RawConfigNode {
    RawConfigNode::new(NodeId::layer(name), obj(body))
}

fn child(name: &str, parent: &str, body: Value) -> RawConfigNode {
    node(name, body).with_parent(NodeId::layer(parent))
}

/// A ring of `len` layers, each inheriting from the next.
fn ring(len: usize) -> Vec<RawConfigNode> {
    (0..len)
        .map(|i| {
            child(
                &format!("n{}", i),
                &format!("n{}", (i + 1) % len),
                json!({"i": i}),
            )
        })
        .collect()
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_child_overrides_only_declared_keys() {
    let resolved = resolve(vec![
        node("base", json!({"a": 1, "b": {"x": 1, "y": 2}, "c": [1, 2], "d": "keep"})),
        child("derived", "base", json!({"b": {"y": 3}, "c": [9]})),
    ])
    .unwrap();

    assert_eq!(
        Value::Object(resolved[&NodeId::layer("derived")].clone()),
        json!({"a": 1, "b": {"x": 1, "y": 3}, "c": [9], "d": "keep"})
    );
    // The parent is untouched.
    assert_eq!(resolved[&NodeId::layer("base")]["b"], json!({"x": 1, "y": 2}));
}

#[test]
fn test_three_link_chain_matches_manual_flattening() {
    let resolved = resolve(vec![
        child("c", "b", json!({"x": 3, "m": {"p": 4}})),
        child("b", "a", json!({"y": 2, "m": {"q": 2}})),
        node("a", json!({"x": 1, "m": {"p": 1}, "z": [0]})),
    ])
    .unwrap();

    let manual = json!({"x": 3, "m": {"p": 4, "q": 2}, "y": 2, "z": [0]});
    assert_eq!(Value::Object(resolved[&NodeId::layer("c")].clone()), manual);
}

#[test]
fn test_unknown_keys_preserved() {
    let resolved = resolve(vec![
        node("a", json!({"future_option": {"enabled": true}})),
        child("b", "a", json!({})),
    ])
    .unwrap();
    assert_eq!(
        resolved[&NodeId::layer("b")]["future_option"],
        json!({"enabled": true})
    );
}

#[test]
fn test_resolution_is_idempotent() {
    let nodes = vec![
        node("a", json!({"x": 1})),
        child("b", "a", json!({"y": 2})),
        child("c", "b", json!({"z": 3})),
    ];
    assert_eq!(resolve(nodes.clone()).unwrap(), resolve(nodes).unwrap());

    let doc = reference_config();
    assert_eq!(
        ResolvedConfig::from_document(&doc).unwrap(),
        ResolvedConfig::from_document(&doc).unwrap()
    );
}

#[test]
fn test_single_node_resolution() {
    let resolver = ConfigResolver::new(vec![node("a", json!({"x": 1})), child("b", "a", json!({}))]).unwrap();
    assert_eq!(resolver.len(), 2);
    assert_eq!(resolver.resolve(&NodeId::layer("b")).unwrap()["x"], 1);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_self_inheritance_is_a_cycle() {
    let err = resolve(ring(1)).unwrap_err();
    let ConfigError::CyclicInheritance(path) = err else {
        panic!("expected a cycle");
    };
    assert_eq!(path, vec!["layer:n0", "layer:n0"]);
}

#[test]
fn test_two_node_cycle() {
    let err = resolve(ring(2)).unwrap_err();
    let ConfigError::CyclicInheritance(path) = err else {
        panic!("expected a cycle");
    };
    assert_eq!(path, vec!["layer:n0", "layer:n1", "layer:n0"]);
}

#[test]
fn test_five_node_cycle() {
    let err = resolve(ring(5)).unwrap_err();
    let ConfigError::CyclicInheritance(path) = err else {
        panic!("expected a cycle");
    };
    assert_eq!(path.len(), 6);
    assert_eq!(path.first(), path.last());
}

#[test]
fn test_cycle_behind_a_valid_prefix() {
    let mut nodes = ring(2);
    nodes.push(child("tail", "n0", json!({})));
    assert!(matches!(
        resolve(nodes),
        Err(ConfigError::CyclicInheritance(_))
    ));
}

#[test]
fn test_unknown_reference() {
    let err = resolve(vec![child("a", "missing", json!({}))]).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownReference(ref id) if id == "layer:missing"));
}

#[test]
fn test_node_kinds_do_not_collide() {
    let resolved = resolve(vec![
        node("same", json!({"kind": "layer"})),
        RawConfigNode::new(NodeId::resource_limits("same"), obj(json!({"kind": "limits"}))),
    ])
    .unwrap();
    assert_eq!(resolved.len(), 2);
}
