//! Tests for flag decoding and flag expression evaluation.

use ows_common::FlagError;
use renderer::flags::{FlagDefinitions, FlagExpression, FlagValue, FlagValues};
use serde_json::json;
use test_utils::{wofs, wofs_flags_definition};

fn flags(pairs: &[(&str, bool)]) -> FlagValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), FlagValue::Bool(*v)))
        .collect()
}

fn expr(value: serde_json::Value) -> FlagExpression {
    FlagExpression::from_value(&value).unwrap()
}

// ============================================================================
// Expression evaluation
// ============================================================================

#[test]
fn test_and_requires_all_leaves() {
    let e = expr(json!({"and": {"wet": true, "sea": false}}));

    assert!(e.evaluate(&flags(&[("wet", true), ("sea", false)])).unwrap());
    assert!(!e.evaluate(&flags(&[("wet", true), ("sea", true)])).unwrap());
    assert!(!e.evaluate(&flags(&[("wet", false), ("sea", false)])).unwrap());
    assert!(!e.evaluate(&flags(&[("wet", false), ("sea", true)])).unwrap());
}

#[test]
fn test_invert_is_complement() {
    let plain = expr(json!({"and": {"wet": true, "sea": false}}));
    let inverted = expr(json!({"invert": {"and": {"wet": true, "sea": false}}}));

    for wet in [true, false] {
        for sea in [true, false] {
            let values = flags(&[("wet", wet), ("sea", sea)]);
            assert_eq!(
                inverted.evaluate(&values).unwrap(),
                !plain.evaluate(&values).unwrap()
            );
        }
    }
}

#[test]
fn test_empty_or_is_false_and_empty_and_is_true() {
    let values = flags(&[("wet", true)]);
    assert!(!expr(json!({"or": {}})).evaluate(&values).unwrap());
    assert!(expr(json!({"and": {}})).evaluate(&values).unwrap());
}

#[test]
fn test_or_matches_any_leaf() {
    let e = expr(json!({"or": {"wet": true, "sea": true}}));
    assert!(e.evaluate(&flags(&[("wet", false), ("sea", true)])).unwrap());
    assert!(!e.evaluate(&flags(&[("wet", false), ("sea", false)])).unwrap());
}

#[test]
fn test_missing_flag_is_an_error() {
    let e = expr(json!({"cloud": true}));
    assert_eq!(
        e.evaluate(&flags(&[("wet", true)])),
        Err(FlagError::UnknownFlag("cloud".to_string()))
    );
}

#[test]
fn test_enum_leaf() {
    let e = expr(json!({"scene": "water"}));
    let mut values = FlagValues::new();
    values.insert("scene".into(), FlagValue::Text("water".into()));
    assert!(e.evaluate(&values).unwrap());
    values.insert("scene".into(), FlagValue::Undefined);
    assert!(!e.evaluate(&values).unwrap());
}

#[test]
fn test_non_mapping_expression_rejected() {
    assert!(FlagExpression::from_value(&json!(["wet"])).is_err());
    assert!(FlagExpression::from_value(&json!({"wet": 1})).is_err());
    assert!(FlagExpression::from_value(&json!({"and": true})).is_err());
}

// ============================================================================
// Decoding against real definitions
// ============================================================================

#[test]
fn test_wofs_decoding() {
    let defs = FlagDefinitions::from_value(&wofs_flags_definition()).unwrap();

    let wet = defs.decode(wofs::WET);
    assert_eq!(wet["wet"], FlagValue::Bool(true));
    assert_eq!(wet["dry"], FlagValue::Bool(false));
    assert_eq!(wet["sea"], FlagValue::Bool(false));

    let dry_sea = defs.decode(wofs::DRY | wofs::SEA);
    assert_eq!(dry_sea["dry"], FlagValue::Bool(true));
    assert_eq!(dry_sea["sea"], FlagValue::Bool(true));

    let cloudy = defs.decode(wofs::CLOUD);
    assert_eq!(cloudy["cloud"], FlagValue::Bool(true));
    assert_eq!(cloudy["dry"], FlagValue::Bool(false));
    assert_eq!(cloudy["wet"], FlagValue::Bool(false));
}

#[test]
fn test_decoded_values_drive_expressions() {
    let defs = FlagDefinitions::from_value(&wofs_flags_definition()).unwrap();
    let e = expr(json!({"and": {"wet": true, "sea": false}}));

    assert!(e.evaluate(&defs.decode(wofs::WET)).unwrap());
    assert!(!e.evaluate(&defs.decode(wofs::WET | wofs::SEA)).unwrap());
    assert!(!e.evaluate(&defs.decode(wofs::WET | wofs::CLOUD)).unwrap());
}

#[test]
fn test_validate_against_definitions() {
    let defs = FlagDefinitions::from_value(&wofs_flags_definition()).unwrap();

    assert!(expr(json!({"or": {"wet": true, "cloud": false}})).validate(&defs).is_ok());
    assert_eq!(
        expr(json!({"glint": true})).validate(&defs),
        Err(FlagError::UnknownFlag("glint".to_string()))
    );
    // 'wet' only ever decodes to a boolean.
    assert!(expr(json!({"wet": "yes"})).validate(&defs).is_err());
}
