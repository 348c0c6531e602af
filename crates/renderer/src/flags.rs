//! Bit-flag decoding and boolean flag expressions.
//!
//! Mask bands pack several categorical flags into one integer. A
//! [`FlagDefinitions`] table decodes a raw sample into named
//! [`FlagValue`]s, and a [`FlagExpression`] is evaluated against them.

use ows_common::FlagError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Decoded value of one flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
    /// Enum flag whose raw value has no entry in the definition.
    Undefined,
}

impl FlagValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(FlagValue::Bool(*b)),
            Value::String(s) => Some(FlagValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Text(s) => write!(f, "{}", s),
            FlagValue::Undefined => write!(f, "<undefined>"),
        }
    }
}

/// Flag name to decoded value, for one pixel.
pub type FlagValues = HashMap<String, FlagValue>;

/// Convert a raw mask sample to an integer; NaN and negative values carry no flags.
pub fn raw_sample(value: f32) -> Option<u32> {
    if value.is_finite() && value >= 0.0 {
        Some(value as u32)
    } else {
        None
    }
}

/// Bit layout and value table of a single flag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagDefinition {
    mask: u32,
    shift: u32,
    values: BTreeMap<u32, FlagValue>,
    boolean: bool,
    pub description: Option<String>,
}

impl FlagDefinition {
    /// Parse `{bits: n | [n, ...], values: {"<int>": bool | string}}`.
    pub fn from_value(name: &str, value: &Value) -> Result<Self, FlagError> {
        let invalid = |message: String| FlagError::InvalidDefinition {
            flag: name.to_string(),
            message,
        };
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("definition must be a mapping".to_string()))?;

        let bits: Vec<u64> = match obj.get("bits") {
            Some(Value::Number(n)) => vec![n.as_u64().ok_or_else(|| invalid(format!("bad bit {}", n)))?],
            Some(Value::Array(items)) => items
                .iter()
                .map(|b| b.as_u64().ok_or_else(|| invalid(format!("bad bit {}", b))))
                .collect::<Result<_, _>>()?,
            _ => return Err(invalid("missing 'bits'".to_string())),
        };
        if bits.is_empty() || bits.iter().any(|&b| b >= 32) {
            return Err(invalid("bits must be a non-empty list of values below 32".to_string()));
        }
        let mask = bits.iter().fold(0u32, |acc, &b| acc | (1u32 << b));
        let shift = bits.iter().copied().min().unwrap_or(0) as u32;

        let table = obj
            .get("values")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("missing 'values' mapping".to_string()))?;
        let mut values = BTreeMap::new();
        for (key, v) in table {
            let raw: u32 = key
                .trim()
                .parse()
                .map_err(|_| invalid(format!("value key '{}' is not an integer", key)))?;
            let decoded = FlagValue::from_json(v)
                .ok_or_else(|| invalid(format!("value for {} must be a bool or string", raw)))?;
            values.insert(raw, decoded);
        }
        if values.is_empty() {
            return Err(invalid("'values' is empty".to_string()));
        }
        let boolean = values.values().all(|v| matches!(v, FlagValue::Bool(_)));

        Ok(Self {
            mask,
            shift,
            values,
            boolean,
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Decode this flag from a raw sample.
    pub fn decode(&self, raw: u32) -> FlagValue {
        let field = (raw & self.mask) >> self.shift;
        match self.values.get(&field) {
            Some(v) => v.clone(),
            None if self.boolean => FlagValue::Bool(false),
            None => FlagValue::Undefined,
        }
    }

    /// Whether `expected` can ever be produced by this flag.
    pub fn accepts(&self, expected: &FlagValue) -> bool {
        match expected {
            FlagValue::Bool(false) if self.boolean => true,
            other => self.values.values().any(|v| v == other),
        }
    }
}

/// All flags encoded in one mask band.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagDefinitions {
    flags: BTreeMap<String, FlagDefinition>,
}

impl FlagDefinitions {
    /// Parse a `flags_definition` mapping.
    pub fn from_value(value: &Value) -> Result<Self, FlagError> {
        let obj = value.as_object().ok_or_else(|| {
            FlagError::InvalidExpression("flags_definition must be a mapping".to_string())
        })?;
        let mut flags = BTreeMap::new();
        for (name, def) in obj {
            flags.insert(name.clone(), FlagDefinition::from_value(name, def)?);
        }
        Ok(Self { flags })
    }

    pub fn get(&self, name: &str) -> Option<&FlagDefinition> {
        self.flags.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    /// Decode every flag from a raw sample.
    pub fn decode(&self, raw: u32) -> FlagValues {
        self.flags
            .iter()
            .map(|(name, def)| (name.clone(), def.decode(raw)))
            .collect()
    }
}

/// Boolean expression over decoded flags.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagExpression {
    Leaf { flag: String, expected: FlagValue },
    And(Vec<FlagExpression>),
    Or(Vec<FlagExpression>),
    Invert(Box<FlagExpression>),
}

impl FlagExpression {
    /// Parse the mapping form used in configuration.
    ///
    /// `and` / `or` take a mapping of sub-expressions, `invert` wraps an
    /// expression, and any other key is a leaf. Several keys at one level are
    /// combined with `and`.
    pub fn from_value(value: &Value) -> Result<Self, FlagError> {
        let obj = value.as_object().ok_or_else(|| {
            FlagError::InvalidExpression(format!("expected a mapping, got {}", value))
        })?;
        let mut terms = Self::parse_entries(obj)?;
        if terms.len() == 1 {
            Ok(terms.remove(0))
        } else {
            Ok(FlagExpression::And(terms))
        }
    }

    fn parse_entries(obj: &Map<String, Value>) -> Result<Vec<Self>, FlagError> {
        obj.iter().map(|(k, v)| Self::parse_entry(k, v)).collect()
    }

    fn parse_entry(key: &str, value: &Value) -> Result<Self, FlagError> {
        match key {
            "and" | "or" => {
                let obj = value.as_object().ok_or_else(|| {
                    FlagError::InvalidExpression(format!("'{}' needs a mapping", key))
                })?;
                let terms = Self::parse_entries(obj)?;
                Ok(if key == "and" {
                    FlagExpression::And(terms)
                } else {
                    FlagExpression::Or(terms)
                })
            }
            "invert" => Ok(FlagExpression::Invert(Box::new(Self::from_value(value)?))),
            flag => {
                let expected = FlagValue::from_json(value).ok_or_else(|| {
                    FlagError::InvalidExpression(format!(
                        "flag '{}' must be compared with a bool or string",
                        flag
                    ))
                })?;
                Ok(FlagExpression::Leaf {
                    flag: flag.to_string(),
                    expected,
                })
            }
        }
    }

    pub fn evaluate(&self, flags: &FlagValues) -> Result<bool, FlagError> {
        match self {
            FlagExpression::Leaf { flag, expected } => flags
                .get(flag)
                .map(|actual| actual == expected)
                .ok_or_else(|| FlagError::UnknownFlag(flag.clone())),
            FlagExpression::And(terms) => {
                for term in terms {
                    if !term.evaluate(flags)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FlagExpression::Or(terms) => {
                for term in terms {
                    if term.evaluate(flags)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FlagExpression::Invert(inner) => Ok(!inner.evaluate(flags)?),
        }
    }

    /// Check every leaf against the band's definitions.
    pub fn validate(&self, defs: &FlagDefinitions) -> Result<(), FlagError> {
        match self {
            FlagExpression::Leaf { flag, expected } => {
                let def = defs
                    .get(flag)
                    .ok_or_else(|| FlagError::UnknownFlag(flag.clone()))?;
                if def.accepts(expected) {
                    Ok(())
                } else {
                    Err(FlagError::InvalidExpression(format!(
                        "flag '{}' never takes the value {}",
                        flag, expected
                    )))
                }
            }
            FlagExpression::And(terms) | FlagExpression::Or(terms) => {
                terms.iter().try_for_each(|t| t.validate(defs))
            }
            FlagExpression::Invert(inner) => inner.validate(defs),
        }
    }
}

/// Shorthand for [`FlagExpression::evaluate`].
pub fn evaluate(expr: &FlagExpression, flags: &FlagValues) -> Result<bool, FlagError> {
    expr.evaluate(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_multi_bit_decode() {
        let def = FlagDefinition::from_value(
            "wet",
            &json!({"bits": [7, 6, 5, 4, 3, 1, 0], "values": {"128": true}}),
        )
        .unwrap();
        assert_eq!(def.decode(128), FlagValue::Bool(true));
        assert_eq!(def.decode(128 | 4), FlagValue::Bool(true));
        assert_eq!(def.decode(128 | 64), FlagValue::Bool(false));
        assert_eq!(def.decode(0), FlagValue::Bool(false));
    }

    #[test]
    fn test_enum_decode() {
        let def = FlagDefinition::from_value(
            "land_class",
            &json!({"bits": [4, 5], "values": {"0": "water", "1": "land"}}),
        )
        .unwrap();
        assert_eq!(def.decode(0b01_0000), FlagValue::Text("land".into()));
        assert_eq!(def.decode(0b11_0000), FlagValue::Undefined);
    }

    #[test]
    fn test_bad_bits_rejected() {
        assert!(FlagDefinition::from_value("x", &json!({"bits": 40, "values": {"1": true}})).is_err());
        assert!(FlagDefinition::from_value("x", &json!({"values": {"1": true}})).is_err());
        assert!(FlagDefinition::from_value("x", &json!({"bits": 1, "values": {"a": true}})).is_err());
    }

    #[test]
    fn test_implicit_and() {
        let expr = FlagExpression::from_value(&json!({"dry": true, "sea": false})).unwrap();
        assert!(matches!(expr, FlagExpression::And(ref t) if t.len() == 2));
    }
}
