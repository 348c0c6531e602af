//! Band alias resolution.
//!
//! A layer declares its native bands and the aliases each one answers to.
//! Styles are compiled against this index so every band reference is
//! canonicalised to a native name before rendering.

use ows_common::{BandError, BandIndexError};
use serde_json::Value;
use std::collections::HashMap;

/// Native band names of a layer and the aliases that map onto them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandIndex {
    native: Vec<String>,
    lookup: HashMap<String, String>,
}

impl BandIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `bands` section: `{native: [alias, ...]}` or `[native, ...]`.
    pub fn from_value(value: &Value) -> Result<Self, BandIndexError> {
        let mut index = Self::new();
        match value {
            Value::Object(map) => {
                for (native, aliases) in map {
                    let aliases = match aliases {
                        Value::Array(items) => items
                            .iter()
                            .map(|a| {
                                a.as_str()
                                    .map(str::to_string)
                                    .ok_or_else(|| {
                                        BandIndexError::InvalidDeclaration(format!(
                                            "alias of '{}' is not a string",
                                            native
                                        ))
                                    })
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                        Value::Null => Vec::new(),
                        _ => {
                            return Err(BandIndexError::InvalidDeclaration(format!(
                                "aliases of '{}' must be a list",
                                native
                            )))
                        }
                    };
                    index.insert(native, aliases)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    let native = item.as_str().ok_or_else(|| {
                        BandIndexError::InvalidDeclaration("band names must be strings".to_string())
                    })?;
                    index.insert(native, Vec::<String>::new())?;
                }
            }
            Value::Null => {}
            _ => {
                return Err(BandIndexError::InvalidDeclaration(
                    "bands must be a mapping or a list".to_string(),
                ))
            }
        }
        Ok(index)
    }

    /// Declare a native band with its aliases.
    pub fn insert<S: Into<String>>(
        &mut self,
        native: &str,
        aliases: impl IntoIterator<Item = S>,
    ) -> Result<(), BandIndexError> {
        self.claim(native, native)?;
        self.native.push(native.to_string());
        for alias in aliases {
            let alias = alias.into();
            self.claim(&alias, native)?;
        }
        Ok(())
    }

    fn claim(&mut self, name: &str, native: &str) -> Result<(), BandIndexError> {
        match self.lookup.get(name) {
            Some(existing) if existing != native => Err(BandIndexError::Conflict {
                name: name.to_string(),
                first: existing.clone(),
                second: native.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.lookup.insert(name.to_string(), native.to_string());
                Ok(())
            }
        }
    }

    /// Native name for a band name or alias.
    pub fn canonical(&self, name: &str) -> Result<&str, BandError> {
        self.lookup
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| BandError::UnknownBand(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Native band names in declaration order.
    pub fn natives(&self) -> &[String] {
        &self.native
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_empty()
    }
}
