//! Error taxonomy for configuration resolution and rendering.
//!
//! Configuration-time failures (`ConfigError`, and the `BandError` / `FlagError`
//! values it wraps) are fatal to the configuration unit being loaded. The only
//! error a render call can produce is `StyleError`.

use thiserror::Error;

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure to resolve or validate a configuration unit.
#[derive(Debug, Error)]
pub enum ConfigError {
    // === Inheritance ===
    #[error("Cyclic inheritance: {}", .0.join(" -> "))]
    CyclicInheritance(Vec<String>),

    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    #[error("Invalid inherits value in {node}: {message}")]
    InvalidReference { node: String, message: String },

    // === Structure ===
    #[error("Missing required field '{field}' in {node}")]
    MissingField { node: String, field: String },

    #[error("Invalid value for '{field}' in {node}: {message}")]
    InvalidValue {
        node: String,
        field: String,
        message: String,
    },

    #[error("Duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },

    // === Styles ===
    #[error("Invalid colour ramp in {style}: {message}")]
    InvalidRamp { style: String, message: String },

    #[error("Conflicting style definition in {style}: {message}")]
    ConflictingStyleKind { style: String, message: String },

    #[error("Band error in {node}: {source}")]
    Band {
        node: String,
        #[source]
        source: BandError,
    },

    #[error("Flag error in {node}: {source}")]
    Flag {
        node: String,
        #[source]
        source: FlagError,
    },

    // === Loading ===
    #[error("Failed to read configuration: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn missing(node: impl Into<String>, field: impl Into<String>) -> Self {
        ConfigError::MissingField {
            node: node.into(),
            field: field.into(),
        }
    }

    pub fn invalid(
        node: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            node: node.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn band(node: impl Into<String>, source: BandError) -> Self {
        ConfigError::Band {
            node: node.into(),
            source,
        }
    }

    pub fn flag(node: impl Into<String>, source: FlagError) -> Self {
        ConfigError::Flag {
            node: node.into(),
            source,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(format!("JSON error: {}", err))
    }
}

/// Unresolvable band references in band algebra.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BandError {
    #[error("Band '{0}' is not declared by the layer")]
    UnknownBand(String),

    #[error("Band '{0}' is referenced but not listed in needed_bands")]
    UndeclaredBand(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function '{function}' is missing argument '{argument}'")]
    MissingArgument { function: String, argument: String },

    #[error("Invalid argument '{argument}' for function '{function}': {message}")]
    InvalidArgument {
        function: String,
        argument: String,
        message: String,
    },

    #[error("Cannot parse expression '{expression}' at position {position}: {message}")]
    Expression {
        expression: String,
        position: usize,
        message: String,
    },
}

/// Unresolvable flag references in mask and value-map expressions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlagError {
    #[error("Unknown flag: {0}")]
    UnknownFlag(String),

    #[error("Band '{0}' has no flag definitions")]
    UnknownFlagBand(String),

    #[error("Invalid flag expression: {0}")]
    InvalidExpression(String),

    #[error("Invalid flag definition for '{flag}': {message}")]
    InvalidDefinition { flag: String, message: String },
}

/// Malformed colour ramp definitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RampError {
    #[error("ramp has no control points")]
    Empty,

    #[error("color_ramp must be a list")]
    NotAList,

    #[error("control point value {0} is not finite")]
    NonFinite(f64),

    #[error("control points out of order: {next} follows {prev}")]
    OutOfOrder { prev: f64, next: f64 },

    #[error("invalid control point {point}: {message}")]
    InvalidPoint { point: String, message: String },

    #[error("range [{min}, {max}] is empty")]
    EmptyRange { min: f64, max: f64 },

    #[error("unknown palette '{0}'")]
    UnknownPalette(String),
}

/// Malformed `bands` declarations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BandIndexError {
    #[error("'{name}' refers to both '{first}' and '{second}'")]
    Conflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("invalid band declaration: {0}")]
    InvalidDeclaration(String),
}

/// Request-level rendering failures.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("Style does not support {0} date(s)")]
    UnsupportedDateCount(usize),

    #[error("Band '{0}' was not supplied")]
    MissingBand(String),

    #[error("Band '{band}' has {actual} samples, expected {expected}")]
    ShapeMismatch {
        band: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Flag(#[from] FlagError),
}
