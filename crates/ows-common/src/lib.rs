//! Common types shared across the ows-engine crates.

pub mod bbox;
pub mod color;
pub mod error;
pub mod time;

pub use bbox::BoundingBox;
pub use color::Rgba;
pub use error::{
    BandError, BandIndexError, ConfigError, ConfigResult, FlagError, RampError, StyleError,
};
pub use time::{DatasetTime, GroupBy, GroupKey, SearchWindow, TimeError, TimeResolution};
