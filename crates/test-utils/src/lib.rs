//! Shared test utilities for the ows-engine workspace.
//!
//! This crate provides common testing infrastructure including:
//! - The reference configuration document, as JSON and YAML
//! - Band array generators (reflectance ramps, flag patterns, no-data holes)
//! - Temporary configuration files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{reference_config, ramp_band};
//! ```

pub mod files;
pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use files::*;
pub use fixtures::*;
pub use generators::*;
