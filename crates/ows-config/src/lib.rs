//! Configuration resolution for raster OWS layers.
//!
//! A configuration document is turned into a set of raw nodes (layers,
//! styles and resource limits), inheritance between nodes is resolved, and
//! the flattened bodies are compiled into typed, validated definitions held
//! behind an atomically swappable snapshot.

pub mod config;
pub mod layer;
pub mod loader;
pub mod raw;
pub mod resolver;
pub mod resource_limits;
pub mod snapshot;

pub use config::ResolvedConfig;
pub use layer::ResolvedLayer;
pub use loader::{load_config, load_document, parse_document, Format};
pub use raw::{NodeId, RawConfigNode};
pub use resolver::{deep_merge, resolve, ConfigResolver, ResolvedNodes};
pub use resource_limits::{
    CacheRule, LimitDecision, ResolvedResourceLimits, Service, ServiceLimits,
};
pub use snapshot::ConfigHandle;
