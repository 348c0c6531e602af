//! Shared handle to the current configuration.
//!
//! Readers take an `Arc` snapshot at request start and keep using it for the
//! whole request. A reload resolves the complete document first and only then
//! swaps the snapshot, so a failed reload leaves the previous one in place.

use ows_common::ConfigResult;
use renderer::band_math::IndexRegistry;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::loader;

struct Current {
    config: Arc<ResolvedConfig>,
    generation: u64,
}

/// Atomically swappable configuration snapshot.
pub struct ConfigHandle {
    current: RwLock<Current>,
    registry: IndexRegistry,
}

impl ConfigHandle {
    /// Wrap an already resolved configuration as generation 1.
    pub fn new(config: ResolvedConfig) -> Self {
        Self::with_registry(config, IndexRegistry::default())
    }

    /// As `new`, with the index functions used by later reloads.
    pub fn with_registry(config: ResolvedConfig, registry: IndexRegistry) -> Self {
        Self {
            current: RwLock::new(Current {
                config: Arc::new(config),
                generation: 1,
            }),
            registry,
        }
    }

    pub fn from_document(doc: &Value) -> ConfigResult<Self> {
        Ok(Self::new(ResolvedConfig::from_document(doc)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Ok(Self::new(loader::load_config(path)?))
    }

    /// The configuration in effect right now.
    pub fn snapshot(&self) -> Arc<ResolvedConfig> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current.config)
    }

    pub fn generation(&self) -> u64 {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Resolve `doc` and publish it. Returns the new generation.
    pub fn reload(&self, doc: &Value) -> ConfigResult<u64> {
        match ResolvedConfig::from_document_with(doc, &self.registry) {
            Ok(config) => Ok(self.replace(config)),
            Err(e) => {
                warn!(error = %e, generation = self.generation(), "Configuration reload failed, keeping current snapshot");
                Err(e)
            }
        }
    }

    /// Load, resolve and publish a configuration file.
    pub fn reload_from_path(&self, path: impl AsRef<Path>) -> ConfigResult<u64> {
        let doc = loader::load_document(path)?;
        self.reload(&doc)
    }

    /// Publish a resolved configuration. Returns the new generation.
    pub fn replace(&self, config: ResolvedConfig) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.config = Arc::new(config);
        current.generation += 1;
        info!(
            generation = current.generation,
            layers = current.config.layers().len(),
            "Configuration snapshot swapped"
        );
        current.generation
    }
}
