//! Layer registry loader.
//!
//! Loads feature layer definitions from a YAML file. This is the single
//! source of truth for which layers are served, where their features come
//! from and which styles they carry.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use wfs_common::layer::{LayerDescriptor, LayerId};

#[derive(Debug, Deserialize)]
struct YamlLayerFile {
    #[serde(default)]
    layers: Vec<LayerDescriptor>,
}

/// Registry of configured layers, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: HashMap<String, LayerDescriptor>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from layer descriptors. Later duplicates replace
    /// earlier ones.
    pub fn from_layers(layers: impl IntoIterator<Item = LayerDescriptor>) -> Self {
        let mut registry = Self::new();
        for layer in layers {
            registry.insert(layer);
        }
        registry
    }

    /// Parse a registry document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        let file: YamlLayerFile = serde_yaml::from_str(contents)?;
        Ok(Self::from_layers(file.layers))
    }

    /// Load the registry file. A missing or unreadable file yields an empty
    /// registry so the service can still start.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, path = ?path, "Failed to read layer file");
                return Self::new();
            }
        };

        match Self::from_yaml_str(&contents) {
            Ok(registry) => {
                info!(path = ?path, layers = registry.len(), "Loaded layer configuration");
                registry
            }
            Err(e) => {
                warn!(error = %e, path = ?path, "Failed to parse layer file");
                Self::new()
            }
        }
    }

    pub fn insert(&mut self, layer: LayerDescriptor) {
        if self.layers.contains_key(&layer.id.0) {
            warn!(layer = %layer.id, "Duplicate layer id, replacing earlier definition");
        }
        self.layers.insert(layer.id.0.clone(), layer);
    }

    pub fn get(&self, id: &str) -> Option<&LayerDescriptor> {
        self.layers.get(id)
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.layers.contains_key(&id.0)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.layers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
