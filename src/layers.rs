//! # Layered Configuration Loading
//!
//! A blueprint is assembled from an ordered stack of compose layers. Later
//! layers override earlier ones at the service level: a service redefined in
//! a later layer replaces the earlier definition as a whole, with no
//! field-level deep merge.
//!
//! The standard stack, built by [`default_layers`], is:
//!
//! 1. `backend` (base, mandatory)
//! 2. `frontend` (base, optional, only when the frontend is enabled)
//! 3. `commons` (optional)
//! 4. `<blueprint>` (mandatory)
//!
//! "Base" layers are tracked separately because template builds are only
//! discovered among base services (see [`crate::builds`]).
//!
//! Decoding a layer is delegated to a [`LayerSource`], so the merge logic can
//! be exercised without touching the filesystem.

use log::debug;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::{self, ServiceMap};
use crate::defaults::LAYER_EXTENSION;
use crate::error::{Error, Result};

/// One entry of the layer stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    /// Human readable role of the layer (e.g. `blueprint`).
    pub name: String,
    /// File stem, resolved by the [`LayerSource`].
    pub file: String,
    /// A mandatory layer must exist and define at least one service.
    pub mandatory: bool,
    /// Whether the layer belongs to the base subset.
    pub base: bool,
}

impl ConfigLayer {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            mandatory: false,
            base: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn base(mut self) -> Self {
        self.base = true;
        self
    }
}

/// Builds the standard layer stack for a blueprint.
pub fn default_layers(blueprint: &str, frontend: bool) -> Vec<ConfigLayer> {
    let mut layers = vec![ConfigLayer::new("backend", "backend").base().mandatory()];
    if frontend {
        layers.push(ConfigLayer::new("frontend", "frontend").base());
    }
    layers.push(ConfigLayer::new("common", "commons"));
    layers.push(ConfigLayer::new("blueprint", blueprint).mandatory());
    layers
}

/// Decodes layers into service maps.
pub trait LayerSource {
    /// Location of the layer, used for reporting and handed to the backend.
    fn path(&self, layer: &ConfigLayer) -> PathBuf;

    /// Loads the services of a layer, or `None` when the layer does not exist.
    fn load(&self, layer: &ConfigLayer) -> Result<Option<ServiceMap>>;
}

/// Reads layers from `<dir>/<file>.yml`.
#[derive(Debug, Clone)]
pub struct FileLayerSource {
    dir: PathBuf,
}

impl FileLayerSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LayerSource for FileLayerSource {
    fn path(&self, layer: &ConfigLayer) -> PathBuf {
        self.dir
            .join(format!("{}.{}", layer.file, LAYER_EXTENSION))
    }

    fn load(&self, layer: &ConfigLayer) -> Result<Option<ServiceMap>> {
        let path = self.path(layer);
        if !path.is_file() {
            return Ok(None);
        }
        debug!("Reading layer {}", path.display());
        config::services_from_file(&path).map(Some)
    }
}

/// Result of loading a layer stack.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Services of every loaded layer, merged in order.
    pub services: ServiceMap,
    /// Paths of every loaded layer, in merge order.
    pub files: Vec<PathBuf>,
    /// Services of the base layers only.
    pub base_services: ServiceMap,
    /// Paths of the base layers only.
    pub base_files: Vec<PathBuf>,
}

/// Overlays `layer` onto `merged`, replacing whole services by name.
pub fn merge_layer(merged: &mut ServiceMap, layer: ServiceMap) {
    for (name, service) in layer {
        merged.insert(name, service);
    }
}

/// Loads and merges an ordered layer stack.
///
/// Mandatory layers that are missing or define no service fail with
/// `Error::Configuration`; optional ones are skipped. The merged set must be
/// closed under `depends_on`.
pub fn load_layers(layers: &[ConfigLayer], source: &dyn LayerSource) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig::default();

    for layer in layers {
        let path = source.path(layer);
        let services = match source.load(layer)? {
            Some(services) if !services.is_empty() => services,
            Some(_) => {
                if layer.mandatory {
                    return Err(Error::Configuration {
                        message: format!("No service defined in file {}", path.display()),
                        hint: Some(format!(
                            "the {} layer is mandatory and must define at least one service",
                            layer.name
                        )),
                    });
                }
                debug!("Skipping empty layer {}", layer.name);
                continue;
            }
            None => {
                if layer.mandatory {
                    return Err(Error::Configuration {
                        message: format!(
                            "Layer {}[{}] is mandatory but {} does not exist",
                            layer.name,
                            layer.file,
                            path.display()
                        ),
                        hint: None,
                    });
                }
                debug!("Missing optional layer {}", layer.name);
                continue;
            }
        };

        if layer.base {
            merge_layer(&mut loaded.base_services, services.clone());
            loaded.base_files.push(path.clone());
        }
        merge_layer(&mut loaded.services, services);
        loaded.files.push(path);
    }

    validate_dependencies(&loaded.services)?;
    Ok(loaded)
}

/// Verifies every `depends_on` edge points at a known service.
pub fn validate_dependencies(services: &ServiceMap) -> Result<()> {
    let mut dangling = BTreeSet::new();
    for service in services.values() {
        for dep in &service.depends_on {
            if !services.contains_key(dep) {
                dangling.insert(format!("{} -> {}", service.name, dep));
            }
        }
    }

    if dangling.is_empty() {
        Ok(())
    } else {
        Err(Error::Configuration {
            message: format!(
                "Unknown service in depends_on: {}",
                dangling.into_iter().collect::<Vec<_>>().join(", ")
            ),
            hint: Some("define the service in one of the loaded layers".to_string()),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory layer source keyed by file stem.
    #[derive(Default)]
    pub struct MemoryLayerSource {
        pub layers: HashMap<String, ServiceMap>,
    }

    impl MemoryLayerSource {
        pub fn with(mut self, file: &str, services: ServiceMap) -> Self {
            self.layers.insert(file.to_string(), services);
            self
        }
    }

    impl LayerSource for MemoryLayerSource {
        fn path(&self, layer: &ConfigLayer) -> PathBuf {
            PathBuf::from(format!("{}.yml", layer.file))
        }

        fn load(&self, layer: &ConfigLayer) -> Result<Option<ServiceMap>> {
            Ok(self.layers.get(&layer.file).cloned())
        }
    }

    pub fn services(list: Vec<crate::config::ServiceDefinition>) -> ServiceMap {
        list.into_iter().map(|s| (s.name.clone(), s)).collect()
    }
}
