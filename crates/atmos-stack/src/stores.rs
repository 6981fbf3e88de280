//! Named key-value stores for `atmos_store`
//!
//! Two providers back the `stores:` configuration: `memory` (values
//! inline in `atmos.yaml`, mostly for tests and fixtures) and `yaml-file`
//! (a YAML document on disk, keys addressed by dotted path).

use crate::node::Node;
use crate::{Error, Result};
use atmos_config::{AtmosConfig, StoreConfig, StoreKind};
use atmos_fs::NormalizedPath;
use indexmap::IndexMap;

/// Resolves `atmos_store(store=..., key=...)` lookups from configuration.
pub struct StoreRegistry {
    stores: IndexMap<String, StoreConfig>,
    project_root: NormalizedPath,
}

impl StoreRegistry {
    pub fn new(config: &AtmosConfig, project_root: NormalizedPath) -> Self {
        Self {
            stores: config.stores.clone(),
            project_root,
        }
    }

    /// Read one key from a named store.
    pub fn read(&self, store: &str, key: &str) -> Result<serde_json::Value> {
        let config = self.stores.get(store).ok_or_else(|| Error::Store {
            name: store.to_string(),
            message: "store is not configured".to_string(),
        })?;
        match config.kind {
            StoreKind::Memory => self.read_memory(store, config, key),
            StoreKind::YamlFile => self.read_yaml_file(store, config, key),
        }
    }

    fn read_memory(
        &self,
        name: &str,
        config: &StoreConfig,
        key: &str,
    ) -> Result<serde_json::Value> {
        let data = config.options.get("data").ok_or_else(|| Error::Store {
            name: name.to_string(),
            message: "memory store has no `data` option".to_string(),
        })?;
        let node = Node::from(data.clone());
        lookup(&node, key).ok_or_else(|| Error::Store {
            name: name.to_string(),
            message: format!("key `{key}` not found"),
        })
    }

    fn read_yaml_file(
        &self,
        name: &str,
        config: &StoreConfig,
        key: &str,
    ) -> Result<serde_json::Value> {
        let path = config
            .options
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Store {
                name: name.to_string(),
                message: "yaml-file store has no `path` option".to_string(),
            })?;
        let full = {
            let p = NormalizedPath::new(path);
            if p.is_absolute() {
                p
            } else {
                self.project_root.join(path)
            }
        };
        let content = atmos_fs::io::read_text(&full)?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| Error::Store {
                name: name.to_string(),
                message: format!("cannot parse {full}: {e}"),
            })?;
        lookup(&Node::from(value), key).ok_or_else(|| Error::Store {
            name: name.to_string(),
            message: format!("key `{key}` not found in {full}"),
        })
    }
}

impl atmos_template::StoreReader for StoreRegistry {
    fn read(&self, store: &str, key: &str) -> std::result::Result<serde_json::Value, String> {
        StoreRegistry::read(self, store, key).map_err(|e| e.to_string())
    }
}

fn lookup(node: &Node, key: &str) -> Option<serde_json::Value> {
    let mut current = node;
    for segment in key.split('.') {
        current = current.as_map()?.get(segment)?;
    }
    Some(current.to_json())
}
