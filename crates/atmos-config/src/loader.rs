//! Configuration discovery and assembly
//!
//! Precedence, lowest to highest: base `atmos.yaml` (first hit in the
//! search order), `.atmos.d/` fragments in lexical order, `ATMOS_*`
//! environment variables, command-line flags. The assembled tree is
//! validated against the embedded schema before the typed deserialize.

use crate::env::apply_env_overrides;
use crate::merge::overlay_value;
use crate::schema::AtmosConfig;
use crate::{Error, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// File name of the root configuration.
const CONFIG_FILE: &str = "atmos.yaml";

/// Overlay directory next to the base file.
const FRAGMENT_DIR: &str = ".atmos.d";

/// Embedded schema the merged configuration must satisfy.
const CONFIG_SCHEMA: &str = include_str!("atmos.schema.json");

/// Flag-level overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--config <file>…`: use exactly these files instead of searching.
    pub config_files: Vec<PathBuf>,
    /// `--base-path`
    pub base_path: Option<String>,
    /// `--logs-level`
    pub logs_level: Option<String>,
    /// `--logs-file`
    pub logs_file: Option<String>,
}

/// Locates, merges, validates and freezes the process configuration.
#[derive(Debug)]
pub struct ConfigLoader {
    start_dir: PathBuf,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    pub fn new(start_dir: impl Into<PathBuf>, overrides: ConfigOverrides) -> Self {
        Self {
            start_dir: start_dir.into(),
            overrides,
        }
    }

    /// Loader rooted at the current working directory.
    pub fn from_cwd(overrides: ConfigOverrides) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| Error::Io {
            path: PathBuf::from("."),
            source: e,
        })?;
        Ok(Self::new(cwd, overrides))
    }

    /// Assemble the effective configuration.
    pub fn load(&self) -> Result<AtmosConfig> {
        let mut tree = Value::Mapping(Default::default());

        let base = if self.overrides.config_files.is_empty() {
            self.find_base_file()
        } else {
            Some(self.overrides.config_files[0].clone())
        };

        match &base {
            Some(path) => {
                tracing::debug!(path = %path.display(), "base configuration");
                overlay_value(&mut tree, parse_file(path)?);
                for fragment in fragment_files(path)? {
                    tracing::debug!(path = %fragment.display(), "configuration fragment");
                    overlay_value(&mut tree, parse_file(&fragment)?);
                }
            }
            None => {
                tracing::debug!("no atmos.yaml found, using built-in defaults");
            }
        }

        for extra in self.overrides.config_files.iter().skip(1) {
            overlay_value(&mut tree, parse_file(extra)?);
        }

        apply_env_overrides(&mut tree);
        self.apply_flag_overrides(&mut tree);

        validate_against_schema(&tree)?;

        serde_yaml::from_value(tree).map_err(|e| Error::ConfigParse {
            path: base.unwrap_or_else(|| PathBuf::from(CONFIG_FILE)),
            line: e.location().map(|l| l.line()).unwrap_or(0),
            message: e.to_string(),
        })
    }

    /// Search order: cwd ascending to the filesystem root, then the user
    /// config dir, then the platform system dir. First hit is the base.
    fn find_base_file(&self) -> Option<PathBuf> {
        let mut dir = Some(self.start_dir.as_path());
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = current.parent();
        }

        if let Some(user_dir) = dirs::config_dir() {
            let candidate = user_dir.join("atmos").join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let system = system_config_path();
        if system.is_file() {
            return Some(system);
        }
        None
    }

    fn apply_flag_overrides(&self, tree: &mut Value) {
        use serde_yaml::Mapping;

        let map = match tree.as_mapping_mut() {
            Some(m) => m,
            None => {
                *tree = Value::Mapping(Mapping::new());
                tree.as_mapping_mut().expect("just inserted")
            }
        };
        if let Some(base_path) = &self.overrides.base_path {
            map.insert("base_path".into(), Value::String(base_path.clone()));
        }
        if self.overrides.logs_level.is_some() || self.overrides.logs_file.is_some() {
            let logs = map
                .entry("logs".into())
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if let Some(logs_map) = logs.as_mapping_mut() {
                if let Some(level) = &self.overrides.logs_level {
                    logs_map.insert("level".into(), Value::String(level.clone()));
                }
                if let Some(file) = &self.overrides.logs_file {
                    logs_map.insert("file".into(), Value::String(file.clone()));
                }
            }
        }
    }
}

fn system_config_path() -> PathBuf {
    if cfg!(windows) {
        let program_data =
            std::env::var("ProgramData").unwrap_or_else(|_| r"C:\ProgramData".to_string());
        Path::new(&program_data).join("atmos").join(CONFIG_FILE)
    } else {
        PathBuf::from("/etc/atmos").join(CONFIG_FILE)
    }
}

fn parse_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        line: e.location().map(|l| l.line()).unwrap_or(0),
        message: e.to_string(),
    })
}

/// `.atmos.d/*.yaml` fragments next to the base file, lexical order.
fn fragment_files(base: &Path) -> Result<Vec<PathBuf>> {
    let dir = match base.parent() {
        Some(parent) => parent.join(FRAGMENT_DIR),
        None => return Ok(Vec::new()),
    };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut fragments = Vec::new();
    let entries = std::fs::read_dir(&dir).map_err(|e| Error::Io {
        path: dir.clone(),
        source: e,
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if path.is_file() && is_yaml {
            fragments.push(path);
        }
    }
    fragments.sort();
    Ok(fragments)
}

fn validate_against_schema(tree: &Value) -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).expect("embedded schema is valid JSON");
    let validator = jsonschema::validator_for(&schema).expect("embedded schema compiles");

    let instance = serde_json::to_value(tree).map_err(|e| Error::ConfigSchema {
        errors: vec![format!("configuration is not JSON-representable: {e}")],
    })?;

    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| format!("{}: {}", e.instance_path, e))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::ConfigSchema { errors })
    }
}
