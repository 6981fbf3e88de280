//! Backend file synthesis
//!
//! With `auto_generate_backend_file: true` the dispatcher writes
//! `backend.tf.json` into the component directory before every run. The
//! file is overwritten each time; its contents are a function of the
//! merged `backend` map and nothing else.

use crate::{Error, Result};
use atmos_fs::NormalizedPath;
use atmos_stack::ComponentConfig;

/// File name written into the component working directory.
pub const BACKEND_FILE: &str = "backend.tf.json";

/// Synthesize the backend file. Returns the written path.
pub fn write_backend_file(
    component_dir: &NormalizedPath,
    config: &ComponentConfig,
) -> Result<NormalizedPath> {
    let backend_type = config.backend_type.as_deref().unwrap_or("local");
    let mut by_type = serde_json::Map::new();
    by_type.insert(backend_type.to_string(), config.backend.to_json());
    let document = serde_json::json!({
        "terraform": {
            "backend": by_type
        }
    });
    let rendered = serde_json::to_string_pretty(&document).map_err(|e| Error::BackendWrite {
        path: component_dir.join(BACKEND_FILE).to_native(),
        message: e.to_string(),
    })?;

    let path = component_dir.join(BACKEND_FILE);
    atmos_fs::write_atomic(&path, rendered.as_bytes()).map_err(|e| Error::BackendWrite {
        path: path.to_native(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path, backend_type, "backend file written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_stack::Node;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_with_backend(backend_type: &str, backend_yaml: &str) -> ComponentConfig {
        ComponentConfig {
            kind: "terraform".into(),
            name: "vpc".into(),
            stack: "plat-ue2-dev".into(),
            component: "vpc".into(),
            command: None,
            vars: Node::map(),
            settings: Node::map(),
            env: Default::default(),
            backend_type: Some(backend_type.into()),
            backend: Node::from(serde_yaml::from_str::<serde_yaml::Value>(backend_yaml).unwrap()),
            remote_state_backend_type: None,
            remote_state_backend: Node::map(),
            metadata: Default::default(),
            auth: None,
            deps: vec![],
            sources: Default::default(),
        }
    }

    #[test]
    fn backend_file_nests_under_declared_type() {
        let dir = TempDir::new().unwrap();
        let config = config_with_backend("s3", "bucket: tf-state\nregion: us-east-2");
        let path =
            write_backend_file(&NormalizedPath::new(dir.path()), &config).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path.to_native()).unwrap()).unwrap();
        assert_eq!(
            written["terraform"]["backend"]["s3"]["bucket"],
            serde_json::json!("tf-state")
        );
    }

    #[test]
    fn backend_file_is_overwritten_on_rerun() {
        let dir = TempDir::new().unwrap();
        let base = NormalizedPath::new(dir.path());
        write_backend_file(&base, &config_with_backend("s3", "bucket: old")).unwrap();
        write_backend_file(&base, &config_with_backend("s3", "bucket: new")).unwrap();

        let written: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(base.join(BACKEND_FILE).to_native()).unwrap(),
        )
        .unwrap();
        assert_eq!(
            written["terraform"]["backend"]["s3"]["bucket"],
            serde_json::json!("new")
        );
    }
}
