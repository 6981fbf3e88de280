//! Stack manifest parsing
//!
//! A manifest is one YAML file under `stacks.base_path`. The body is kept
//! as a [`Node`] tree; `import:` entries are parsed eagerly into
//! [`ImportSpec`]s because the import resolver needs them before any
//! templating happens.

use crate::node::Node;
use crate::{Error, Result};
use atmos_fs::NormalizedPath;
use indexmap::IndexMap;

/// Well-known top-level sections.
pub const SECTION_IMPORT: &str = "import";
pub const SECTION_VARS: &str = "vars";
pub const SECTION_SETTINGS: &str = "settings";
pub const SECTION_ENV: &str = "env";
pub const SECTION_COMPONENTS: &str = "components";
pub const SECTION_OVERRIDES: &str = "overrides";

/// One `import:` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    /// Glob relative to `stacks.base_path`; may itself be templated with
    /// the importing manifest's vars.
    pub path: String,
    /// Extra template context for the imported subtree.
    pub context: IndexMap<String, Node>,
    /// Skip pre-import templating of `path`.
    pub skip_templates_pre_import: bool,
    /// Zero glob matches is not an error.
    pub ignore_missing: bool,
}

impl ImportSpec {
    fn bare(path: String) -> Self {
        Self {
            path,
            context: IndexMap::new(),
            skip_templates_pre_import: false,
            ignore_missing: false,
        }
    }
}

/// A parsed manifest. Immutable after load.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub source_path: NormalizedPath,
    pub imports: Vec<ImportSpec>,
    /// Full document body, `import:` excluded.
    pub body: IndexMap<String, Node>,
}

impl Manifest {
    /// Parse YAML content. `source_path` becomes the manifest identity.
    pub fn parse(source_path: NormalizedPath, content: &str) -> Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| Error::ManifestParse {
                path: source_path.to_native(),
                line: e.location().map(|l| l.line()).unwrap_or(0),
                message: e.to_string(),
            })?;

        let root = match Node::from(value) {
            Node::Map(map) => map,
            Node::Null => IndexMap::new(),
            _ => {
                return Err(Error::ManifestParse {
                    path: source_path.to_native(),
                    line: 0,
                    message: "manifest root must be a mapping".to_string(),
                });
            }
        };

        let mut body = IndexMap::new();
        let mut imports = Vec::new();
        for (key, node) in root {
            if key == SECTION_IMPORT {
                imports = parse_imports(&source_path, node)?;
            } else {
                body.insert(key, node);
            }
        }

        Ok(Self {
            source_path,
            imports,
            body,
        })
    }

    /// Load and parse a manifest file.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        let content = atmos_fs::io::read_text(path)?;
        Self::parse(path.clone(), &content)
    }

    /// A top-level section by name, if present.
    pub fn section(&self, name: &str) -> Option<&Node> {
        self.body.get(name)
    }

    /// Top-level `vars`, empty map when absent.
    pub fn vars(&self) -> Node {
        self.body
            .get(SECTION_VARS)
            .cloned()
            .unwrap_or_else(Node::map)
    }

    /// The `components.<kind>` section, if present.
    pub fn components_of_kind(&self, kind: &str) -> Option<&IndexMap<String, Node>> {
        self.body
            .get(SECTION_COMPONENTS)?
            .as_map()?
            .get(kind)?
            .as_map()
    }
}

fn parse_imports(source: &NormalizedPath, node: Node) -> Result<Vec<ImportSpec>> {
    let items = match node {
        Node::Seq(items) => items,
        Node::Null => return Ok(Vec::new()),
        single @ (Node::String(_) | Node::Map(_)) => vec![single],
        other => {
            return Err(Error::ManifestParse {
                path: source.to_native(),
                line: 0,
                message: format!("`import` must be a sequence, got {other:?}"),
            });
        }
    };

    let mut specs = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Node::String(path) => specs.push(ImportSpec::bare(path)),
            Node::Map(map) => {
                let path = map
                    .get("path")
                    .and_then(Node::as_str)
                    .ok_or_else(|| Error::ManifestParse {
                        path: source.to_native(),
                        line: 0,
                        message: "import entry is missing `path`".to_string(),
                    })?
                    .to_string();
                let context = map
                    .get("context")
                    .and_then(Node::as_map)
                    .cloned()
                    .unwrap_or_default();
                let skip_templates_pre_import = map
                    .get("skip_templates_pre_import")
                    .and_then(Node::as_bool)
                    .unwrap_or(false);
                let ignore_missing = map
                    .get("ignore_missing")
                    .and_then(Node::as_bool)
                    .unwrap_or(false);
                specs.push(ImportSpec {
                    path,
                    context,
                    skip_templates_pre_import,
                    ignore_missing,
                });
            }
            other => {
                return Err(Error::ManifestParse {
                    path: source.to_native(),
                    line: 0,
                    message: format!("invalid import entry: {other:?}"),
                });
            }
        }
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manifest(content: &str) -> Manifest {
        Manifest::parse(NormalizedPath::new("/stacks/dev.yaml"), content).unwrap()
    }

    #[test]
    fn string_imports_parse_as_bare_specs() {
        let m = manifest("import:\n  - catalog/vpc\n  - mixins/region/us-east-2\n");
        assert_eq!(m.imports.len(), 2);
        assert_eq!(m.imports[0].path, "catalog/vpc");
        assert!(!m.imports[0].ignore_missing);
    }

    #[test]
    fn map_imports_carry_context_and_flags() {
        let m = manifest(
            r#"
import:
  - path: catalog/eks/*
    context:
      flavor: blue
    skip_templates_pre_import: true
    ignore_missing: true
"#,
        );
        let spec = &m.imports[0];
        assert_eq!(spec.path, "catalog/eks/*");
        assert_eq!(spec.context["flavor"], Node::String("blue".into()));
        assert!(spec.skip_templates_pre_import);
        assert!(spec.ignore_missing);
    }

    #[test]
    fn import_entry_without_path_is_an_error() {
        let err = Manifest::parse(
            NormalizedPath::new("/stacks/dev.yaml"),
            "import:\n  - context:\n      a: 1\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ManifestParse { .. }));
    }

    #[test]
    fn body_excludes_import_section() {
        let m = manifest("import:\n  - catalog/vpc\nvars:\n  stage: dev\n");
        assert!(m.body.get(SECTION_IMPORT).is_none());
        assert_eq!(
            m.vars().get_path(&["stage"]),
            Some(&Node::String("dev".into()))
        );
    }

    #[test]
    fn empty_manifest_parses() {
        let m = manifest("");
        assert!(m.imports.is_empty());
        assert!(m.body.is_empty());
    }

    #[test]
    fn components_of_kind_selects_section() {
        let m = manifest(
            r#"
components:
  terraform:
    vpc:
      vars:
        cidr: 10.0.0.0/16
"#,
        );
        let terraform = m.components_of_kind("terraform").unwrap();
        assert!(terraform.contains_key("vpc"));
        assert!(m.components_of_kind("helmfile").is_none());
    }

    #[test]
    fn parse_error_carries_line() {
        let err = Manifest::parse(
            NormalizedPath::new("/stacks/bad.yaml"),
            "vars:\n  a: [unclosed\n",
        )
        .unwrap_err();
        match err {
            Error::ManifestParse { line, .. } => assert!(line > 0),
            other => panic!("unexpected error: {other}"),
        }
    }
}
