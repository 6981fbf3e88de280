//! Import resolution
//!
//! Expands `import:` entries depth-first into an ordered, deduplicated
//! post-order emission of `(manifest, context)` nodes. The result is a DAG
//! rooted at the selected manifest, not a tree: the same file may appear
//! more than once when imported under different `context:` maps, so nodes
//! are keyed by `(file, context-fingerprint)`.

use crate::manifest::Manifest;
use crate::node::Node;
use crate::{Error, Result};
use atmos_fs::{Fingerprint, NormalizedPath};
use atmos_template::TemplateEngine;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One emitted node of the import DAG.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub manifest: Arc<Manifest>,
    /// The `context:` map in effect at the import site, outer sites merged
    /// with inner ones (inner wins).
    pub context: IndexMap<String, Node>,
}

/// Resolves import DAGs against a stacks base path, caching parsed
/// manifests for the life of the process.
pub struct ImportResolver {
    base_path: NormalizedPath,
    cache: Mutex<HashMap<NormalizedPath, Arc<Manifest>>>,
}

impl ImportResolver {
    pub fn new(base_path: NormalizedPath) -> Self {
        Self {
            base_path,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &NormalizedPath {
        &self.base_path
    }

    /// Load a manifest through the cache.
    pub fn load(&self, path: &NormalizedPath) -> Result<Arc<Manifest>> {
        if let Some(found) = self.cache.lock().expect("manifest cache").get(path) {
            return Ok(found.clone());
        }
        let manifest = Arc::new(Manifest::load(path)?);
        self.cache
            .lock()
            .expect("manifest cache")
            .insert(path.clone(), manifest.clone());
        Ok(manifest)
    }

    /// Resolve the full DAG below `root`, emitting manifests post-order
    /// (imports before importers, the root last).
    pub fn resolve(&self, root: &NormalizedPath) -> Result<Vec<ResolvedImport>> {
        let mut walk = Walk {
            resolver: self,
            engine: TemplateEngine::new(),
            emitted: Vec::new(),
            seen: IndexSet::new(),
            active: IndexSet::new(),
        };
        walk.visit(root, IndexMap::new())?;
        Ok(walk.emitted)
    }

    /// The effective `vars` of a manifest's import closure: every emitted
    /// manifest's top-level vars merged in DAG order. Used by the stack
    /// indexer to derive identities.
    pub fn vars_closure(&self, root: &NormalizedPath) -> Result<Node> {
        let mut vars = Node::map();
        for emitted in self.resolve(root)? {
            crate::merge::deep_merge(
                &mut vars,
                &emitted.manifest.vars(),
                atmos_config::ListMergeStrategy::Replace,
            );
        }
        vars.strip_unset();
        Ok(vars)
    }
}

struct Walk<'a> {
    resolver: &'a ImportResolver,
    engine: TemplateEngine,
    emitted: Vec<ResolvedImport>,
    /// `(path, context fingerprint)` pairs already emitted.
    seen: IndexSet<(NormalizedPath, String)>,
    /// Paths on the active DFS stack, for cycle detection.
    active: IndexSet<NormalizedPath>,
}

impl Walk<'_> {
    fn visit(
        &mut self,
        path: &NormalizedPath,
        context: IndexMap<String, Node>,
    ) -> Result<()> {
        let key = (path.clone(), context_fingerprint(&context));
        if self.seen.contains(&key) {
            return Ok(());
        }
        if let Some(start) = self.active.get_index_of(path) {
            // Participants from the first occurrence onward, each once
            let chain: Vec<String> = self
                .active
                .iter()
                .skip(start)
                .map(|p| p.as_str().to_string())
                .collect();
            return Err(Error::ImportCycle { chain });
        }

        self.active.insert(path.clone());
        let manifest = self.resolver.load(path)?;

        for spec in &manifest.imports {
            let rendered = if spec.skip_templates_pre_import {
                spec.path.clone()
            } else {
                self.render_import_path(&manifest, spec)?
            };

            let targets = self.expand(&rendered)?;
            if targets.is_empty() && !spec.ignore_missing {
                self.active.shift_remove(path);
                return Err(Error::ImportUnresolved {
                    path: rendered,
                    importer: path.as_str().to_string(),
                });
            }

            // Inner contexts override outer ones for the imported subtree
            let mut child_context = context.clone();
            for (k, v) in &spec.context {
                child_context.insert(k.clone(), v.clone());
            }
            for target in targets {
                self.visit(&target, child_context.clone())?;
            }
        }

        self.active.shift_remove(path);
        self.seen.insert(key);
        self.emitted.push(ResolvedImport { manifest, context });
        Ok(())
    }

    /// Pre-import templating of the import path, against the importing
    /// manifest's own vars and the spec's `context:` map. Runs even when
    /// templates are globally disabled - paths must always resolve.
    fn render_import_path(
        &mut self,
        manifest: &Manifest,
        spec: &crate::manifest::ImportSpec,
    ) -> Result<String> {
        if !self.engine.has_template_syntax(&spec.path) {
            return Ok(spec.path.clone());
        }
        let mut context = atmos_template::Context::new();
        context.insert("vars", &manifest.vars().to_json());
        for (key, value) in &spec.context {
            context.insert(key.as_str(), &value.to_json());
        }
        Ok(self
            .engine
            .render(manifest.source_path.as_str(), &spec.path, &context)?)
    }

    /// Expand one import path to concrete manifest files.
    ///
    /// Glob patterns expand under the base path; a plain path tries the
    /// literal file and the `.yaml`/`.yml` spellings.
    fn expand(&self, pattern: &str) -> Result<Vec<NormalizedPath>> {
        let has_meta = pattern.contains(['*', '?', '[', '{']);
        if has_meta {
            return Ok(atmos_fs::glob::expand(&self.resolver.base_path, pattern)?);
        }
        for candidate in [
            pattern.to_string(),
            format!("{pattern}.yaml"),
            format!("{pattern}.yml"),
        ] {
            let path = self.resolver.base_path.join(&candidate);
            if path.is_file() {
                return Ok(vec![path]);
            }
        }
        Ok(Vec::new())
    }
}

fn context_fingerprint(context: &IndexMap<String, Node>) -> String {
    if context.is_empty() {
        return String::new();
    }
    let mut fp = Fingerprint::new();
    for (key, value) in context {
        fp.add(key);
        fp.add(serde_json::to_string(&value.to_json()).unwrap_or_default());
    }
    fp.finish()
}
