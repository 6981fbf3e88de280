//! Component materialization
//!
//! Glues the indexer, import resolver, template engine, deep merger and
//! inheritance linearization into the one operation everything else
//! consumes: produce the [`ComponentConfig`] for a `(kind, component,
//! stack)` triple.
//!
//! Materialization is memoized per process by a fingerprint of every
//! input (manifest paths and content hashes, the request triple, feature
//! flags, auth). Concurrent requests for the same key collapse into one
//! computation.

use crate::component::{env_map_from_node, ComponentConfig, Metadata};
use crate::funcs::{Evaluator, FuncCache, OutputReader, RemoteStateReader};
use crate::import::{ImportResolver, ResolvedImport};
use crate::index::StackIndexer;
use crate::manifest::{SECTION_ENV, SECTION_OVERRIDES, SECTION_SETTINGS, SECTION_VARS};
use crate::merge::{deep_merge, record_sources, SourcesTrail};
use crate::node::Node;
use crate::{Error, Result};
use atmos_auth::AuthContext;
use atmos_config::{AtmosConfig, AuthSettings, ListMergeStrategy};
use atmos_fs::{Fingerprint, NormalizedPath};
use atmos_template::TemplateEngine;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Which resolution phases to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeOptions {
    pub process_templates: bool,
    pub process_yaml_functions: bool,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            process_templates: true,
            process_yaml_functions: true,
        }
    }
}

type MemoSlot = Arc<OnceLock<std::result::Result<Arc<ComponentConfig>, String>>>;

/// The component materializer. One per process, always behind [`Arc`] -
/// nested evaluation and the template-function seams need to hand out
/// owning handles to themselves.
pub struct Materializer {
    weak: std::sync::Weak<Materializer>,
    config: Arc<AtmosConfig>,
    stacks_dir: NormalizedPath,
    resolver: ImportResolver,
    memo: Mutex<HashMap<String, MemoSlot>>,
    pub(crate) func_cache: FuncCache,
    outputs: RwLock<Option<Arc<dyn OutputReader>>>,
    remote_state: RwLock<Option<Arc<dyn RemoteStateReader>>>,
    stores: RwLock<Option<Arc<dyn atmos_template::StoreReader>>>,
}

impl Materializer {
    /// `project_root` is the absolute `base_path`; `stacks.base_path`
    /// resolves against it unless already absolute.
    pub fn new(config: Arc<AtmosConfig>, project_root: NormalizedPath) -> Arc<Self> {
        let stacks_base = NormalizedPath::new(&config.stacks.base_path);
        let stacks_dir = if stacks_base.is_absolute() {
            stacks_base
        } else {
            project_root.join(&config.stacks.base_path)
        };
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            config,
            resolver: ImportResolver::new(stacks_dir.clone()),
            stacks_dir,
            memo: Mutex::new(HashMap::new()),
            func_cache: FuncCache::new(),
            outputs: RwLock::new(None),
            remote_state: RwLock::new(None),
            stores: RwLock::new(None),
        })
    }

    /// An owning handle to this materializer.
    pub(crate) fn shared(&self) -> Arc<Self> {
        self.weak.upgrade().expect("materializer is held by an Arc")
    }

    pub fn config(&self) -> &AtmosConfig {
        &self.config
    }

    pub fn stacks_dir(&self) -> &NormalizedPath {
        &self.stacks_dir
    }

    /// Wire the terraform output reader (dispatcher side of the seam).
    pub fn set_output_reader(&self, reader: Arc<dyn OutputReader>) {
        *self.outputs.write().expect("outputs seam") = Some(reader);
    }

    /// Wire the remote state reader.
    pub fn set_remote_state_reader(&self, reader: Arc<dyn RemoteStateReader>) {
        *self.remote_state.write().expect("remote state seam") = Some(reader);
    }

    /// Wire the named-store reader for `atmos_store`.
    pub fn set_store_reader(&self, reader: Arc<dyn atmos_template::StoreReader>) {
        *self.stores.write().expect("store seam") = Some(reader);
    }

    pub(crate) fn output_reader(&self) -> Option<Arc<dyn OutputReader>> {
        self.outputs.read().expect("outputs seam").clone()
    }

    pub(crate) fn remote_state_reader(&self) -> Option<Arc<dyn RemoteStateReader>> {
        self.remote_state.read().expect("remote state seam").clone()
    }

    /// Materialize a component. `auth` is the caller's context; `None` is
    /// legal only at the top level and means "root context from global
    /// config".
    pub fn materialize(
        &self,
        kind: &str,
        component: &str,
        stack: &str,
        opts: MaterializeOptions,
        auth: Option<&AuthContext>,
    ) -> Result<Arc<ComponentConfig>> {
        let root_auth;
        let auth = match auth {
            Some(ctx) => ctx,
            None => {
                root_auth = AuthContext::root(&self.config.auth);
                &root_auth
            }
        };

        let emitted = self.emitted_for_stack(stack)?;
        let key = self.memo_key(&emitted, kind, component, stack, opts, auth)?;

        let slot: MemoSlot = {
            let mut memo = self.memo.lock().expect("materializer memo");
            memo.entry(key).or_default().clone()
        };
        // Single flight: the first caller computes, the rest block on the
        // same cell and share the outcome.
        let outcome = slot.get_or_init(|| {
            self.materialize_uncached(kind, component, stack, &emitted, opts, auth)
                .map_err(|e| e.to_string())
        });
        match outcome {
            Ok(config) => Ok(config.clone()),
            Err(message) => Err(Error::Materialize {
                component: component.to_string(),
                stack: stack.to_string(),
                message: message.clone(),
            }),
        }
    }

    /// Stack identity -> component names, for `describe stacks`.
    pub fn describe_stacks(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let index = self.stack_index()?;
        let mut out = BTreeMap::new();
        for stack in index.keys() {
            let emitted = self.emitted_for_stack(stack)?;
            let merged = self.merged_document(stack, &emitted, true)?;
            out.insert(stack.clone(), component_names(&merged.doc));
        }
        Ok(out)
    }

    /// All component names of a kind within one stack.
    pub fn list_components(&self, kind: &str, stack: &str) -> Result<Vec<String>> {
        let emitted = self.emitted_for_stack(stack)?;
        let merged = self.merged_document(stack, &emitted, true)?;
        let mut names: Vec<String> = merged
            .doc
            .get_path(&["components", kind])
            .and_then(Node::as_map)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    fn stack_index(&self) -> Result<BTreeMap<String, Vec<NormalizedPath>>> {
        let indexer = StackIndexer::new(&self.config.stacks, self.stacks_dir.clone(), &self.resolver);
        indexer.index()
    }

    /// Union of the import DAGs of every root manifest whose identity
    /// equals `stack`, first-seen order preserved.
    fn emitted_for_stack(&self, stack: &str) -> Result<Vec<ResolvedImport>> {
        let index = self.stack_index()?;
        let roots = index.get(stack).ok_or_else(|| Error::StackNotFound {
            stack: stack.to_string(),
        })?;

        let mut emitted: Vec<ResolvedImport> = Vec::new();
        let mut seen: Vec<(NormalizedPath, String)> = Vec::new();
        for root in roots {
            for item in self.resolver.resolve(root)? {
                let ctx_json =
                    serde_json::to_string(&context_json(&item.context)).unwrap_or_default();
                let key = (item.manifest.source_path.clone(), ctx_json);
                if !seen.contains(&key) {
                    seen.push(key);
                    emitted.push(item);
                }
            }
        }
        Ok(emitted)
    }

    /// Merge the emitted manifests into one document, templating each
    /// body first and recording source trails along the way.
    fn merged_document(
        &self,
        stack: &str,
        emitted: &[ResolvedImport],
        process_templates: bool,
    ) -> Result<MergedDocument> {
        let templates_on = process_templates && self.config.templates.settings.enabled;
        let mut engine = self.template_engine();

        let mut doc = Node::map();
        let mut global_trail = SourcesTrail::new();
        let mut component_trails: IndexMap<(String, String), SourcesTrail> = IndexMap::new();
        let mut deps = Vec::new();

        for item in emitted {
            let display = item
                .manifest
                .source_path
                .relative_to(&self.stacks_dir)
                .unwrap_or(item.manifest.source_path.as_str())
                .to_string();
            deps.push(display.clone());

            let mut body = Node::Map(item.manifest.body.clone());
            if templates_on {
                self.render_body(&mut engine, &display, &mut body, &doc, stack, &item.context)?;
            }

            if let Some(vars) = body.get_path(&[SECTION_VARS]) {
                record_sources(&mut global_trail, &display, vars);
            }
            if let Some(components) = body.get_path(&["components"]).and_then(Node::as_map) {
                for (kind, by_name) in components {
                    let Some(by_name) = by_name.as_map() else { continue };
                    for (name, section) in by_name {
                        if let Some(vars) = section.get_path(&[SECTION_VARS]) {
                            let trail = component_trails
                                .entry((kind.clone(), name.clone()))
                                .or_default();
                            record_sources(trail, &display, vars);
                        }
                    }
                }
            }

            let strategy = self.current_strategy(&doc);
            deep_merge(&mut doc, &body, strategy);
        }

        deps.sort();
        deps.dedup();
        Ok(MergedDocument {
            doc,
            global_trail,
            component_trails,
            deps,
        })
    }

    /// The list-merge strategy in effect given the accumulated settings.
    fn current_strategy(&self, doc: &Node) -> ListMergeStrategy {
        doc.get_path(&[SECTION_SETTINGS, "list_merge_strategy"])
            .and_then(Node::as_str)
            .and_then(|s| serde_yaml::from_str(s).ok())
            .unwrap_or(self.config.settings.list_merge_strategy)
    }

    fn template_engine(&self) -> TemplateEngine {
        let settings = &self.config.templates.settings;
        let mut engine = TemplateEngine::new()
            .with_evaluations(settings.evaluations)
            .with_delimiters(settings.delimiters.clone())
            .with_component_fetcher(Arc::new(NestedFetcher {
                materializer: self.weak.clone(),
            }));
        if let Some(stores) = self.stores.read().expect("store seam").clone() {
            engine = engine.with_store_reader(stores);
        }
        engine
    }

    /// Render every string scalar of a manifest body in place.
    ///
    /// The context sees the sections accumulated so far (imports emit
    /// first, so defaults are visible) merged under the manifest's own.
    fn render_body(
        &self,
        engine: &mut TemplateEngine,
        file: &str,
        body: &mut Node,
        accumulated: &Node,
        stack: &str,
        import_context: &IndexMap<String, Node>,
    ) -> Result<()> {
        let mut vars = accumulated
            .get_path(&[SECTION_VARS])
            .cloned()
            .unwrap_or_else(Node::map);
        if let Some(own) = body.get_path(&[SECTION_VARS]) {
            deep_merge(&mut vars, own, ListMergeStrategy::Replace);
        }
        vars.strip_unset();
        let settings = accumulated
            .get_path(&[SECTION_SETTINGS])
            .cloned()
            .unwrap_or_else(Node::map);
        let env = accumulated
            .get_path(&[SECTION_ENV])
            .cloned()
            .unwrap_or_else(Node::map);

        let context = atmos_template::stack_context(
            &vars.to_json(),
            &settings.to_json(),
            &env.to_json(),
            &serde_json::Value::Object(serde_json::Map::new()),
            stack,
            &context_json(import_context),
        );

        render_strings(engine, file, body, &context)
    }

    fn memo_key(
        &self,
        emitted: &[ResolvedImport],
        kind: &str,
        component: &str,
        stack: &str,
        opts: MaterializeOptions,
        auth: &AuthContext,
    ) -> Result<String> {
        let mut fp = Fingerprint::new();
        for item in emitted {
            fp.add(item.manifest.source_path.as_str());
            let checksum = atmos_fs::checksum::file_checksum(
                &item.manifest.source_path.to_native(),
            )
            .map_err(|e| atmos_fs::Error::io(item.manifest.source_path.to_native(), e))?;
            fp.add(checksum);
            fp.add(serde_json::to_string(&context_json(&item.context)).unwrap_or_default());
        }
        fp.add(kind);
        fp.add(component);
        fp.add(stack);
        fp.add(format!(
            "{}:{}:{}",
            opts.process_templates,
            opts.process_yaml_functions,
            self.config.templates.settings.enabled
        ));
        fp.add(auth.fingerprint());
        Ok(fp.finish())
    }

    fn materialize_uncached(
        &self,
        kind: &str,
        name: &str,
        stack: &str,
        emitted: &[ResolvedImport],
        opts: MaterializeOptions,
        auth: &AuthContext,
    ) -> Result<Arc<ComponentConfig>> {
        tracing::debug!(kind, component = name, stack, "materializing");
        let merged = self.merged_document(stack, emitted, opts.process_templates)?;
        let doc = &merged.doc;

        let components = doc
            .get_path(&["components", kind])
            .and_then(Node::as_map)
            .ok_or_else(|| Error::ComponentNotFound {
                component: name.to_string(),
                stack: stack.to_string(),
            })?;
        if !components.contains_key(name) {
            return Err(Error::ComponentNotFound {
                component: name.to_string(),
                stack: stack.to_string(),
            });
        }

        // Inheritance chain, self at the tip
        let inherits_of = |c: &str| -> Result<Vec<String>> {
            let section = components.get(c).ok_or_else(|| Error::ComponentNotFound {
                component: c.to_string(),
                stack: stack.to_string(),
            })?;
            Ok(Metadata::from_node(section.get_path(&["metadata"])).inherits)
        };
        let chain = crate::inherit::linearize(name, &inherits_of)?;

        let strategy = self.current_strategy(doc);

        // Global sections first, then each chain element's own sections
        let mut combined = Node::map();
        for section in [
            SECTION_VARS,
            SECTION_SETTINGS,
            SECTION_ENV,
            "backend_type",
            "backend",
            "remote_state_backend_type",
            "remote_state_backend",
            "command",
            "auth",
        ] {
            if let Some(global) = doc.get_path(&[section]) {
                let map = combined.as_map_mut().expect("combined is a map");
                map.insert(section.to_string(), global.clone());
            }
        }
        for element in &chain {
            let section = components
                .get(element)
                .expect("chain elements exist in the components map");
            let mut without_metadata = section.clone();
            if let Some(map) = without_metadata.as_map_mut() {
                map.shift_remove("metadata");
            }
            deep_merge(&mut combined, &without_metadata, strategy);
        }
        if let Some(overrides) = doc.get_path(&[SECTION_OVERRIDES]) {
            deep_merge(&mut combined, overrides, strategy);
        }

        // Metadata is never inherited
        let own_section = components.get(name).expect("target exists");
        let metadata = Metadata::from_node(own_section.get_path(&["metadata"]));

        let auth_settings: Option<AuthSettings> = combined
            .get_path(&["auth"])
            .map(|node| {
                serde_json::from_value(node.to_json()).map_err(|e| Error::Materialize {
                    component: name.to_string(),
                    stack: stack.to_string(),
                    message: format!("invalid auth section: {e}"),
                })
            })
            .transpose()?;

        let effective_auth = match &auth_settings {
            Some(settings) => auth.derive(name, settings),
            None => auth.clone(),
        };

        let mut vars = combined.get_path(&[SECTION_VARS]).cloned().unwrap_or_else(Node::map);
        let mut settings = combined
            .get_path(&[SECTION_SETTINGS])
            .cloned()
            .unwrap_or_else(Node::map);
        let env_node = combined.get_path(&[SECTION_ENV]).cloned().unwrap_or_else(Node::map);

        let backend_type = combined
            .get_path(&["backend_type"])
            .and_then(Node::as_str)
            .map(str::to_string);
        let mut backend = select_backend(&combined, "backend", backend_type.as_deref());
        let remote_state_backend_type = combined
            .get_path(&["remote_state_backend_type"])
            .and_then(Node::as_str)
            .map(str::to_string)
            .or_else(|| backend_type.clone());
        let mut remote_state_backend = select_backend(
            &combined,
            "remote_state_backend",
            remote_state_backend_type.as_deref(),
        );

        if opts.process_yaml_functions {
            let sections_json = serde_json::json!({
                "vars": vars.to_json(),
                "settings": settings.to_json(),
                "env": env_node.to_json(),
            });
            let evaluator = Evaluator::new(
                self.shared(),
                stack.to_string(),
                effective_auth,
                env_map_from_node(&env_node),
                sections_json,
            );
            vars = evaluator.eval(&vars)?;
            settings = evaluator.eval(&settings)?;
            backend = evaluator.eval(&backend)?;
            remote_state_backend = evaluator.eval(&remote_state_backend)?;
        }

        vars.strip_unset();
        settings.strip_unset();
        backend.strip_unset();
        remote_state_backend.strip_unset();

        // Sources: global contributions first, then the chain in order
        let mut sources = merged.global_trail.clone();
        for element in &chain {
            if let Some(trail) = merged
                .component_trails
                .get(&(kind.to_string(), element.clone()))
            {
                for (path, entries) in trail {
                    sources
                        .entry(path.clone())
                        .or_default()
                        .extend(entries.iter().cloned());
                }
            }
        }

        let command = combined
            .get_path(&["command"])
            .and_then(Node::as_str)
            .map(str::to_string);
        let component_dir = metadata
            .component
            .clone()
            .unwrap_or_else(|| name.to_string());

        Ok(Arc::new(ComponentConfig {
            kind: kind.to_string(),
            name: name.to_string(),
            stack: stack.to_string(),
            component: component_dir,
            command,
            vars,
            settings,
            env: env_map_from_node(&env_node),
            backend_type,
            backend,
            remote_state_backend_type,
            remote_state_backend,
            metadata,
            auth: auth_settings,
            deps: merged.deps,
            sources,
        }))
    }
}

struct MergedDocument {
    doc: Node,
    global_trail: SourcesTrail,
    component_trails: IndexMap<(String, String), SourcesTrail>,
    deps: Vec<String>,
}

/// `backend: {s3: {...}}` selects the declared type's subtree; a backend
/// map without per-type nesting is used as-is.
fn select_backend(combined: &Node, section: &str, backend_type: Option<&str>) -> Node {
    let Some(node) = combined.get_path(&[section]) else {
        return Node::map();
    };
    if let (Some(backend_type), Some(map)) = (backend_type, node.as_map()) {
        if let Some(typed) = map.get(backend_type) {
            return typed.clone();
        }
    }
    node.clone()
}

fn component_names(doc: &Node) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(kinds) = doc.get_path(&["components"]).and_then(Node::as_map) {
        for by_name in kinds.values() {
            if let Some(by_name) = by_name.as_map() {
                names.extend(by_name.keys().cloned());
            }
        }
    }
    names.sort();
    names.dedup();
    names
}

fn context_json(context: &IndexMap<String, Node>) -> serde_json::Map<String, serde_json::Value> {
    let mut out = serde_json::Map::new();
    for (key, value) in context {
        out.insert(key.clone(), value.to_json());
    }
    out
}

/// Recursively render string scalars. Tagged nodes are left for the YAML
/// function evaluator; `!template` arguments render in that second phase.
fn render_strings(
    engine: &mut TemplateEngine,
    file: &str,
    node: &mut Node,
    context: &atmos_template::Context,
) -> Result<()> {
    match node {
        Node::String(s) => {
            if engine.has_template_syntax(s) {
                *s = engine.render(file, s, context)?;
            }
        }
        Node::Seq(items) => {
            for item in items {
                render_strings(engine, file, item, context)?;
            }
        }
        Node::Map(map) => {
            for value in map.values_mut() {
                render_strings(engine, file, value, context)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Template-seam implementation: `atmos_component` re-enters the
/// materializer with full resolution.
struct NestedFetcher {
    materializer: std::sync::Weak<Materializer>,
}

impl atmos_template::ComponentFetcher for NestedFetcher {
    fn fetch(&self, component: &str, stack: &str) -> std::result::Result<serde_json::Value, String> {
        let materializer = self
            .materializer
            .upgrade()
            .ok_or_else(|| "materializer dropped".to_string())?;
        let config = materializer
            .materialize(
                "terraform",
                component,
                stack,
                MaterializeOptions::default(),
                None,
            )
            .map_err(|e| e.to_string())?;
        serde_json::to_value(config.as_ref()).map_err(|e| e.to_string())
    }
}
