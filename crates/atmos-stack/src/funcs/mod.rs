//! Lazy YAML function evaluation
//!
//! After templating and merging, the materialized tree may still contain
//! tagged nodes: `!include`, `!env`, `!exec`, `!template`,
//! `!terraform.output`, `!terraform.state`. The evaluator walks the tree
//! depth-first (children before parents), replaces each tagged node with
//! its value, and deep-inserts map/sequence results.
//!
//! Results are cached per process by `(tag, canonical args, auth
//! fingerprint)` with single-flight, so a chain of components reading the
//! same output computes it once - and never reuses a result computed
//! under different credentials.

mod exec;
mod include;

use crate::materialize::{MaterializeOptions, Materializer};
use crate::node::Node;
use crate::{Error, Result};
use atmos_auth::AuthContext;
use atmos_fs::Fingerprint;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Reads a terraform output of an already-materialized component.
/// Implemented by the dispatcher.
pub trait OutputReader: Send + Sync {
    fn read_output(
        &self,
        config: &crate::component::ComponentConfig,
        output: &str,
        auth: &AuthContext,
    ) -> std::result::Result<serde_json::Value, String>;
}

/// Reads an output directly from a component's remote state, for
/// components with `remote_state_backend_type: static`.
pub trait RemoteStateReader: Send + Sync {
    fn read_state(
        &self,
        config: &crate::component::ComponentConfig,
        output: &str,
        auth: &AuthContext,
    ) -> std::result::Result<serde_json::Value, String>;
}

type CacheSlot = Arc<OnceLock<std::result::Result<Node, String>>>;

/// Process-wide function result cache.
pub struct FuncCache {
    slots: Mutex<HashMap<String, CacheSlot>>,
}

impl FuncCache {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> CacheSlot {
        self.slots
            .lock()
            .expect("function cache")
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

impl Default for FuncCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates the function tags of one component's materialized tree.
pub struct Evaluator {
    materializer: Arc<Materializer>,
    stack: String,
    auth: AuthContext,
    /// Component `env` deltas, applied to `!exec` children.
    env: IndexMap<String, Option<String>>,
    /// Section context for `!template` second-phase renders.
    sections: serde_json::Value,
}

impl Evaluator {
    pub fn new(
        materializer: Arc<Materializer>,
        stack: String,
        auth: AuthContext,
        env: IndexMap<String, Option<String>>,
        sections: serde_json::Value,
    ) -> Self {
        Self {
            materializer,
            stack,
            auth,
            env,
            sections,
        }
    }

    /// Evaluate every tagged node in the tree, bottom-up.
    pub fn eval(&self, node: &Node) -> Result<Node> {
        match node {
            Node::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(Node::Seq(out))
            }
            Node::Map(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.eval(value)?);
                }
                Ok(Node::Map(out))
            }
            Node::Tagged { tag, args } => {
                // Children first: a tag's arguments may themselves be tagged
                let args = self.eval(args)?;
                self.eval_tag(tag, &args)
            }
            other => Ok(other.clone()),
        }
    }

    fn eval_tag(&self, tag: &str, args: &Node) -> Result<Node> {
        let key = self.cache_key(tag, args);
        let slot = self.materializer.func_cache.slot(&key);
        let mut first_error = None;
        let outcome = slot.get_or_init(|| match self.dispatch(tag, args) {
            Ok(node) => Ok(node),
            Err(e) => {
                let message = e.to_string();
                first_error = Some(e);
                Err(message)
            }
        });
        // The computing caller keeps the typed error; replays carry the
        // rendered message
        if let Some(e) = first_error {
            return Err(e);
        }
        match outcome {
            Ok(node) => Ok(node.clone()),
            Err(message) => Err(Error::YamlFuncArg {
                tag: tag.to_string(),
                message: message.clone(),
            }),
        }
    }

    fn dispatch(&self, tag: &str, args: &Node) -> Result<Node> {
        tracing::debug!(tag, stack = %self.stack, "evaluating yaml function");
        match tag {
            "include" => include::eval(self, args),
            "env" => self.eval_env(args),
            "exec" => exec::eval(self, args),
            "template" => self.eval_template(args),
            "terraform.output" => self.eval_terraform(args, TerraformRead::Output),
            "terraform.state" => self.eval_terraform(args, TerraformRead::State),
            other => Err(Error::YamlFuncArg {
                tag: other.to_string(),
                message: "unknown YAML function".to_string(),
            }),
        }
    }

    /// `!env NAME [default]` - read at evaluation time, never at load
    /// time. An unset variable without a default evaluates to null.
    fn eval_env(&self, args: &Node) -> Result<Node> {
        let raw = args.as_str().ok_or_else(|| Error::YamlFuncArg {
            tag: "env".to_string(),
            message: "expected `!env NAME [default]`".to_string(),
        })?;
        let mut parts = split_args(raw);
        let name = parts.next().ok_or_else(|| Error::YamlFuncArg {
            tag: "env".to_string(),
            message: "missing variable name".to_string(),
        })?;
        let default = parts.next();
        match std::env::var(&name) {
            Ok(value) => Ok(Node::String(value)),
            Err(_) => Ok(default.map(Node::String).unwrap_or(Node::Null)),
        }
    }

    /// `!template <expr>` - a second-phase render with the component's
    /// merged sections as context.
    fn eval_template(&self, args: &Node) -> Result<Node> {
        let expr = args.as_str().ok_or_else(|| Error::YamlFuncArg {
            tag: "template".to_string(),
            message: "expected a template expression".to_string(),
        })?;
        let mut engine = atmos_template::TemplateEngine::new();
        let mut context = atmos_template::Context::new();
        if let Some(map) = self.sections.as_object() {
            for (key, value) in map {
                context.insert(key.as_str(), value);
            }
        }
        context.insert("stack", &self.stack);
        let rendered = engine.render(&self.stack, expr, &context)?;
        Ok(parse_scalar(&rendered))
    }

    fn eval_terraform(&self, args: &Node, mode: TerraformRead) -> Result<Node> {
        let tag = mode.tag();
        let raw = args.as_str().ok_or_else(|| Error::YamlFuncArg {
            tag: tag.to_string(),
            message: format!("expected `!{tag} <component> [<stack>] <output>`"),
        })?;
        let parts: Vec<String> = split_args(raw).collect();
        let (component, stack, output) = match parts.as_slice() {
            [component, output] => (component.clone(), self.stack.clone(), output.clone()),
            [component, stack, output] => (component.clone(), stack.clone(), output.clone()),
            _ => {
                return Err(Error::YamlFuncArg {
                    tag: tag.to_string(),
                    message: format!(
                        "expected 2 or 3 arguments, got {}: `{raw}`",
                        parts.len()
                    ),
                });
            }
        };

        // Nested materialization runs under the current context; the
        // materializer derives a narrower one if the target declares auth
        let config = self
            .materializer
            .materialize(
                "terraform",
                &component,
                &stack,
                MaterializeOptions::default(),
                Some(&self.auth),
            )
            .map_err(|e| match e {
                Error::ComponentNotFound { component, stack }
                | Error::Materialize { component, stack, .. } => {
                    Error::YamlFuncComponentNotFound { component, stack }
                }
                other => other,
            })?;

        // The reader must observe the same context the nested subtree
        // resolved under
        let effective_auth = match &config.auth {
            Some(settings) => self.auth.derive(&component, settings),
            None => self.auth.clone(),
        };

        let value = match mode {
            TerraformRead::Output => {
                let reader =
                    self.materializer
                        .output_reader()
                        .ok_or_else(|| Error::YamlFuncRemoteState {
                            component: component.clone(),
                            message: "no terraform output reader is wired".to_string(),
                        })?;
                reader
                    .read_output(&config, &output, &effective_auth)
                    .map_err(|message| Error::YamlFuncRemoteState {
                        component: component.clone(),
                        message,
                    })?
            }
            TerraformRead::State => {
                let reader = self.materializer.remote_state_reader().ok_or_else(|| {
                    Error::YamlFuncRemoteState {
                        component: component.clone(),
                        message: "no remote state reader is wired".to_string(),
                    }
                })?;
                reader
                    .read_state(&config, &output, &effective_auth)
                    .map_err(|message| Error::YamlFuncRemoteState {
                        component: component.clone(),
                        message,
                    })?
            }
        };
        Ok(Node::from_json(value))
    }

    fn cache_key(&self, tag: &str, args: &Node) -> String {
        let mut fp = Fingerprint::new();
        fp.add(tag);
        fp.add(serde_json::to_string(&args.to_json()).unwrap_or_default());
        fp.add(&self.stack);
        fp.add(self.auth.fingerprint());
        fp.finish()
    }

    pub(crate) fn env_overlay(&self) -> &IndexMap<String, Option<String>> {
        &self.env
    }

    pub(crate) fn materializer(&self) -> &Arc<Materializer> {
        &self.materializer
    }
}

enum TerraformRead {
    Output,
    State,
}

impl TerraformRead {
    fn tag(&self) -> &'static str {
        match self {
            Self::Output => "terraform.output",
            Self::State => "terraform.state",
        }
    }
}

/// Split a function argument string on whitespace, honoring single and
/// double quotes.
pub(crate) fn split_args(raw: &str) -> impl Iterator<Item = String> + '_ {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts.into_iter()
}

/// Parse evaluated text as a YAML value so numbers, booleans and
/// structures keep their types; anything unparseable stays a string.
pub(crate) fn parse_scalar(text: &str) -> Node {
    match serde_yaml::from_str::<serde_yaml::Value>(text) {
        Ok(value) => Node::from(value),
        Err(_) => Node::String(text.to_string()),
    }
}
