//! Engine assembly and rendering passes

use crate::{filters, functions, Error, Result, SharedComponentFetcher, SharedStoreReader};
use tera::{Context, Tera, Value};

/// The configured template engine.
///
/// Construction registers every filter and function once; rendering is
/// per-expression with the caller's context.
pub struct TemplateEngine {
    tera: Tera,
    evaluations: u32,
    delimiters: Option<[String; 2]>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);

        tera.register_filter("to_yaml", filters::to_yaml);
        tera.register_filter("to_json", filters::to_json);
        tera.register_filter("to_json_pretty", filters::to_json_pretty);
        tera.register_filter("basename", filters::basename);

        tera.register_function("env", functions::env_fn);
        tera.register_function("file", functions::file_fn);

        Self {
            tera,
            evaluations: 1,
            delimiters: None,
        }
    }

    /// Number of full render passes (`templates.settings.evaluations`).
    pub fn with_evaluations(mut self, evaluations: u32) -> Self {
        self.evaluations = evaluations.max(1);
        self
    }

    /// Custom `[open, close]` delimiters, translated to the engine's
    /// native ones before parsing.
    pub fn with_delimiters(mut self, delimiters: Option<[String; 2]>) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Wire the `atmos_component(component=, stack=)` function.
    pub fn with_component_fetcher(mut self, fetcher: SharedComponentFetcher) -> Self {
        self.tera.register_function(
            "atmos_component",
            move |args: &std::collections::HashMap<String, Value>| {
                let component = required_str(args, "component", "atmos_component")?;
                let stack = required_str(args, "stack", "atmos_component")?;
                fetcher
                    .fetch(&component, &stack)
                    .map_err(tera::Error::msg)
            },
        );
        self
    }

    /// Wire the `atmos_store(store=, key=)` function.
    pub fn with_store_reader(mut self, reader: SharedStoreReader) -> Self {
        self.tera.register_function(
            "atmos_store",
            move |args: &std::collections::HashMap<String, Value>| {
                let store = required_str(args, "store", "atmos_store")?;
                let key = required_str(args, "key", "atmos_store")?;
                reader.read(&store, &key).map_err(tera::Error::msg)
            },
        );
        self
    }

    /// Render one expression, repeating the configured number of passes.
    ///
    /// `file` names the originating manifest for diagnostics.
    pub fn render(&mut self, file: &str, template: &str, context: &Context) -> Result<String> {
        let mut text = self.translate_delimiters(template);
        for pass in 0..self.evaluations {
            // Cheap skip once nothing is left to expand
            if !text.contains("{{") && !text.contains("{%") {
                break;
            }
            tracing::trace!(file, pass, "template render pass");
            text = self
                .tera
                .render_str(&text, context)
                .map_err(|e| Error::render(file, &e))?;
        }
        Ok(text)
    }

    /// Whether a string contains anything the engine would expand.
    pub fn has_template_syntax(&self, text: &str) -> bool {
        let probe = self.translate_delimiters(text);
        probe.contains("{{") || probe.contains("{%")
    }

    fn translate_delimiters(&self, text: &str) -> String {
        match &self.delimiters {
            Some([open, close]) if open != "{{" => text
                .replace(open.as_str(), "{{")
                .replace(close.as_str(), "}}"),
            _ => text.to_string(),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn required_str(
    args: &std::collections::HashMap<String, Value>,
    name: &str,
    func: &str,
) -> tera::Result<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| tera::Error::msg(format!("{func}: missing string argument `{name}`")))
}

/// Build the standard render context for a manifest position.
///
/// Exposes `vars`, `settings`, `env`, `metadata`, `stack`, and the
/// import-site `context:` entries at the top level.
pub fn stack_context(
    vars: &serde_json::Value,
    settings: &serde_json::Value,
    env: &serde_json::Value,
    metadata: &serde_json::Value,
    stack: &str,
    import_context: &serde_json::Map<String, serde_json::Value>,
) -> Context {
    let mut context = Context::new();
    context.insert("vars", vars);
    context.insert("settings", settings);
    context.insert("env", env);
    context.insert("metadata", metadata);
    context.insert("stack", stack);
    for (key, value) in import_context {
        context.insert(key.as_str(), value);
    }
    context
}
