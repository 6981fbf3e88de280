//! Stack indexing
//!
//! Enumerates candidate manifests under `stacks.base_path` and derives
//! each file's stack identity from the effective vars of its import
//! closure. Files whose identity cannot be derived yet (a naming var is
//! missing) are indexed as identity-pending and contribute only through
//! imports.

use crate::import::ImportResolver;
use crate::node::Node;
use crate::Result;
use atmos_config::StacksConfig;
use atmos_fs::{GlobMatcher, NormalizedPath};
use atmos_template::TemplateEngine;
use std::collections::BTreeMap;

/// Derives stack identities for manifests.
pub struct StackIndexer<'a> {
    settings: &'a StacksConfig,
    base_path: NormalizedPath,
    resolver: &'a ImportResolver,
}

impl<'a> StackIndexer<'a> {
    pub fn new(
        settings: &'a StacksConfig,
        base_path: NormalizedPath,
        resolver: &'a ImportResolver,
    ) -> Self {
        Self {
            settings,
            base_path,
            resolver,
        }
    }

    /// Enumerate candidates and group them by resolved identity.
    ///
    /// Identity derivation fans out over threads; the result map is
    /// ordered so output never depends on scheduling.
    pub fn index(&self) -> Result<BTreeMap<String, Vec<NormalizedPath>>> {
        let matcher = GlobMatcher::new(
            self.base_path.clone(),
            &self.settings.included_paths,
            &self.settings.excluded_paths,
        )?;
        let candidates = matcher.walk()?;

        let identities: Vec<(NormalizedPath, Option<String>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .iter()
                .map(|path| {
                    let path = path.clone();
                    scope.spawn(move || {
                        let identity = self.identity_of(&path);
                        (path, identity)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("indexer thread")).collect()
        });

        let mut index: BTreeMap<String, Vec<NormalizedPath>> = BTreeMap::new();
        for (path, identity) in identities {
            match identity {
                Some(identity) => index.entry(identity).or_default().push(path),
                None => tracing::debug!(path = %path, "identity-pending manifest"),
            }
        }
        for paths in index.values_mut() {
            paths.sort();
        }
        Ok(index)
    }

    /// The stack identity of one manifest, or `None` when pending.
    pub fn identity_of(&self, path: &NormalizedPath) -> Option<String> {
        let vars = self.resolver.vars_closure(path).ok()?;
        self.identity_from_vars(path.as_str(), &vars)
    }

    /// Derive an identity from already-merged vars.
    pub fn identity_from_vars(&self, file: &str, vars: &Node) -> Option<String> {
        if let Some(template) = &self.settings.name_template {
            let mut engine = TemplateEngine::new();
            let mut context = atmos_template::Context::new();
            context.insert("vars", &vars.to_json());
            return match engine.render(file, template, &context) {
                Ok(identity) if !identity.trim().is_empty() => Some(identity),
                _ => None,
            };
        }
        if let Some(pattern) = &self.settings.name_pattern {
            return substitute_pattern(pattern, vars);
        }
        // No naming scheme configured: the base-relative path without its
        // extension is the identity
        let relative = NormalizedPath::new(file)
            .relative_to(&self.base_path)?
            .to_string();
        Some(
            relative
                .trim_end_matches(".yaml")
                .trim_end_matches(".yml")
                .to_string(),
        )
    }
}

/// `{tenant}-{environment}-{stage}` style substitution. Every token must
/// resolve to a scalar var or the identity is pending.
fn substitute_pattern(pattern: &str, vars: &Node) -> Option<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let token = &after[..close];
        let value = vars.get_path(&[token])?;
        match value {
            Node::String(s) => out.push_str(s),
            Node::Int(i) => out.push_str(&i.to_string()),
            Node::Bool(b) => out.push_str(&b.to_string()),
            _ => return None,
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
    }

    fn settings_with_pattern(pattern: &str) -> StacksConfig {
        StacksConfig {
            name_pattern: Some(pattern.to_string()),
            ..StacksConfig::default()
        }
    }

    #[test]
    fn pattern_substitution_builds_identity() {
        let vars = Node::from(
            serde_yaml::from_str::<serde_yaml::Value>(
                "tenant: plat\nenvironment: ue2\nstage: dev",
            )
            .unwrap(),
        );
        assert_eq!(
            substitute_pattern("{tenant}-{environment}-{stage}", &vars),
            Some("plat-ue2-dev".to_string())
        );
    }

    #[test]
    fn missing_token_makes_identity_pending() {
        let vars = Node::from(
            serde_yaml::from_str::<serde_yaml::Value>("tenant: plat").unwrap(),
        );
        assert_eq!(substitute_pattern("{tenant}-{stage}", &vars), None);
    }

    #[test]
    fn index_groups_files_by_identity() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "orgs/acme/dev.yaml",
            "vars:\n  tenant: plat\n  environment: ue2\n  stage: dev\n",
        );
        write(
            &dir,
            "orgs/acme/prod.yaml",
            "vars:\n  tenant: plat\n  environment: ue2\n  stage: prod\n",
        );
        // Catalog entry without naming vars: identity-pending
        write(&dir, "catalog/vpc.yaml", "vars:\n  cidr: 10.0.0.0/16\n");

        let base = NormalizedPath::new(dir.path());
        let resolver = ImportResolver::new(base.clone());
        let settings = settings_with_pattern("{tenant}-{environment}-{stage}");
        let indexer = StackIndexer::new(&settings, base, &resolver);

        let index = indexer.index().unwrap();
        let stacks: Vec<_> = index.keys().cloned().collect();
        assert_eq!(stacks, vec!["plat-ue2-dev", "plat-ue2-prod"]);
        assert_eq!(index["plat-ue2-dev"].len(), 1);
    }

    #[test]
    fn identity_uses_imported_vars() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "mixins/tenant.yaml",
            "vars:\n  tenant: plat\n  environment: ue2\n",
        );
        write(
            &dir,
            "orgs/acme/dev.yaml",
            "import:\n  - mixins/tenant\nvars:\n  stage: dev\n",
        );

        let base = NormalizedPath::new(dir.path());
        let resolver = ImportResolver::new(base.clone());
        let settings = settings_with_pattern("{tenant}-{environment}-{stage}");
        let indexer = StackIndexer::new(&settings, base.clone(), &resolver);

        let identity = indexer.identity_of(&base.join("orgs/acme/dev.yaml"));
        assert_eq!(identity, Some("plat-ue2-dev".to_string()));
    }

    #[test]
    fn name_template_wins_over_pattern() {
        let dir = TempDir::new().unwrap();
        write(&dir, "dev.yaml", "vars:\n  stage: dev\n");

        let base = NormalizedPath::new(dir.path());
        let resolver = ImportResolver::new(base.clone());
        let settings = StacksConfig {
            name_template: Some("{{ vars.stage }}-stack".to_string()),
            name_pattern: Some("{stage}".to_string()),
            ..StacksConfig::default()
        };
        let indexer = StackIndexer::new(&settings, base.clone(), &resolver);

        let identity = indexer.identity_of(&base.join("dev.yaml"));
        assert_eq!(identity, Some("dev-stack".to_string()));
    }

    #[test]
    fn fallback_identity_is_relative_path() {
        let dir = TempDir::new().unwrap();
        write(&dir, "orgs/acme/dev.yaml", "vars: {}\n");

        let base = NormalizedPath::new(dir.path());
        let resolver = ImportResolver::new(base.clone());
        let settings = StacksConfig::default();
        let indexer = StackIndexer::new(&settings, base.clone(), &resolver);

        let identity = indexer.identity_of(&base.join("orgs/acme/dev.yaml"));
        assert_eq!(identity, Some("orgs/acme/dev".to_string()));
    }

    #[test]
    fn excluded_paths_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "orgs/dev.yaml", "vars:\n  stage: dev\n");
        write(&dir, "orgs/_defaults.yaml", "vars:\n  stage: defaults\n");

        let base = NormalizedPath::new(dir.path());
        let resolver = ImportResolver::new(base.clone());
        let settings = StacksConfig {
            name_pattern: Some("{stage}".to_string()),
            excluded_paths: vec!["**/_*.yaml".to_string()],
            ..StacksConfig::default()
        };
        let indexer = StackIndexer::new(&settings, base, &resolver);

        let index = indexer.index().unwrap();
        assert!(index.contains_key("dev"));
        assert!(!index.contains_key("defaults"));
    }
}
