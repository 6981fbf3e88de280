//! Lightweight HCL source inspection
//!
//! A pre-flight pass over the component's `.tf` files catching module
//! sources that reference variables, which classic Terraform rejects at
//! init time with `Variables not allowed`. OpenTofu 1.8+ accepts them, so
//! the dispatcher filters these diagnostics through
//! [`crate::tofu::filter_diagnostics`] before reporting.

use atmos_fs::NormalizedPath;
use regex::Regex;
use std::sync::OnceLock;

fn source_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"source\s*=\s*(var\.[\w.]+|"[^"]*\$\{var\.[^"]*")"#)
            .expect("inspection pattern compiles")
    })
}

/// Collect diagnostics for the component directory. Best-effort: files
/// that cannot be read are skipped.
pub fn inspect_component_dir(dir: &NormalizedPath) -> Vec<String> {
    let mut diagnostics = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir.to_native()) else {
        return diagnostics;
    };
    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "tf"))
        .collect();
    files.sort();

    for file in files {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        for (lineno, line) in content.lines().enumerate() {
            if source_var_pattern().is_match(line) {
                diagnostics.push(format!(
                    "Variables not allowed: {}:{}: module source uses a variable reference",
                    file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                    lineno + 1
                ));
            }
        }
    }
    diagnostics
}
