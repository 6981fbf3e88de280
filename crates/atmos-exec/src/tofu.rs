//! OpenTofu detection and diagnostic filtering
//!
//! OpenTofu 1.8+ permits variable interpolation in module sources, which
//! the HCL source inspector still flags. When the configured command is
//! OpenTofu, diagnostics in that class are suppressed. Detection results
//! are cached per command path for the process lifetime.

use std::collections::HashMap;
use std::process::Command;
use std::sync::Mutex;
use std::sync::OnceLock;

/// Diagnostic summaries suppressed under OpenTofu.
const SUPPRESSED_UNDER_TOFU: &[&str] = &[
    "Variables not allowed",
    "Unsuitable value: value must be known",
];

fn detection_cache() -> &'static Mutex<HashMap<String, bool>> {
    static CACHE: OnceLock<Mutex<HashMap<String, bool>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Whether `command` is OpenTofu.
///
/// Fast path: the basename contains `tofu`. Otherwise `<command> version`
/// is run once and the report inspected; the verdict is cached by command
/// path.
pub fn is_opentofu(command: &str) -> bool {
    let basename = command
        .replace('\\', "/")
        .rsplit('/')
        .next()
        .unwrap_or(command)
        .to_string();
    if basename.contains("tofu") {
        return true;
    }

    if let Some(cached) = detection_cache()
        .lock()
        .expect("tofu detection cache")
        .get(command)
    {
        return *cached;
    }

    let detected = Command::new(command)
        .arg("version")
        .output()
        .map(|out| {
            String::from_utf8_lossy(&out.stdout)
                .to_ascii_lowercase()
                .contains("opentofu")
        })
        .unwrap_or(false);

    detection_cache()
        .lock()
        .expect("tofu detection cache")
        .insert(command.to_string(), detected);
    detected
}

/// Drop inspector diagnostics OpenTofu tolerates. For any other command
/// the list passes through untouched.
pub fn filter_diagnostics(command: &str, diagnostics: Vec<String>) -> Vec<String> {
    if !is_opentofu(command) {
        return diagnostics;
    }
    diagnostics
        .into_iter()
        .filter(|d| !SUPPRESSED_UNDER_TOFU.iter().any(|s| d.contains(s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn basename_containing_tofu_is_detected() {
        assert!(is_opentofu("tofu"));
        assert!(is_opentofu("/usr/local/bin/tofu"));
        assert!(is_opentofu(r"C:\tools\tofu.exe"));
    }

    #[test]
    fn unknown_binary_is_not_opentofu() {
        assert!(!is_opentofu("definitely-not-a-real-binary-name"));
    }

    #[test]
    fn variables_not_allowed_is_suppressed_for_tofu() {
        let diags = vec![
            "Variables not allowed: module source uses var.ctx.path".to_string(),
            "Missing required argument: region".to_string(),
        ];
        let filtered = filter_diagnostics("tofu", diags);
        assert_eq!(filtered, vec!["Missing required argument: region"]);
    }

    #[test]
    fn terraform_keeps_all_diagnostics() {
        let diags = vec!["Variables not allowed: x".to_string()];
        let filtered =
            filter_diagnostics("definitely-not-a-real-binary-name", diags.clone());
        assert_eq!(filtered, diags);
    }
}
