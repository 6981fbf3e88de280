//! `.tool-versions` files
//!
//! Whitespace-separated `owner/repo constraint` lines, `#` comments,
//! blank lines allowed. The file nearest to the working directory wins
//! outright; component-level `dependencies.tools` entries override
//! file-level ones at assembly time in the CLI.

use crate::spec::ToolSpec;
use crate::{Error, Result};
use atmos_fs::NormalizedPath;
use std::path::Path;

/// A parsed `.tool-versions` file.
#[derive(Debug, Clone)]
pub struct ToolVersionsFile {
    pub path: NormalizedPath,
    pub specs: Vec<ToolSpec>,
}

/// Parse file content into specs. Malformed lines are errors, naming the
/// file and line.
pub fn parse(path: &NormalizedPath, content: &str) -> Result<Vec<ToolSpec>> {
    let mut specs = Vec::new();
    for (lineno, raw_line) in content.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let slug = parts.next().unwrap_or_default();
        let constraint = parts.next().unwrap_or("latest");
        let spec = ToolSpec::parse(&format!("{slug}@{constraint}")).map_err(|_| {
            Error::InvalidSpec {
                spec: format!("{}:{}: `{raw_line}`", path, lineno + 1),
            }
        })?;
        specs.push(spec);
    }
    Ok(specs)
}

/// Walk up from `start` and load the first file found.
pub fn load_nearest(start: &Path, file_name: &str) -> Result<Option<ToolVersionsFile>> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(file_name);
        if candidate.is_file() {
            let path = NormalizedPath::new(&candidate);
            let content = atmos_fs::io::read_text(&path)?;
            let specs = parse(&path, &content)?;
            return Ok(Some(ToolVersionsFile { path, specs }));
        }
        dir = current.parent();
    }
    Ok(None)
}

/// Pin `owner/repo` to a version, updating the nearest file or creating
/// one in `start`.
pub fn pin(start: &Path, file_name: &str, spec: &ToolSpec, version: &str) -> Result<NormalizedPath> {
    let target = match load_nearest(start, file_name)? {
        Some(file) => file.path,
        None => NormalizedPath::new(start.join(file_name)),
    };
    let existing = if target.is_file() {
        atmos_fs::io::read_text(&target)?
    } else {
        String::new()
    };

    let slug = spec.slug();
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    for line in existing.lines() {
        let head = line.split('#').next().unwrap_or("").trim();
        let is_entry = head
            .split_whitespace()
            .next()
            .is_some_and(|first| first == slug);
        if is_entry {
            lines.push(format!("{slug} {version}"));
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(format!("{slug} {version}"));
    }
    let mut content = lines.join("\n");
    content.push('\n');
    atmos_fs::write_atomic(&target, content.as_bytes())?;
    Ok(target)
}
