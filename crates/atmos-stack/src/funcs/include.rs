//! `!include path [query]`
//!
//! Loads a local file or an `http(s)://` URL and optionally selects a
//! value with a dotted path + `[idx]` query. Content is parsed as YAML
//! (JSON is a subset) and falls back to a raw string when parsing fails -
//! the same rule for local and remote sources.

use super::{parse_scalar, split_args, Evaluator};
use crate::node::Node;
use crate::{Error, Result};

pub(super) fn eval(evaluator: &Evaluator, args: &Node) -> Result<Node> {
    let raw = args.as_str().ok_or_else(|| Error::YamlFuncArg {
        tag: "include".to_string(),
        message: "expected `!include path [query]`".to_string(),
    })?;
    let parts: Vec<String> = split_args(raw).collect();
    let (target, query) = match parts.as_slice() {
        [target] => (target.clone(), None),
        [target, query] => (target.clone(), Some(query.clone())),
        _ => {
            return Err(Error::YamlFuncArg {
                tag: "include".to_string(),
                message: format!("expected 1 or 2 arguments, got {}", parts.len()),
            });
        }
    };

    let content = if target.starts_with("http://") || target.starts_with("https://") {
        fetch_url(&target)?
    } else {
        read_local(evaluator, &target)?
    };

    let mut node = parse_scalar(&content);
    if let Some(query) = query {
        node = select(&node, &query).ok_or_else(|| Error::YamlFuncArg {
            tag: "include".to_string(),
            message: format!("query `{query}` matched nothing in `{target}`"),
        })?;
    }
    Ok(node)
}

fn read_local(evaluator: &Evaluator, target: &str) -> Result<String> {
    let path = atmos_fs::NormalizedPath::new(target);
    let resolved = if path.is_absolute() {
        path
    } else {
        // Relative includes resolve against the stacks base path
        evaluator.materializer().stacks_dir().join(target)
    };
    Ok(atmos_fs::io::read_text(&resolved)?)
}

fn fetch_url(url: &str) -> Result<String> {
    let response = reqwest::blocking::get(url).map_err(|e| Error::YamlFuncArg {
        tag: "include".to_string(),
        message: format!("GET {url} failed: {e}"),
    })?;
    if !response.status().is_success() {
        return Err(Error::YamlFuncArg {
            tag: "include".to_string(),
            message: format!("GET {url} returned {}", response.status()),
        });
    }
    response.text().map_err(|e| Error::YamlFuncArg {
        tag: "include".to_string(),
        message: format!("reading body of {url} failed: {e}"),
    })
}

/// Select with a dotted path; `[idx]` indexes sequences.
fn select(node: &Node, query: &str) -> Option<Node> {
    let mut current = node.clone();
    for segment in query.trim_start_matches('.').split('.') {
        if segment.is_empty() {
            continue;
        }
        let (key, indexes) = parse_segment(segment)?;
        if !key.is_empty() {
            current = current.as_map()?.get(key)?.clone();
        }
        for idx in indexes {
            match current {
                Node::Seq(ref items) => current = items.get(idx)?.clone(),
                _ => return None,
            }
        }
    }
    Some(current)
}

/// `name[0][1]` -> ("name", [0, 1])
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    match segment.find('[') {
        None => Some((segment, Vec::new())),
        Some(open) => {
            let key = &segment[..open];
            let mut indexes = Vec::new();
            let mut rest = &segment[open..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']')?;
                indexes.push(stripped[..close].parse().ok()?);
                rest = &stripped[close + 1..];
            }
            if rest.is_empty() {
                Some((key, indexes))
            } else {
                None
            }
        }
    }
}
