//! Inheritance linearization
//!
//! `metadata.inherits` lists base components, processed left-to-right with
//! each base's own chain walked depth-first. The flattened chain keeps the
//! last occurrence of a duplicate and puts the component itself at the
//! tip, so merging the chain in order gives later bases and finally the
//! component the final word.

use crate::{Error, Result};
use indexmap::IndexSet;

/// Linearize the inheritance chain for `component`.
///
/// `inherits_of` returns the `metadata.inherits` list for a component by
/// name. The returned chain includes `component` itself as the last entry.
pub fn linearize<F>(component: &str, inherits_of: &F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Result<Vec<String>>,
{
    let mut active = IndexSet::new();
    let mut chain = Vec::new();
    walk(component, inherits_of, &mut active, &mut chain)?;

    // Keep the last occurrence of each duplicate
    let mut deduped: Vec<String> = Vec::with_capacity(chain.len());
    for (i, name) in chain.iter().enumerate() {
        if !chain[i + 1..].contains(name) {
            deduped.push(name.clone());
        }
    }
    Ok(deduped)
}

fn walk<F>(
    component: &str,
    inherits_of: &F,
    active: &mut IndexSet<String>,
    chain: &mut Vec<String>,
) -> Result<()>
where
    F: Fn(&str) -> Result<Vec<String>>,
{
    if !active.insert(component.to_string()) {
        let mut cycle: Vec<String> = active.iter().cloned().collect();
        cycle.push(component.to_string());
        return Err(Error::InheritanceCycle {
            component: component.to_string(),
            chain: cycle,
        });
    }

    for base in inherits_of(component)? {
        walk(&base, inherits_of, active, chain)?;
    }
    chain.push(component.to_string());

    active.shift_remove(component);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn graph<'a>(edges: &'a [(&'a str, &'a [&'a str])]) -> impl Fn(&str) -> Result<Vec<String>> + 'a {
        let map: HashMap<String, Vec<String>> = edges
            .iter()
            .map(|(name, bases)| {
                (
                    name.to_string(),
                    bases.iter().map(|b| b.to_string()).collect(),
                )
            })
            .collect();
        move |name: &str| Ok(map.get(name).cloned().unwrap_or_default())
    }

    #[test]
    fn simple_chain_puts_self_at_tip() {
        let inherits = graph(&[("c", &["a", "b"])]);
        assert_eq!(linearize("c", &inherits).unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn base_chains_are_walked_depth_first() {
        // d -> [b, c], b -> [a]
        let inherits = graph(&[("d", &["b", "c"]), ("b", &["a"])]);
        assert_eq!(linearize("d", &inherits).unwrap(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn duplicates_keep_last_occurrence() {
        // diamond: d -> [b, c], b -> [a], c -> [a]
        let inherits = graph(&[("d", &["b", "c"]), ("b", &["a"]), ("c", &["a"])]);
        // a appears under both b and c; only the later occurrence survives
        assert_eq!(linearize("d", &inherits).unwrap(), ["b", "a", "c", "d"]);
    }

    #[test]
    fn no_inherits_yields_self_only() {
        let inherits = graph(&[]);
        assert_eq!(linearize("solo", &inherits).unwrap(), ["solo"]);
    }

    #[test]
    fn cycles_are_reported_with_participants() {
        let inherits = graph(&[("a", &["b"]), ("b", &["a"])]);
        let err = linearize("a", &inherits).unwrap_err();
        match err {
            Error::InheritanceCycle { chain, .. } => {
                assert!(chain.contains(&"a".to_string()));
                assert!(chain.contains(&"b".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_inheritance_is_a_cycle() {
        let inherits = graph(&[("a", &["a"])]);
        assert!(matches!(
            linearize("a", &inherits),
            Err(Error::InheritanceCycle { .. })
        ));
    }
}
