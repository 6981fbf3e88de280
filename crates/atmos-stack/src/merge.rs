//! Deep merge of manifest trees
//!
//! Merge rules, in precedence order:
//! 1. Maps merge key-wise and recursively; the right side wins.
//! 2. Sequences follow `settings.list_merge_strategy`.
//! 3. An explicit `null` map value unsets the key: the slot becomes
//!    [`Node::Unset`] and downstream merges see no key unless a later
//!    manifest sets it again.
//! 4. Everything else is replaced by the right side.
//!
//! The merger also records the per-variable `sources` trail consumed by
//! policies and `describe component`.

use crate::node::Node;
use atmos_config::ListMergeStrategy;
use indexmap::IndexMap;
use serde::Serialize;

/// One contribution to a variable's final value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntry {
    pub stack_file: String,
    pub value: serde_json::Value,
}

/// Dotted variable path -> ordered contributions, oldest first.
pub type SourcesTrail = IndexMap<String, Vec<SourceEntry>>;

/// Merge `src` into `dest`.
pub fn deep_merge(dest: &mut Node, src: &Node, strategy: ListMergeStrategy) {
    // Explicit null unsets the slot it lands on
    if matches!(src, Node::Null) {
        *dest = Node::Unset;
        return;
    }
    match (dest, src) {
        (Node::Map(dest_map), Node::Map(src_map)) => {
            merge_maps(dest_map, src_map, strategy);
        }
        (Node::Seq(dest_seq), Node::Seq(src_seq))
            if strategy == ListMergeStrategy::Append =>
        {
            dest_seq.extend(src_seq.iter().map(absorb));
        }
        (Node::Seq(dest_seq), Node::Seq(src_seq))
            if strategy == ListMergeStrategy::Merge =>
        {
            // Index-wise up to the right length; extra left tail drops
            let mut merged = Vec::with_capacity(src_seq.len());
            for (i, right) in src_seq.iter().enumerate() {
                match dest_seq.get(i) {
                    Some(left) => {
                        let mut slot = left.clone();
                        deep_merge(&mut slot, right, strategy);
                        merged.push(slot);
                    }
                    None => merged.push(absorb(right)),
                }
            }
            *dest_seq = merged;
        }
        // Replace-strategy sequences and every other combination: the
        // right side wins wholesale
        (slot, src) => *slot = absorb(src),
    }
}

fn merge_maps(
    dest: &mut IndexMap<String, Node>,
    src: &IndexMap<String, Node>,
    strategy: ListMergeStrategy,
) {
    use indexmap::map::Entry;

    for (key, value) in src {
        if matches!(value, Node::Null) {
            dest.insert(key.clone(), Node::Unset);
            continue;
        }
        match dest.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if matches!(occupied.get(), Node::Unset) {
                    occupied.insert(absorb(value));
                } else {
                    deep_merge(occupied.get_mut(), value, strategy);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(absorb(value));
            }
        }
    }
}

/// Clone an incoming subtree, converting map-entry nulls to tombstones.
///
/// Only map values unset; a `null` sequence element is a real value and
/// passes through.
fn absorb(src: &Node) -> Node {
    match src {
        Node::Map(map) => {
            let mut out = IndexMap::new();
            for (k, v) in map {
                if matches!(v, Node::Null) {
                    out.insert(k.clone(), Node::Unset);
                } else {
                    out.insert(k.clone(), absorb(v));
                }
            }
            Node::Map(out)
        }
        Node::Seq(items) => Node::Seq(items.iter().map(absorb).collect()),
        other => other.clone(),
    }
}

/// Record the contributions a manifest's `vars` makes to the trail.
///
/// Called once per manifest, in merge order, before the merge itself, so
/// the last entry of each path is the final contributor.
pub fn record_sources(trail: &mut SourcesTrail, stack_file: &str, vars: &Node) {
    record_at(trail, stack_file, vars, String::new());
}

fn record_at(trail: &mut SourcesTrail, stack_file: &str, node: &Node, prefix: String) {
    match node {
        Node::Map(map) => {
            for (key, value) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                record_at(trail, stack_file, value, path);
            }
        }
        leaf => {
            trail.entry(prefix).or_default().push(SourceEntry {
                stack_file: stack_file.to_string(),
                value: leaf.to_json(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(yaml: &str) -> Node {
        Node::from(serde_yaml::from_str::<serde_yaml::Value>(yaml).unwrap())
    }

    fn merged(left: &str, right: &str, strategy: ListMergeStrategy) -> Node {
        let mut dest = node(left);
        deep_merge(&mut dest, &node(right), strategy);
        dest.strip_unset();
        dest
    }

    #[test]
    fn maps_merge_keywise_right_wins() {
        let out = merged(
            "a: 1\nnested:\n  x: left\n  y: keep",
            "b: 2\nnested:\n  x: right",
            ListMergeStrategy::Replace,
        );
        assert_eq!(out, node("a: 1\nnested:\n  x: right\n  y: keep\nb: 2"));
    }

    #[test]
    fn replace_strategy_takes_rightmost_list() {
        let out = merged("xs: [1, 2]", "xs: [3]", ListMergeStrategy::Replace);
        assert_eq!(out, node("xs: [3]"));
    }

    #[test]
    fn append_strategy_concatenates_in_order() {
        let out = merged("xs: [1, 2]", "xs: [3]", ListMergeStrategy::Append);
        assert_eq!(out, node("xs: [1, 2, 3]"));
    }

    #[test]
    fn merge_strategy_pairs_indices_and_drops_left_tail() {
        let out = merged(
            "xs:\n  - a: 1\n    b: 2\n  - a: 9\n  - a: tail",
            "xs:\n  - b: 3\n  - a: 10",
            ListMergeStrategy::Merge,
        );
        assert_eq!(out, node("xs:\n  - a: 1\n    b: 3\n  - a: 10"));
    }

    #[test]
    fn null_unsets_a_previously_set_key() {
        let out = merged(
            "vars:\n  retention: 30\n  stage: dev",
            "vars:\n  retention: null",
            ListMergeStrategy::Replace,
        );
        assert_eq!(out, node("vars:\n  stage: dev"));
    }

    #[test]
    fn null_on_a_never_set_key_stays_absent() {
        let out = merged("vars: {}", "vars:\n  ghost: null", ListMergeStrategy::Replace);
        assert_eq!(out, node("vars: {}"));
    }

    #[test]
    fn key_can_be_reset_after_unset() {
        let mut dest = node("vars:\n  a: 1");
        deep_merge(&mut dest, &node("vars:\n  a: null"), ListMergeStrategy::Replace);
        deep_merge(&mut dest, &node("vars:\n  a: 2"), ListMergeStrategy::Replace);
        dest.strip_unset();
        assert_eq!(dest, node("vars:\n  a: 2"));
    }

    #[test]
    fn null_list_elements_are_values_not_unsets() {
        let out = merged("xs: [1]", "xs: [null, 2]", ListMergeStrategy::Replace);
        assert_eq!(out, node("xs: [null, 2]"));
    }

    #[test]
    fn tagged_nodes_survive_merging() {
        let out = merged(
            "vars:\n  vpc_id: placeholder",
            "vars:\n  vpc_id: !terraform.output vpc vpc_id",
            ListMergeStrategy::Replace,
        );
        assert!(out.has_tagged());
    }

    #[test]
    fn merge_with_self_is_identity() {
        let original = node("a: 1\nb:\n  c: [1, 2]\n  d: x\ne: true");
        let mut dest = original.clone();
        deep_merge(&mut dest, &original, ListMergeStrategy::Replace);
        dest.strip_unset();
        assert_eq!(dest, original);
    }

    #[test]
    fn sources_trail_orders_contributions() {
        let mut trail = SourcesTrail::new();
        record_sources(&mut trail, "catalog/vpc.yaml", &node("cidr: 10.0.0.0/16"));
        record_sources(&mut trail, "orgs/acme/dev.yaml", &node("cidr: 10.1.0.0/16"));

        let entries = &trail["cidr"];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stack_file, "catalog/vpc.yaml");
        assert_eq!(entries[1].stack_file, "orgs/acme/dev.yaml");
        assert_eq!(entries[1].value, serde_json::json!("10.1.0.0/16"));
    }

    #[test]
    fn sources_trail_uses_dotted_paths() {
        let mut trail = SourcesTrail::new();
        record_sources(&mut trail, "f.yaml", &node("tags:\n  team: core"));
        assert!(trail.contains_key("tags.team"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_node() -> impl Strategy<Value = Node> {
            let leaf = prop_oneof![
                any::<i64>().prop_map(Node::Int),
                any::<bool>().prop_map(Node::Bool),
                "[a-z]{1,8}".prop_map(Node::String),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Node::Seq),
                    prop::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(|entries| {
                        let mut map = IndexMap::new();
                        for (k, v) in entries {
                            map.insert(k, v);
                        }
                        Node::Map(map)
                    }),
                ]
            })
        }

        proptest! {
            #[test]
            fn self_merge_is_identity(original in arb_node()) {
                let mut dest = original.clone();
                deep_merge(&mut dest, &original, ListMergeStrategy::Replace);
                dest.strip_unset();
                prop_assert_eq!(dest, original);
            }

            #[test]
            fn replace_merge_equals_right_for_lists(
                left in prop::collection::vec(any::<i64>(), 0..5),
                right in prop::collection::vec(any::<i64>(), 0..5),
            ) {
                let mut dest = Node::Seq(left.into_iter().map(Node::Int).collect());
                let src = Node::Seq(right.iter().copied().map(Node::Int).collect());
                deep_merge(&mut dest, &src, ListMergeStrategy::Replace);
                prop_assert_eq!(dest, src);
            }
        }
    }
}
