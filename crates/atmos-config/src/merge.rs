//! Overlay merge for configuration fragments
//!
//! Fragments overlay the base file key-wise and recursively; the stack
//! manifests' richer merge semantics (list strategies, null-unset) do not
//! apply here - a fragment that sets a key replaces it.

use serde_yaml::{Mapping, Value};

/// Merge `overlay` onto `base` in place. Maps merge recursively, every
/// other value type is replaced by the overlay.
pub fn overlay_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            overlay_mapping(base_map, overlay_map);
        }
        (slot, overlay) => *slot = overlay,
    }
}

fn overlay_mapping(base: &mut Mapping, overlay: Mapping) {
    use serde_yaml::mapping::Entry;

    for (key, value) in overlay {
        match base.entry(key) {
            Entry::Occupied(mut occupied) => overlay_value(occupied.get_mut(), value),
            Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn nested_maps_merge_keywise() {
        let mut base = yaml("stacks:\n  base_path: stacks\n  name_pattern: '{stage}'");
        overlay_value(&mut base, yaml("stacks:\n  base_path: other"));
        assert_eq!(
            base,
            yaml("stacks:\n  base_path: other\n  name_pattern: '{stage}'")
        );
    }

    #[test]
    fn scalars_and_lists_replace() {
        let mut base = yaml("logs:\n  level: info\nstacks:\n  included_paths: [a, b]");
        overlay_value(
            &mut base,
            yaml("logs:\n  level: debug\nstacks:\n  included_paths: [c]"),
        );
        assert_eq!(
            base,
            yaml("logs:\n  level: debug\nstacks:\n  included_paths: [c]")
        );
    }

    #[test]
    fn new_keys_are_inserted() {
        let mut base = yaml("base_path: .");
        overlay_value(&mut base, yaml("logs:\n  level: warn"));
        assert_eq!(base, yaml("base_path: .\nlogs:\n  level: warn"));
    }
}
