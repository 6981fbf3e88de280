//! The manifest value graph
//!
//! Parsed YAML is held as a [`Node`] tree rather than a raw YAML value for
//! two reasons: custom tags (`!terraform.output` and friends) must survive
//! merging as first-class nodes until lazy evaluation, and the merge rules
//! need an explicit [`Node::Unset`] sentinel distinct from `null`-as-value
//! so that "key removed by an override" is never confused with "key set to
//! null".

use indexmap::IndexMap;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;

/// One node of a manifest tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Node>),
    Map(IndexMap<String, Node>),
    /// A deferred YAML function, e.g. `!env HOME`. `tag` is stored without
    /// the leading `!`; `args` is the tagged value (usually a string).
    Tagged { tag: String, args: Box<Node> },
    /// Merge tombstone left by an explicit `null` override. Stripped from
    /// all materialized output.
    Unset,
}

impl Node {
    pub fn map() -> Self {
        Self::Map(IndexMap::new())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Node>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Fetch a nested value by map keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&Node> {
        let mut current = self;
        for key in path {
            current = current.as_map()?.get(*key)?;
        }
        Some(current)
    }

    /// Whether the subtree still contains deferred YAML functions.
    pub fn has_tagged(&self) -> bool {
        match self {
            Self::Tagged { .. } => true,
            Self::Seq(items) => items.iter().any(Node::has_tagged),
            Self::Map(map) => map.values().any(Node::has_tagged),
            _ => false,
        }
    }

    /// Drop `Unset` tombstones recursively, in place.
    pub fn strip_unset(&mut self) {
        match self {
            Self::Map(map) => {
                map.retain(|_, v| !matches!(v, Self::Unset));
                for value in map.values_mut() {
                    value.strip_unset();
                }
            }
            Self::Seq(items) => {
                items.retain(|v| !matches!(v, Self::Unset));
                for item in items {
                    item.strip_unset();
                }
            }
            _ => {}
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::String(s),
            Value::Sequence(seq) => Self::Seq(seq.into_iter().map(Node::from).collect()),
            Value::Mapping(map) => {
                let mut out = IndexMap::new();
                for (k, v) in map {
                    let key = match k {
                        Value::String(s) => s,
                        other => yaml_key_to_string(&other),
                    };
                    out.insert(key, Node::from(v));
                }
                Self::Map(out)
            }
            Value::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                Self::Tagged {
                    tag: tag.to_string().trim_start_matches('!').to_string(),
                    args: Box::new(Node::from(value)),
                }
            }
        }
    }
}

fn yaml_key_to_string(key: &Value) -> String {
    match key {
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

impl Node {
    /// Convert to YAML for describe output. `Unset` is skipped; a
    /// remaining tagged node renders as its source form `!tag args`.
    pub fn to_yaml(&self) -> Value {
        match self {
            Self::Null | Self::Unset => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => Value::Number((*f).into()),
            Self::String(s) => Value::String(s.clone()),
            Self::Seq(items) => Value::Sequence(
                items
                    .iter()
                    .filter(|n| !matches!(n, Self::Unset))
                    .map(Node::to_yaml)
                    .collect(),
            ),
            Self::Map(map) => {
                let mut out = serde_yaml::Mapping::new();
                for (k, v) in map {
                    if matches!(v, Self::Unset) {
                        continue;
                    }
                    out.insert(Value::String(k.clone()), v.to_yaml());
                }
                Value::Mapping(out)
            }
            Self::Tagged { .. } => Value::String(self.source_form()),
        }
    }

    /// Convert to JSON for template contexts, validation input and JSON
    /// describe output. Same `Unset`/tag handling as [`Node::to_yaml`].
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::Unset => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Seq(items) => serde_json::Value::Array(
                items
                    .iter()
                    .filter(|n| !matches!(n, Self::Unset))
                    .map(Node::to_json)
                    .collect(),
            ),
            Self::Map(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    if matches!(v, Self::Unset) {
                        continue;
                    }
                    out.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(out)
            }
            Self::Tagged { .. } => serde_json::Value::String(self.source_form()),
        }
    }

    /// The `!tag args` source spelling of a tagged node.
    pub fn source_form(&self) -> String {
        match self {
            Self::Tagged { tag, args } => match args.as_ref() {
                Node::String(s) => format!("!{tag} {s}"),
                other => format!(
                    "!{tag} {}",
                    serde_yaml::to_string(&other.to_yaml())
                        .unwrap_or_default()
                        .trim_end()
                ),
            },
            other => serde_yaml::to_string(&other.to_yaml())
                .unwrap_or_default()
                .trim_end()
                .to_string(),
        }
    }

    /// Parse from a JSON value (used when deep-inserting evaluated
    /// function results).
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Seq(items.into_iter().map(Node::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = IndexMap::new();
                for (k, v) in map {
                    out.insert(k, Node::from_json(v));
                }
                Self::Map(out)
            }
        }
    }
}

impl serde::Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_yaml().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Node {
        Node::from(serde_yaml::from_str::<Value>(yaml).unwrap())
    }

    #[test]
    fn scalars_round_trip() {
        assert_eq!(parse("42"), Node::Int(42));
        assert_eq!(parse("true"), Node::Bool(true));
        assert_eq!(parse("hello"), Node::String("hello".into()));
        assert_eq!(parse("null"), Node::Null);
    }

    #[test]
    fn custom_tags_become_tagged_nodes() {
        let node = parse("!env HOME");
        assert_eq!(
            node,
            Node::Tagged {
                tag: "env".into(),
                args: Box::new(Node::String("HOME".into())),
            }
        );
    }

    #[test]
    fn dotted_tags_are_preserved() {
        let node = parse("!terraform.output vpc vpc_id");
        match node {
            Node::Tagged { ref tag, .. } => assert_eq!(tag, "terraform.output"),
            other => panic!("expected tagged node, got {other:?}"),
        }
    }

    #[test]
    fn map_order_is_preserved() {
        let node = parse("b: 1\na: 2\nc: 3");
        let keys: Vec<_> = node.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn unset_is_stripped_from_output() {
        let mut map = IndexMap::new();
        map.insert("keep".to_string(), Node::Int(1));
        map.insert("gone".to_string(), Node::Unset);
        let node = Node::Map(map);

        let json = node.to_json();
        assert_eq!(json, serde_json::json!({"keep": 1}));
    }

    #[test]
    fn has_tagged_sees_nested_functions() {
        let node = parse("vars:\n  vpc_id: !terraform.output vpc vpc_id");
        assert!(node.has_tagged());
        let plain = parse("vars:\n  vpc_id: vpc-123");
        assert!(!plain.has_tagged());
    }

    #[test]
    fn tagged_source_form_round_trips_spelling() {
        let node = parse("!include catalog/defaults.yaml");
        assert_eq!(node.source_form(), "!include catalog/defaults.yaml");
    }

    #[test]
    fn get_path_walks_nested_maps() {
        let node = parse("a:\n  b:\n    c: 7");
        assert_eq!(node.get_path(&["a", "b", "c"]), Some(&Node::Int(7)));
        assert_eq!(node.get_path(&["a", "x"]), None);
    }
}
