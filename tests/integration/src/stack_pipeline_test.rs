//! End-to-end resolver scenarios over the library crates

use atmos_auth::AuthContext;
use atmos_config::AtmosConfig;
use atmos_fs::NormalizedPath;
use atmos_stack::{MaterializeOptions, Materializer, Node};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
}

fn materializer(dir: &TempDir) -> Arc<Materializer> {
    let config: AtmosConfig = serde_yaml::from_str(
        r#"
stacks:
  base_path: stacks
  name_pattern: "{tenant}-{stage}"
"#,
    )
    .unwrap();
    Materializer::new(Arc::new(config), NormalizedPath::new(dir.path()))
}

#[test]
fn inheritance_mro_later_base_wins() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "stacks/dev.yaml",
        r#"
vars:
  tenant: plat
  stage: dev
components:
  terraform:
    a:
      metadata: { type: abstract }
      vars: { foo: A }
    b:
      metadata: { type: abstract }
      vars: { foo: B }
    c:
      metadata:
        inherits: [a, b]
      vars: {}
"#,
    );
    let m = materializer(&dir);
    let c = m
        .materialize("terraform", "c", "plat-dev", MaterializeOptions::default(), None)
        .unwrap();
    assert_eq!(c.vars.get_path(&["foo"]), Some(&Node::String("B".into())));
}

#[test]
fn inheritance_own_value_beats_bases() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "stacks/dev.yaml",
        r#"
vars:
  tenant: plat
  stage: dev
components:
  terraform:
    a:
      vars: { foo: A }
    b:
      vars: { foo: B }
    c:
      metadata:
        inherits: [a, b]
      vars: { foo: C }
"#,
    );
    let m = materializer(&dir);
    let c = m
        .materialize("terraform", "c", "plat-dev", MaterializeOptions::default(), None)
        .unwrap();
    assert_eq!(c.vars.get_path(&["foo"]), Some(&Node::String("C".into())));
}

#[test]
fn list_merge_strategies_follow_settings() {
    let dir = TempDir::new().unwrap();
    write(&dir, "stacks/catalog/app.yaml", "components:\n  terraform:\n    app:\n      vars:\n        xs: [1, 2]\n");
    write(
        &dir,
        "stacks/dev.yaml",
        r#"
import:
  - catalog/app
settings:
  list_merge_strategy: append
vars:
  tenant: plat
  stage: dev
components:
  terraform:
    app:
      vars:
        xs: [3]
"#,
    );
    let m = materializer(&dir);
    let app = m
        .materialize("terraform", "app", "plat-dev", MaterializeOptions::default(), None)
        .unwrap();
    assert_eq!(
        app.vars.get_path(&["xs"]),
        Some(&Node::Seq(vec![Node::Int(1), Node::Int(2), Node::Int(3)]))
    );

    // Same layout, replace strategy: only the rightmost list survives
    let dir2 = TempDir::new().unwrap();
    write(&dir2, "stacks/catalog/app.yaml", "components:\n  terraform:\n    app:\n      vars:\n        xs: [1, 2]\n");
    write(
        &dir2,
        "stacks/dev.yaml",
        r#"
import:
  - catalog/app
vars:
  tenant: plat
  stage: dev
components:
  terraform:
    app:
      vars:
        xs: [3]
"#,
    );
    let m2 = materializer(&dir2);
    let app2 = m2
        .materialize("terraform", "app", "plat-dev", MaterializeOptions::default(), None)
        .unwrap();
    assert_eq!(app2.vars.get_path(&["xs"]), Some(&Node::Seq(vec![Node::Int(3)])));
}

/// Records which auth context each output read observed.
struct RecordingReader {
    seen: Mutex<Vec<(String, Vec<String>, Option<String>)>>,
}

impl atmos_stack::OutputReader for RecordingReader {
    fn read_output(
        &self,
        config: &atmos_stack::ComponentConfig,
        output: &str,
        auth: &AuthContext,
    ) -> Result<serde_json::Value, String> {
        let account = auth
            .identities()
            .get("i2")
            .and_then(|i| i.account.clone());
        self.seen.lock().unwrap().push((
            config.name.clone(),
            auth.chain().to_vec(),
            account,
        ));
        Ok(serde_json::json!(format!("{}-{}", config.name, output)))
    }
}

#[test]
fn terraform_output_auth_context_propagates_through_nesting() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "stacks/dev.yaml",
        r#"
vars:
  tenant: plat
  stage: dev
components:
  terraform:
    l1:
      vars:
        from_l2: !terraform.output l2 x
    l2:
      auth:
        identities:
          i2:
            account: "222"
      vars:
        from_l3: !terraform.output l3 y
    l3:
      vars: {}
"#,
    );
    let m = materializer(&dir);
    let reader = Arc::new(RecordingReader {
        seen: Mutex::new(Vec::new()),
    });
    m.set_output_reader(reader.clone());

    let l1 = m
        .materialize("terraform", "l1", "plat-dev", MaterializeOptions::default(), None)
        .unwrap();
    assert_eq!(
        l1.vars.get_path(&["from_l2"]),
        Some(&Node::String("l2-x".into()))
    );

    let seen = reader.seen.lock().unwrap();
    // l3 was read while materializing l2; the context derived at l2 (with
    // identity i2/account 222) is what the innermost read observes
    let l3_read = seen.iter().find(|(name, _, _)| name == "l3").unwrap();
    assert_eq!(l3_read.1, vec!["l2".to_string()]);
    assert_eq!(l3_read.2.as_deref(), Some("222"));

    // Reading l2 itself also happens under l2's derived context
    let l2_read = seen.iter().find(|(name, _, _)| name == "l2").unwrap();
    assert_eq!(l2_read.1, vec!["l2".to_string()]);
}

#[test]
fn terraform_state_reads_static_remote_state() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "stacks/dev.yaml",
        r#"
vars:
  tenant: plat
  stage: dev
components:
  terraform:
    consumer:
      vars:
        vpc_id: !terraform.state network vpc_id
    network:
      remote_state_backend_type: static
      remote_state_backend:
        static:
          vpc_id: vpc-123
      vars: {}
"#,
    );
    let m = materializer(&dir);
    m.set_remote_state_reader(Arc::new(atmos_exec::StaticRemoteStateReader));

    let consumer = m
        .materialize(
            "terraform",
            "consumer",
            "plat-dev",
            MaterializeOptions::default(),
            None,
        )
        .unwrap();
    assert_eq!(
        consumer.vars.get_path(&["vpc_id"]),
        Some(&Node::String("vpc-123".into()))
    );
}

#[test]
fn describe_output_is_byte_identical_across_runs() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "stacks/dev.yaml",
        r#"
vars:
  tenant: plat
  stage: dev
  tags:
    team: network
    env: dev
components:
  terraform:
    vpc:
      vars:
        cidr: 10.0.0.0/16
"#,
    );

    // Two independent materializers over the same inputs
    let first = materializer(&dir)
        .materialize("terraform", "vpc", "plat-dev", MaterializeOptions::default(), None)
        .unwrap();
    let second = materializer(&dir)
        .materialize("terraform", "vpc", "plat-dev", MaterializeOptions::default(), None)
        .unwrap();
    assert_eq!(
        serde_yaml::to_string(first.as_ref()).unwrap(),
        serde_yaml::to_string(second.as_ref()).unwrap()
    );
}
