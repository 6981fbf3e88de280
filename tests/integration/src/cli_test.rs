//! CLI surface tests over the built binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
}

/// A minimal project: atmos.yaml, one stack, one component directory.
fn seed_project(dir: &TempDir) {
    write(
        dir,
        "atmos.yaml",
        r#"
base_path: .
components:
  terraform:
    base_path: components/terraform
    command: terraform
stacks:
  base_path: stacks
  name_pattern: "{tenant}-{stage}"
"#,
    );
    write(
        dir,
        "stacks/dev.yaml",
        r#"
vars:
  tenant: plat
  stage: dev
components:
  terraform:
    vpc:
      vars:
        cidr: 10.0.0.0/16
    blueprint:
      metadata:
        type: abstract
      vars: {}
"#,
    );
    std::fs::create_dir_all(dir.path().join("components/terraform/vpc")).unwrap();
    std::fs::create_dir_all(dir.path().join("components/terraform/blueprint")).unwrap();
}

fn atmos() -> Command {
    Command::cargo_bin("atmos").unwrap()
}

#[test]
fn version_prints_and_exits_zero() {
    atmos()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("atmos "));
}

#[test]
fn describe_component_emits_materialized_yaml() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args(["describe", "component", "vpc", "-s", "plat-dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cidr: 10.0.0.0/16"))
        .stdout(predicate::str::contains("stack: plat-dev"));
}

#[test]
fn describe_component_json_format() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args([
            "describe", "component", "vpc", "-s", "plat-dev", "--format", "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cidr\": \"10.0.0.0/16\""));
}

#[test]
fn abstract_component_blocks_apply_with_exit_one() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args(["terraform", "apply", "blueprint", "-s", "plat-dev"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("abstract"))
        .stderr(predicate::str::contains("blueprint"));
}

#[test]
fn unknown_stack_fails_with_a_clear_message() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args(["describe", "component", "vpc", "-s", "plat-prod"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("plat-prod"));
}

#[test]
fn list_stacks_and_components() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args(["list", "stacks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plat-dev"));

    atmos()
        .current_dir(dir.path())
        .args(["list", "components", "-s", "plat-dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc"))
        .stdout(predicate::str::contains("blueprint"));
}

#[test]
fn list_components_with_selector_filters() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args([
            "list",
            "components",
            "-s",
            "plat-dev",
            "--selector",
            "cidr=10.0.0.0/16",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc"))
        .stdout(predicate::str::contains("blueprint").not());
}

#[test]
fn generate_varfile_writes_into_component_dir() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args(["terraform", "generate", "varfile", "vpc", "-s", "plat-dev"])
        .assert()
        .success();

    let varfile = dir
        .path()
        .join("components/terraform/vpc/plat-dev-vpc.terraform.tfvars");
    let content = std::fs::read_to_string(varfile).unwrap();
    assert!(content.contains("cidr = \"10.0.0.0/16\""), "{content}");
}

#[test]
fn validate_stacks_passes_on_a_healthy_tree() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args(["validate", "stacks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("all stacks valid"));
}

#[test]
fn validate_component_fails_with_exit_two() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);
    // A policy the vpc component cannot satisfy
    write(
        &dir,
        "stacks/policy.yaml",
        r#"
vars:
  tenant: plat
  stage: policy
components:
  terraform:
    strict:
      settings:
        validation:
          must-have-owner:
            schema_type: jsonschema
            schema:
              type: object
              properties:
                vars:
                  type: object
                  required: [owner]
      vars: {}
"#,
    );
    std::fs::create_dir_all(dir.path().join("components/terraform/strict")).unwrap();

    atmos()
        .current_dir(dir.path())
        .args(["validate", "component", "strict", "-s", "plat-policy"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("must-have-owner"));
}

#[test]
fn toolchain_which_reports_missing_tools() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);

    atmos()
        .current_dir(dir.path())
        .args(["toolchain", "which", "kubectl"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn fixture_project_describes_with_catalog_override() {
    let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../test-fixtures/simple-project");

    atmos()
        .current_dir(&fixture)
        .args(["describe", "component", "vpc", "-s", "plat-dev"])
        .assert()
        .success()
        // The stack-level value wins over the catalog default
        .stdout(predicate::str::contains("cidr: 10.1.0.0/16"))
        .stdout(predicate::str::contains("team: network"));
}

#[test]
fn env_override_changes_stacks_base_path() {
    let dir = TempDir::new().unwrap();
    seed_project(&dir);
    // Move the stacks tree and point ATMOS_STACKS_BASE_PATH at it
    std::fs::rename(dir.path().join("stacks"), dir.path().join("layouts")).unwrap();

    atmos()
        .current_dir(dir.path())
        .env("ATMOS_STACKS_BASE_PATH", "layouts")
        .args(["list", "stacks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plat-dev"));
}
