use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn mirrorbuild(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mirrorbuild"));
    cmd.current_dir(dir).env("RUST_LOG", "warn");
    cmd
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write fixture");
}

/// A tiny app with a shell "compiler" that copies sources into `out/`.
fn app() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path().to_path_buf();
    write(&root.join("package.json"), "{\"name\":\"shop\"}\n");
    write(
        &root.join("src/components/PaymentProvider.tsx"),
        "const Braintree = dynamic(() => import(\"./Braintree\"))\n",
    );
    write(
        &root.join("mirrorbuild.yaml"),
        r#"manifest: [package.json, src]
patches:
  - file: src/components/PaymentProvider.tsx
    replace: { pattern: 'import\("\./Braintree"\)', regex: true, with: 'import("./MockedBraintree")' }
build:
  command: [sh, -c, "mkdir -p out && cp src/components/PaymentProvider.tsx out/index.html"]
  output_dir: out
"#,
    );
    (tmp, root)
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let tmp = TempDir::new().expect("tmp");

    mirrorbuild(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Wrote starter config"));
    let written = fs::read_to_string(tmp.path().join("mirrorbuild.yaml")).expect("config");
    assert!(written.contains("MockedBraintree"));

    mirrorbuild(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("--force"));

    mirrorbuild(tmp.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn missing_config_points_at_init() {
    let tmp = TempDir::new().expect("tmp");
    mirrorbuild(tmp.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("mirrorbuild init"));
}

#[test]
fn explicit_config_path_is_honoured() {
    let (_tmp, root) = app();
    let elsewhere = TempDir::new().expect("cwd");
    let config = root.join("mirrorbuild.yaml");

    mirrorbuild(elsewhere.path())
        .args(["--config", config.to_str().expect("utf8 path"), "mirror"])
        .assert()
        .success()
        .stdout(contains("base mirror converged"));
    assert!(root.join(".e2e/base/package.json").exists());
}

#[cfg(unix)]
#[test]
fn run_builds_once_then_skips() {
    let (_tmp, root) = app();

    mirrorbuild(&root)
        .arg("run")
        .assert()
        .success()
        .stdout(contains("build completed, artifact relocated"));
    let served = fs::read_to_string(root.join(".e2e/artifact/index.html")).expect("artifact");
    assert!(served.contains("MockedBraintree"));

    mirrorbuild(&root)
        .arg("run")
        .assert()
        .success()
        .stdout(contains("build skipped, no changes"));
}

#[cfg(unix)]
#[test]
fn failing_compile_step_exits_non_zero_with_stderr() {
    let (_tmp, root) = app();
    let config = fs::read_to_string(root.join("mirrorbuild.yaml")).unwrap().replace(
        "mkdir -p out && cp src/components/PaymentProvider.tsx out/index.html",
        "echo 'Module not found' >&2; exit 1",
    );
    write(&root.join("mirrorbuild.yaml"), &config);

    mirrorbuild(&root)
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("Module not found"));
}

#[cfg(unix)]
#[test]
fn status_json_tracks_drift_and_rebuild_reasons() {
    let (_tmp, root) = app();

    let before = mirrorbuild(&root).args(["status", "--json"]).output().unwrap();
    assert!(before.status.success());
    let before: serde_json::Value = serde_json::from_slice(&before.stdout).expect("json");
    assert_eq!(before["artifact_present"], false);
    let reasons = before["rebuild_reasons"].as_array().expect("reasons");
    assert!(reasons.contains(&serde_json::json!("artifact-missing")));
    assert!(!before["drift"].as_array().expect("drift").is_empty());
    assert!(!root.join(".e2e").exists(), "status must not write");

    mirrorbuild(&root).arg("run").assert().success();

    let after = mirrorbuild(&root).args(["status", "--json"]).output().unwrap();
    let after: serde_json::Value = serde_json::from_slice(&after.stdout).expect("json");
    assert_eq!(after["drift"], serde_json::json!([]));
    assert_eq!(after["rebuild_reasons"], serde_json::json!([]));
    assert!(after["last_build"]["fingerprint"].is_string());
}

#[test]
fn diff_shows_source_edit_as_added_line() {
    let (_tmp, root) = app();
    mirrorbuild(&root).arg("mirror").assert().success();

    write(&root.join("package.json"), "{\"name\":\"shop\",\"private\":true}\n");
    let assert = mirrorbuild(&root).arg("diff").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");

    assert!(stdout.contains("--- a/package.json"), "got:\n{stdout}");
    assert!(stdout
        .lines()
        .any(|line| line.starts_with('+') && line.contains("private")));

    mirrorbuild(&root).arg("mirror").assert().success();
    mirrorbuild(&root)
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("No differences"));
}

#[test]
fn mirror_json_reports_removed_strays() {
    let (_tmp, root) = app();
    write(&root.join(".e2e/base/old.js"), "stale");

    let output = mirrorbuild(&root).args(["mirror", "--json"]).output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["removed"], serde_json::json!(["old.js"]));
    assert!(!root.join(".e2e/base/old.js").exists());
}

#[cfg(unix)]
#[test]
fn mirror_between_runs_does_not_swallow_the_rebuild() {
    let (_tmp, root) = app();
    mirrorbuild(&root).arg("run").assert().success();

    write(
        &root.join("src/components/PaymentProvider.tsx"),
        "const Braintree = dynamic(() => import(\"./Braintree\")) // v2\n",
    );
    mirrorbuild(&root)
        .arg("mirror")
        .assert()
        .success()
        .stdout(contains("base mirror converged"));

    let status = mirrorbuild(&root).args(["status", "--json"]).output().unwrap();
    let status: serde_json::Value = serde_json::from_slice(&status.stdout).expect("json");
    assert_eq!(
        status["rebuild_reasons"],
        serde_json::json!(["no-successful-build"])
    );

    mirrorbuild(&root)
        .arg("run")
        .assert()
        .success()
        .stdout(contains("build completed, artifact relocated"));
    let served = fs::read_to_string(root.join(".e2e/artifact/index.html")).expect("artifact");
    assert!(served.contains("// v2"), "served stale artifact: {served}");
}
