use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use scriptcheck_e2e::{DocumentBuilder, QaTree};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("crates/e2e sits two levels below the workspace")
        .to_path_buf()
}

fn scriptcheck(args: &[&str]) -> std::io::Result<Output> {
    Command::new("cargo")
        .args(["run", "--quiet", "-p", "scriptcheck-cli", "--"])
        .args(args)
        .env("NO_COLOR", "1")
        .current_dir(workspace_root())
        .output()
}

/// CLI exit codes and output formats
///
/// Marked ignored because it shells out to cargo to build the binary.
#[test]
#[ignore]
fn cli_exit_codes_follow_report_outcome() {
    if Command::new("cargo").arg("--version").output().is_err() {
        eprintln!("Skipping: cargo not available in PATH");
        return;
    }

    let tree = QaTree::new().expect("create qa tree");
    tree.write_doc(
        "acl",
        "admin-access.mock.md",
        &DocumentBuilder::template("acl", "ACL-001").render(),
    )
    .expect("write document");
    let root = tree.qa_root();
    let root = root.to_str().expect("utf-8 temp path");

    // Missing screenshot is a warning: passes unless strict
    let out = scriptcheck(&[root]).expect("run scriptcheck");
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("warning[screenshot-missing]"));

    let out = scriptcheck(&["--strict", root]).expect("run scriptcheck");
    assert_eq!(out.status.code(), Some(1));

    let out = scriptcheck(&["--format", "json", root]).expect("run scriptcheck");
    let records: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("json output");
    assert_eq!(records[0]["ruleId"], "screenshot-missing");

    let missing = tree.path().join("nope");
    let out = scriptcheck(&[missing.to_str().expect("utf-8 temp path")]).expect("run scriptcheck");
    assert_eq!(out.status.code(), Some(2));

    let out = scriptcheck(&["--list-rules", "--format", "json"]).expect("run scriptcheck");
    assert_eq!(out.status.code(), Some(0));
}
