use std::fs;
use std::process::Command;

fn analyze(dir: &tempfile::TempDir, args: &[&str]) -> (bool, String, String) {
    let out = Command::new(env!("CARGO_BIN_EXE_tst-lsp"))
        .current_dir(dir.path())
        .args(args)
        .output()
        .expect("spawn tst-lsp");
    (
        out.status.success(),
        String::from_utf8_lossy(&out.stdout).into_owned(),
        String::from_utf8_lossy(&out.stderr).into_owned(),
    )
}

#[test]
fn analyze_prints_json_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("manager.tst"),
        "-- Environment: MANAGER\nTEST.NOTES:\nTEST.VALUE:x\nTEST.END_NOTES:\n",
    )
    .unwrap();

    let (ok, stdout, _) = analyze(&dir, &["--analyze", "manager.tst"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["environment"], "MANAGER");
    let diags = json["diagnostics"].as_array().unwrap();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0]["message"], "Commands cannot be nested in a \"NOTES\" block");
    assert_eq!(diags[0]["range"]["start"]["line"], 2);
}

#[test]
fn errors_only_lists_rule_violations() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("driver.tst"),
        "TEST.SUBPROGRAM:coded_tests_driver\nTEST.NEW\nTEST.VALUE:manager.x:1\nTEST.END\n",
    )
    .unwrap();

    let (ok, stdout, _) = analyze(&dir, &["--analyze", "--errors-only", "driver.tst"]);
    assert!(ok);
    assert_eq!(
        stdout.trim(),
        "Line 3:1: TEST.VALUE and TEST.EXPECTED are not valid when TEST.SUBPROGRAM is set to coded_tests_driver"
    );
}

#[test]
fn absolute_paths_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (ok, _, stderr) = analyze(&dir, &["--analyze", "/etc/hosts"]);
    assert!(!ok);
    assert!(stderr.contains("Unsafe file path"));
}

#[test]
fn requirement_keys_need_a_requirements_gateway() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("manager.tst"),
        "-- Environment: MANAGER\nTEST.NEW\nTEST.REQUIREMENT_KEY:FR11\nTEST.END\n",
    )
    .unwrap();

    let (ok, stdout, _) = analyze(&dir, &["--analyze", "manager.tst"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        json["diagnostics"][0]["message"],
        "TEST.REQUIREMENT_KEY is not valid when the requirements gateway is not present in the environment"
    );

    let gateway = dir.path().join("repo").join("requirements_gateway");
    fs::create_dir_all(&gateway).unwrap();
    fs::write(gateway.join("requirements.json"), "{}").unwrap();
    fs::write(
        dir.path().join("CCAST_.CFG"),
        format!("VCAST_REPOSITORY: {}\n", dir.path().join("repo").display()),
    )
    .unwrap();

    let (ok, stdout, _) = analyze(&dir, &["--analyze", "manager.tst"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["diagnostics"], serde_json::json!([]));
}
