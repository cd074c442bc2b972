#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const STORE_ENV: &[&str] = &[
    "SUPABASE_URL",
    "SUPABASE_SERVICE_ROLE_KEY",
    "SUPABASE_ANON_KEY",
    "GOVERN_STORE_TIMEOUT_SECS",
    "RUST_LOG",
];

fn govern(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("govern").unwrap();
    cmd.current_dir(dir.path()).env("GOVERN_ROOT", dir.path());
    for key in STORE_ENV {
        cmd.env_remove(key);
    }
    cmd
}

fn with_store(cmd: &mut Command, url: &str) {
    cmd.env("SUPABASE_URL", url)
        .env("SUPABASE_SERVICE_ROLE_KEY", "test-key");
}

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// govern drift
// ---------------------------------------------------------------------------

#[test]
fn clean_tree_exits_zero() {
    let dir = TempDir::new().unwrap();
    write(&dir, "src/app.ts", "import { x } from './x';\n");
    write(&dir, "docs/PRD-001.md", "# Documentation is allowlisted\n");

    govern(&dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("No drift detected."))
        .stdout(predicate::str::contains("PASSED"));
}

#[test]
fn critical_finding_blocks_with_exit_one() {
    let dir = TempDir::new().unwrap();
    write(&dir, "scripts/PRD-042.md", "# stray PRD\n");

    govern(&dir)
        .args(["drift", "--dry-run"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("prd_files"))
        .stdout(predicate::str::contains("scripts/PRD-042.md"))
        .stdout(predicate::str::contains("BLOCKED"));
}

#[test]
fn warnings_alone_do_not_block() {
    let dir = TempDir::new().unwrap();
    write(&dir, "notes/sprint-retrospective.md", "went well\n");
    write(&dir, "out/weekly-report.md", "numbers\n");

    govern(&dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("retrospective_files"))
        .stdout(predicate::str::contains("generated_reports"))
        .stdout(predicate::str::contains("PASSED"));
}

#[test]
fn cross_domain_import_blocks() {
    let dir = TempDir::new().unwrap();
    write(&dir, "scripts/seed.js", "const api = require('../src/api/client');\n");

    govern(&dir)
        .arg("--dry-run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("boundary_violations"))
        .stdout(predicate::str::contains("scripts/seed.js -> ../src/api/client"));
}

#[test]
fn long_file_lists_are_truncated_with_total() {
    let dir = TempDir::new().unwrap();
    for i in 0..12 {
        write(&dir, &format!("handoffs/h-{i:02}.md"), "x\n");
    }

    govern(&dir)
        .arg("--dry-run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("... and 2 more (12 total)"))
        .stdout(predicate::str::contains("handoffs/h-11.md").not());
}

#[test]
fn missing_credentials_exit_two_before_scanning() {
    let dir = TempDir::new().unwrap();
    write(&dir, "scripts/PRD-042.md", "# stray PRD\n");

    govern(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SUPABASE_URL"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn invalid_config_exits_two() {
    let dir = TempDir::new().unwrap();
    write(&dir, ".govern/config.yaml", "drift:\n  allowlist: ['docs/[oops']\n");

    govern(&dir)
        .arg("--dry-run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid glob pattern"));
}

#[test]
fn findings_are_recorded_as_alerts() {
    let dir = TempDir::new().unwrap();
    write(&dir, "scripts/PRD-042.md", "# stray PRD\n");
    write(&dir, "notes/q3-retrospective.md", "x\n");

    let mut server = mockito::Server::new();
    let prd = server
        .mock("POST", "/rest/v1/compliance_alerts")
        .match_header("apikey", "test-key")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "alert_type": "prd_files",
            "severity": "critical",
            "source": "filesystem-drift-detector",
        })))
        .with_status(201)
        .expect(1)
        .create();
    let retro = server
        .mock("POST", "/rest/v1/compliance_alerts")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "alert_type": "retrospective_files",
            "severity": "warning",
        })))
        .with_status(201)
        .expect(1)
        .create();

    let mut cmd = govern(&dir);
    with_store(&mut cmd, &server.url());
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Recorded 2 of 2 compliance alert(s)."));

    prd.assert();
    retro.assert();
}

#[test]
fn alert_write_failure_does_not_abort_scan() {
    let dir = TempDir::new().unwrap();
    write(&dir, "scripts/PRD-042.md", "# stray PRD\n");

    let mut server = mockito::Server::new();
    server
        .mock("POST", "/rest/v1/compliance_alerts")
        .with_status(500)
        .with_body("boom")
        .create();

    let mut cmd = govern(&dir);
    with_store(&mut cmd, &server.url());
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Recorded 0 of 1 compliance alert(s)."))
        .stderr(predicate::str::contains("failed to record compliance alert"));
}

#[test]
fn json_output_and_report_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "plans/SD-2024-001.md", "x\n");

    let output = govern(&dir)
        .args(["--json", "--dry-run", "--report", "out/drift.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stdout = stdout_json(&output);
    assert_eq!(stdout["verdict"], "block");
    assert_eq!(stdout["findings"][0]["type"], "strategic_directive_files");
    assert_eq!(stdout["findings"][0]["severity"], "critical");

    // Relative report paths land relative to the working directory.
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("out/drift.json")).unwrap())
            .unwrap();
    assert_eq!(saved["scan_id"], stdout["scan_id"]);
}

#[test]
fn excluded_directories_are_not_scanned() {
    let dir = TempDir::new().unwrap();
    write(&dir, "node_modules/pkg/PRD-1.md", "x\n");
    write(&dir, "src/examples/handoff-sample.md", "x\n");

    govern(&dir).arg("--dry-run").assert().success();
}

// ---------------------------------------------------------------------------
// govern route
// ---------------------------------------------------------------------------

#[test]
fn route_without_store_uses_fallback() {
    let dir = TempDir::new().unwrap();
    let output = govern(&dir)
        .args(["route", "--loc", "50", "--type", "bug", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let d = stdout_json(&output);
    assert_eq!(d["tier"], 2);
    assert_eq!(d["thresholdId"], "fallback");
    assert_eq!(d["complianceMinScore"], 70);
    assert_eq!(d["tier1MaxLoc"], 30);
    assert_eq!(d["tier2MaxLoc"], 75);
}

#[test]
fn route_uses_store_thresholds() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/rest/v1/work_item_thresholds")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"id":"cfg-7","tier1_max_loc":60,"tier2_max_loc":200}]"#)
        .create();

    let mut cmd = govern(&dir);
    with_store(&mut cmd, &server.url());
    let output = cmd
        .args(["route", "--loc", "50", "--type", "bug", "--json"])
        .output()
        .unwrap();
    mock.assert();
    let d = stdout_json(&output);
    assert_eq!(d["tier"], 1);
    assert_eq!(d["thresholdId"], "cfg-7");
}

#[test]
fn route_fails_closed_on_multiple_active_rows() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/rest/v1/work_item_thresholds")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"id":"a","tier1_max_loc":30,"tier2_max_loc":75},{"id":"b","tier1_max_loc":30,"tier2_max_loc":75}]"#)
        .create();

    let mut cmd = govern(&dir);
    with_store(&mut cmd, &server.url());
    let output = cmd.args(["route", "--loc", "3", "--json"]).output().unwrap();
    let d = stdout_json(&output);
    assert_eq!(d["tier"], 3);
    assert_eq!(d["thresholdId"], "ambiguous");
}

#[test]
fn route_escalates_features_and_security() {
    let dir = TempDir::new().unwrap();
    govern(&dir)
        .args(["route", "--loc", "5", "--type", "feature"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tier 3: Strategic Directive"))
        .stdout(predicate::str::contains("feature"));

    let output = govern(&dir)
        .args(["route", "--loc", "5", "--risk-tag", "ui", "--risk-tag", "security", "--json"])
        .output()
        .unwrap();
    let d = stdout_json(&output);
    assert_eq!(d["tier"], 3);
    assert_eq!(d["requiresLeadReview"], true);
}

// ---------------------------------------------------------------------------
// govern deps
// ---------------------------------------------------------------------------

#[test]
fn deps_clean_set_passes() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "stories.json",
        r#"[
            {"story_key": "SD-X:US-001", "title": "Schema"},
            {"story_key": "SD-X:US-002", "depends_on": ["SD-X:US-001"]},
            {"story_key": "SD-X:US-003", "description": "Runs after US-002"}
        ]"#,
    );

    govern(&dir)
        .args(["deps", "stories.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED (score 100/100)"))
        .stdout(predicate::str::contains("3. SD-X:US-003"));
}

#[test]
fn deps_relative_file_is_read_from_working_directory() {
    let dir = TempDir::new().unwrap();
    write(&dir, "stories.json", r#"[{"story_key": "A-1", "depends_on": ["A-1"]}]"#);
    write(
        &dir,
        "planning/stories.json",
        r#"[{"story_key": "P-1"}, {"story_key": "P-2", "depends_on": ["P-1"]}]"#,
    );

    govern(&dir)
        .current_dir(dir.path().join("planning"))
        .args(["deps", "./stories.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2. P-2"));
}

#[test]
fn deps_cycle_fails_with_exit_one() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "stories.json",
        r#"{"stories": [
            {"story_key": "A-1", "dependencies": "B-1"},
            {"story_key": "B-1", "dependencies": "C-1"},
            {"story_key": "C-1", "dependencies": "A-1"}
        ]}"#,
    );

    let output = govern(&dir)
        .args(["deps", "stories.json", "--json", "--guidance"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let report = stdout_json(&output);
    assert_eq!(report["passed"], false);
    assert_eq!(
        report["details"]["circularDependencies"][0],
        serde_json::json!(["A-1", "B-1", "C-1"])
    );
    assert!(report["details"]["executionOrder"].is_null());
    assert_eq!(report["guidance"][0]["priority"], "required");
}

#[test]
fn deps_rejects_malformed_input() {
    let dir = TempDir::new().unwrap();
    write(&dir, "stories.json", r#"{"items": []}"#);

    govern(&dir)
        .args(["deps", "stories.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("stories"));
}

// ---------------------------------------------------------------------------
// govern config
// ---------------------------------------------------------------------------

#[test]
fn config_show_prints_defaults() {
    let dir = TempDir::new().unwrap();
    govern(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("work_item_thresholds"))
        .stdout(predicate::str::contains("prd_files"));
}

#[test]
fn config_validate_reports_warnings_but_succeeds() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        ".govern/config.yaml",
        "router:\n  cache_ttl_secs: 999999\n",
    );

    govern(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning] router.cache_ttl_secs"));
}
