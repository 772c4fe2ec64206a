//! Integration tests for auditflow
//!
//! These drive the binary end to end against a SQLite database in a temp dir.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create an auditflow Command isolated from the caller's environment
fn auditflow(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("auditflow");
    cmd.current_dir(dir.path())
        .env_remove("AUDITFLOW_DB")
        .env_remove("AUDITFLOW_LOG")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to create an initialized project directory with one audit project (id 1)
fn project_with_audit() -> TempDir {
    let dir = TempDir::new().unwrap();
    auditflow(&dir).arg("init").assert().success();
    auditflow(&dir)
        .args(["project", "create", "Quarterly controls review"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created audit project 1"));
    dir
}

fn set_completeness(dir: &TempDir, phase: &str, value: &str) {
    auditflow(dir)
        .args(["completeness", "set", "-p", "1", phase, value])
        .assert()
        .success();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("advance"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized auditflow"));

        assert!(dir.path().join(".auditflow").is_dir());
        assert!(dir.path().join(".auditflow/auditflow.toml").is_file());
        assert!(dir.path().join(".auditflow/auditflow.db").is_file());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir).arg("init").assert().success();
        auditflow(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_commands_require_init() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .args(["project", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("auditflow init"));
    }

    #[test]
    fn test_uninitialized_dir_is_named() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .args(["status", "-p", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not initialized"));
    }

    #[test]
    fn test_missing_db_outside_auditflow_dir() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir).arg("init").assert().success();
        auditflow(&dir)
            .env("AUDITFLOW_DB", dir.path().join("gone.db"))
            .args(["project", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No database at"))
            .stderr(predicate::str::contains("gone.db"));
    }

    #[test]
    fn test_phases_lists_registry() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .arg("phases")
            .assert()
            .success()
            .stdout(predicate::str::contains("Planning"))
            .stdout(predicate::str::contains("follow_up_completeness"))
            .stdout(predicate::str::contains("Follow-up"));
    }

    #[test]
    fn test_phases_json() {
        let dir = TempDir::new().unwrap();
        let output = auditflow(&dir).args(["--json", "phases"]).output().unwrap();
        assert!(output.status.success());
        let phases: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let phases = phases.as_array().unwrap();
        assert_eq!(phases.len(), 5);
        assert_eq!(phases[0]["id"], "planning");
        assert_eq!(phases[4]["id"], "follow_up");
        assert_eq!(phases[4]["ordinal"], 4);
    }
}

// =============================================================================
// Project Tests
// =============================================================================

mod projects {
    use super::*;

    #[test]
    fn test_create_and_list() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["project", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Quarterly controls review"))
            .stdout(predicate::str::contains("Planning"));
    }

    #[test]
    fn test_list_empty() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir).arg("init").assert().success();
        auditflow(&dir)
            .args(["project", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No audit projects"));
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir).arg("init").assert().success();
        auditflow(&dir)
            .args(["project", "create", "   "])
            .assert()
            .failure();
    }

    #[test]
    fn test_status_unknown_project() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["status", "-p", "42"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("42 not found"));
    }
}

// =============================================================================
// Workflow Tests
// =============================================================================

mod workflow {
    use super::*;

    #[test]
    fn test_new_project_status() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["status", "-p", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Current phase: Planning"))
            .stdout(predicate::str::contains("Can advance: no"))
            .stdout(predicate::str::contains("Can retreat: no"));
    }

    #[test]
    fn test_status_json() {
        let dir = project_with_audit();
        set_completeness(&dir, "planning", "90");
        let output = auditflow(&dir)
            .args(["--json", "status", "-p", "1"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(view["current"]["id"], "planning");
        assert_eq!(view["can_advance"], true);
        assert_eq!(view["phases"][0]["completeness"], 90);
        assert_eq!(view["phases"][1]["access"], "next_unlocked");
        assert!(view["phases"][2]["access"].is_null());
    }

    #[test]
    fn test_advance_blocked_below_threshold() {
        let dir = project_with_audit();
        set_completeness(&dir, "planning", "60");
        auditflow(&dir)
            .args(["advance", "-p", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("60%"))
            .stderr(predicate::str::contains("80%"));

        auditflow(&dir)
            .args(["status", "-p", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Current phase: Planning"));
    }

    #[test]
    fn test_advance_at_threshold() {
        let dir = project_with_audit();
        set_completeness(&dir, "planning", "80");
        auditflow(&dir)
            .args(["advance", "-p", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Execution"));

        auditflow(&dir)
            .args(["status", "-p", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Current phase: Execution"));
    }

    #[test]
    fn test_retreat_at_first_phase_fails() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["retreat", "-p", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("first phase"));
    }

    #[test]
    fn test_retreat_ignores_completeness() {
        let dir = project_with_audit();
        set_completeness(&dir, "planning", "100");
        auditflow(&dir).args(["advance", "-p", "1"]).assert().success();
        auditflow(&dir)
            .args(["retreat", "-p", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Planning"));
    }

    #[test]
    fn test_advance_to_expected_phase() {
        let dir = project_with_audit();
        set_completeness(&dir, "planning", "90");
        auditflow(&dir)
            .args(["advance", "-p", "1", "--to", "findings"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("refresh"));
        auditflow(&dir)
            .args(["status", "-p", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Current phase: Planning"));

        auditflow(&dir)
            .args(["advance", "-p", "1", "--to", "execution"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Execution"));
    }

    #[test]
    fn test_retreat_to_expected_phase() {
        let dir = project_with_audit();
        set_completeness(&dir, "planning", "90");
        auditflow(&dir).args(["advance", "-p", "1"]).assert().success();

        auditflow(&dir)
            .args(["retreat", "-p", "1", "--to", "planning"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Planning"));
        // A repeated request finds the target already current.
        auditflow(&dir)
            .args(["retreat", "-p", "1", "--to", "planning"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Already in Planning"));
    }

    #[test]
    fn test_advance_to_unknown_phase() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["advance", "-p", "1", "--to", "closeout"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown phase 'closeout'"));
    }

    #[test]
    fn test_jump_requires_access() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["jump", "-p", "1", "follow_up"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not accessible"));

        set_completeness(&dir, "follow_up", "100");
        auditflow(&dir)
            .args(["jump", "-p", "1", "follow_up"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Follow-up"));

        auditflow(&dir)
            .args(["advance", "-p", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("last phase"));
    }

    #[test]
    fn test_jump_to_current_is_noop() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["jump", "-p", "1", "planning"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Already in Planning"));
    }

    #[test]
    fn test_jump_unknown_phase() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["jump", "-p", "1", "closeout"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown phase 'closeout'"));
    }

    #[test]
    fn test_completeness_out_of_range() {
        let dir = project_with_audit();
        auditflow(&dir)
            .args(["completeness", "set", "-p", "1", "planning", "101"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("between 0 and 100"));
        auditflow(&dir)
            .args(["completeness", "set", "-p", "1", "planning", "-5"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("between 0 and 100"));
    }

    #[test]
    fn test_custom_threshold_from_config() {
        let dir = project_with_audit();
        fs::write(
            dir.path().join(".auditflow/auditflow.toml"),
            "[workflow]\nadvance_threshold = 50\n",
        )
        .unwrap();
        set_completeness(&dir, "planning", "55");
        auditflow(&dir)
            .args(["advance", "-p", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Execution"));
    }

    #[test]
    fn test_db_flag_overrides_location() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("elsewhere.db");
        let db = db.to_str().unwrap();

        auditflow(&dir).args(["--db", db, "init"]).assert().success();
        assert!(dir.path().join("elsewhere.db").is_file());
        assert!(!dir.path().join(".auditflow/auditflow.db").exists());

        auditflow(&dir)
            .args(["--db", db, "project", "create", "Vendor audit"])
            .assert()
            .success();
        auditflow(&dir)
            .env("AUDITFLOW_DB", db)
            .args(["project", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Vendor audit"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("advance_threshold = 80"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created auditflow.toml"));
        assert!(dir.path().join(".auditflow/auditflow.toml").is_file());
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = TempDir::new().unwrap();
        auditflow(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".auditflow")).unwrap();
        fs::write(
            dir.path().join(".auditflow/auditflow.toml"),
            "[workflow]\nadvance_threshold = 0\n\n[phases.labels]\ncloseout = \"Close-out\"\n",
        )
        .unwrap();

        auditflow(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("advance_threshold"))
            .stdout(predicate::str::contains("closeout"));
    }

    #[test]
    fn test_bad_log_level_does_not_block_commands() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".auditflow")).unwrap();
        fs::write(
            dir.path().join(".auditflow/auditflow.toml"),
            "[logging]\nlevel = \"auditflow=loud\"\n",
        )
        .unwrap();

        auditflow(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Invalid logging.level"))
            .stderr(predicate::str::contains("auditflow=loud"));
        auditflow(&dir).arg("phases").assert().success();
    }

    #[test]
    fn test_labels_rename_phases() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".auditflow")).unwrap();
        fs::write(
            dir.path().join(".auditflow/auditflow.toml"),
            "[phases.labels]\nplanning = \"Scoping\"\n",
        )
        .unwrap();

        auditflow(&dir)
            .arg("phases")
            .assert()
            .success()
            .stdout(predicate::str::contains("Scoping"));
    }

    #[test]
    fn test_invalid_toml_fails() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".auditflow")).unwrap();
        fs::write(dir.path().join(".auditflow/auditflow.toml"), "[workflow\n").unwrap();

        auditflow(&dir)
            .arg("phases")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse auditflow.toml"));
    }
}
