use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/skills")
}

/// Binary with user-level config and rule pack locations pointed away from
/// the real home directory.
fn cmd() -> assert_cmd::Command {
    let mut c = cargo_bin_cmd!("skill-audit");
    c.env("XDG_CONFIG_HOME", "/nonexistent/skill-audit/config")
        .env("XDG_DATA_HOME", "/nonexistent/skill-audit/data")
        .env_remove("RUST_LOG");
    c
}

fn json_output(args: &[&str], root: PathBuf) -> serde_json::Value {
    let output = cmd()
        .args(["--format", "json"])
        .args(args)
        .arg(root)
        .output()
        .unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

mod malicious_skills {
    use super::*;

    #[test]
    fn test_detect_prompt_injection_and_exfiltration() {
        cmd()
            .arg(fixtures_path().join("nefarious-skill"))
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains("PROMPT_INJECTION_IGNORE_INSTRUCTIONS"))
            .stdout(predicate::str::contains("PROMPT_INJECTION_CONCEALMENT"))
            .stdout(predicate::str::contains("BEHAVIOR_DATAFLOW_NETWORK"))
            .stdout(predicate::str::contains("CRITICAL"))
            .stdout(predicate::str::contains("FAIL"));
    }

    #[test]
    fn test_json_shape() {
        let parsed = json_output(&[], fixtures_path().join("nefarious-skill"));

        assert_eq!(parsed["trigger"], "manual");
        assert_eq!(parsed["skill_count"], 1);
        assert_eq!(parsed["max_severity"], "critical");
        assert!(parsed["id"].as_str().is_some());
        assert!(parsed["started_at"].as_str().is_some());
        assert!(parsed["duration_seconds"].as_f64().is_some());
        assert!(!parsed["summary"]["passed"].as_bool().unwrap());

        let findings = parsed["findings"].as_array().unwrap();
        assert_eq!(parsed["finding_count"], findings.len());
        assert_eq!(findings[0]["severity"], "critical");

        let network = findings
            .iter()
            .find(|f| f["rule_id"] == "BEHAVIOR_DATAFLOW_NETWORK")
            .unwrap();
        assert_eq!(network["file_path"], "scripts/steal.py");
        assert_eq!(network["line_number"], 5);
        assert_eq!(network["analyzer"], "behavioral");
        assert_eq!(network["category"], "data_exfiltration");
    }

    #[test]
    fn test_no_behavioral_flag() {
        let parsed = json_output(&["--no-behavioral"], fixtures_path().join("nefarious-skill"));
        let findings = parsed["findings"].as_array().unwrap();
        assert!(!findings.is_empty());
        assert!(findings.iter().all(|f| f["analyzer"] != "behavioral"));
    }

    #[test]
    fn test_trigger_flag() {
        let parsed = json_output(&["--trigger", "catch-up"], fixtures_path().join("nefarious-skill"));
        assert_eq!(parsed["trigger"], "catch_up");
    }
}

mod clean_skills {
    use super::*;

    #[test]
    fn test_safe_skill_passes() {
        cmd()
            .arg(fixtures_path().join("safe-helper"))
            .assert()
            .success()
            .stdout(predicate::str::contains("PASS"));
    }

    #[test]
    fn test_safe_skill_json() {
        let parsed = json_output(&[], fixtures_path().join("safe-helper"));
        assert_eq!(parsed["skill_count"], 1);
        assert_eq!(parsed["summary"]["high_or_critical"], 0);
        assert!(parsed["summary"]["passed"].as_bool().unwrap());
    }

    #[test]
    fn test_root_with_multiple_skills() {
        let parsed = json_output(&[], fixtures_path());
        assert_eq!(parsed["skill_count"], 2);
    }
}

mod suppressions {
    use super::*;

    #[test]
    fn test_suppressions_file_removes_findings() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("suppressions.yaml");
        fs::write(
            &file,
            "- rule_id: PROMPT_INJECTION_IGNORE_INSTRUCTIONS\n  reason: reviewed\n",
        )
        .unwrap();

        let parsed = json_output(
            &["--suppressions", file.to_str().unwrap()],
            fixtures_path().join("nefarious-skill"),
        );
        let findings = parsed["findings"].as_array().unwrap();
        assert!(
            findings
                .iter()
                .all(|f| f["rule_id"] != "PROMPT_INJECTION_IGNORE_INSTRUCTIONS")
        );
        assert!(
            findings
                .iter()
                .any(|f| f["rule_id"] == "PROMPT_INJECTION_CONCEALMENT")
        );
    }

    #[test]
    fn test_written_suppressions_silence_next_scan() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("accepted.yaml");

        cmd()
            .arg("--write-suppressions")
            .arg(&file)
            .arg(fixtures_path().join("nefarious-skill"))
            .assert()
            .code(1);
        assert!(fs::read_to_string(&file).unwrap().contains("expires_at"));

        cmd()
            .arg("--suppressions")
            .arg(&file)
            .arg(fixtures_path().join("nefarious-skill"))
            .assert()
            .success()
            .stdout(predicate::str::contains("PASS"));
    }

    #[test]
    fn test_malformed_suppressions_file_exits_2() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("suppressions.json");
        fs::write(&file, "{not json").unwrap();

        cmd()
            .arg("--suppressions")
            .arg(&file)
            .arg(fixtures_path().join("safe-helper"))
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Failed to parse suppressions file"));
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_unreadable_root_exits_2() {
        cmd()
            .args(["--format", "json", "/nonexistent/skill-audit/root"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("SCAN_FAILURE"))
            .stdout(predicate::str::contains("No readable roots selected."));
    }

    #[test]
    fn test_missing_config_exits_2() {
        cmd()
            .args(["--config", "/nonexistent/skill-audit.yaml"])
            .arg(fixtures_path())
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn test_invalid_trusted_key_exits_2() {
        cmd()
            .args(["--trusted-key", "not-a-key"])
            .arg(fixtures_path())
            .assert()
            .code(2);
    }

    #[test]
    fn test_invalid_format_rejected_by_clap() {
        cmd()
            .args(["--format", "sarif"])
            .arg(fixtures_path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }
}

mod output {
    use super::*;

    #[test]
    fn test_output_file() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("report.json");

        cmd()
            .args(["--format", "json", "--output"])
            .arg(&report)
            .arg(fixtures_path().join("safe-helper"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Output written to"));

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(parsed["skill_count"], 1);
    }

    #[test]
    fn test_version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("skill-audit"));
    }
}
