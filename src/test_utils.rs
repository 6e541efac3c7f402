#[cfg(test)]
pub mod fixtures {
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;

    use chrono::{DateTime, Utc};

    use crate::engine::{ScanRun, ScanTrigger};
    use crate::rules::{AnalyzerKind, ScanFinding, Severity, ThreatCategory, finding_id};
    use crate::skill::{SkillFile, SkillFileType, SkillManifest, SkillPackage};

    pub fn create_finding(
        rule_id: &str,
        severity: Severity,
        file: Option<&str>,
        line: Option<usize>,
    ) -> ScanFinding {
        let mut finding = ScanFinding::new(
            finding_id(rule_id, &format!("{file:?}:{line:?}")),
            rule_id,
            ThreatCategory::DataExfiltration,
            severity,
            format!("{rule_id} title"),
            "detected issue",
            AnalyzerKind::Static,
        )
        .with_remediation("review the flagged code");
        finding.file_path = file.map(str::to_string);
        finding.line_number = line;
        finding
    }

    pub fn critical_exfil_finding() -> ScanFinding {
        create_finding(
            "BEHAVIOR_DATAFLOW_NETWORK",
            Severity::Critical,
            Some("scripts/sync.py"),
            Some(42),
        )
    }

    pub fn text_file(relative_path: &str, file_type: SkillFileType, content: &str) -> SkillFile {
        SkillFile {
            path: PathBuf::from("/skills/fixture").join(relative_path),
            relative_path: relative_path.to_string(),
            file_type,
            size_bytes: content.len() as u64,
            content: Some(content.to_string()),
        }
    }

    pub fn create_package(name: &str, files: Vec<SkillFile>) -> SkillPackage {
        SkillPackage {
            directory: PathBuf::from("/skills/fixture"),
            manifest: SkillManifest {
                name: name.to_string(),
                description: "Fixture skill".to_string(),
                license: None,
                compatibility: None,
                allowed_tools: Vec::new(),
                metadata: BTreeMap::new(),
                disable_model_invocation: false,
            },
            manifest_path: PathBuf::from("/skills/fixture/SKILL.md"),
            files,
            instruction_body: String::new(),
            referenced_files: BTreeSet::new(),
        }
    }

    pub fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-25T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    pub fn create_run(findings: Vec<ScanFinding>) -> ScanRun {
        ScanRun::new(ScanTrigger::Manual, fixed_time(), fixed_time(), 1, findings)
    }
}
