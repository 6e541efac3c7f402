use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::{SkillAnalyzer, dedupe_findings, sort_by_severity};
use crate::rules::matcher::{CompiledPatternRule, CompiledSignatureRule};
use crate::rules::{
    AnalyzerKind, LoadedRulePack, RuleSet, ScanFinding, Severity, ThreatCategory, finding_id,
};
use crate::skill::{SKILL_MANIFEST_FILE, SkillFile, SkillManifest, SkillPackage};

static SKILL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("SKILL_NAME: invalid regex"));

const MAX_NAME_CHARS: usize = 64;
const MAX_DESCRIPTION_CHARS: usize = 1024;

pub const RULE_PACK_INTEGRITY: &str = "RULE_PACK_INTEGRITY";
pub const RULE_PACK_PATH: &str = "rules/current";

/// Pattern and signature rules over file contents, plus manifest policy checks
/// and rule pack integrity warnings.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalyzer {
    rules: RuleSet,
    pack_warnings: Vec<String>,
}

impl StaticAnalyzer {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            pack_warnings: Vec::new(),
        }
    }

    pub fn from_pack(pack: &LoadedRulePack) -> Self {
        Self::new(pack.compile()).with_pack_warnings(pack.warnings.clone())
    }

    pub fn with_pack_warnings(mut self, warnings: Vec<String>) -> Self {
        self.pack_warnings = warnings;
        self
    }

    fn pattern_findings(rule: &CompiledPatternRule, file: &SkillFile, content: &str) -> Vec<ScanFinding> {
        let r = &rule.rule;
        rule.matches(file.file_type, content)
            .into_iter()
            .map(|hit| {
                let context = format!("{}:{}:{}", file.relative_path, hit.line, hit.pattern);
                ScanFinding::new(
                    finding_id(&r.id, &context),
                    &r.id,
                    r.category,
                    r.severity,
                    r.id.replace('_', " "),
                    &r.description,
                    AnalyzerKind::Static,
                )
                .with_file(&file.relative_path)
                .with_line(hit.line)
                .with_snippet(hit.snippet)
                .with_remediation(&r.remediation)
                .with_annotation("source", "yaml")
            })
            .collect()
    }

    fn signature_finding(
        rule: &CompiledSignatureRule,
        file: &SkillFile,
        content: &str,
    ) -> Option<ScanFinding> {
        let hit = rule.first_match(content)?;
        let r = &rule.rule;
        let rule_id = format!("YARA_{}", r.name);
        let (category, severity) = rule.classification();
        let description = if r.description.is_empty() {
            format!("YARA pattern matched for {}", r.name)
        } else {
            r.description.clone()
        };

        Some(
            ScanFinding::new(
                finding_id(&rule_id, &format!("{}:{}", file.relative_path, hit.line)),
                &rule_id,
                category,
                severity,
                format!("YARA: {}", r.name),
                description,
                AnalyzerKind::Static,
            )
            .with_file(&file.relative_path)
            .with_line(hit.line)
            .with_snippet(hit.snippet)
            .with_remediation("Review and remove malicious pattern")
            .with_annotation("source", "yara")
            .with_annotation("threat_type", &r.threat_type),
        )
    }

    fn manifest_findings(manifest: &SkillManifest) -> Vec<ScanFinding> {
        let mut findings = Vec::new();

        if manifest.name.chars().count() > MAX_NAME_CHARS || !SKILL_NAME.is_match(&manifest.name) {
            findings.push(
                ScanFinding::new(
                    finding_id("MANIFEST_INVALID_NAME", &manifest.name),
                    "MANIFEST_INVALID_NAME",
                    ThreatCategory::PolicyViolation,
                    Severity::Info,
                    "Skill name does not match expected format",
                    "Skill names should use lowercase letters, numbers, and hyphens only (max 64 chars).",
                    AnalyzerKind::Static,
                )
                .with_file(SKILL_MANIFEST_FILE),
            );
        }

        if manifest.description.chars().count() > MAX_DESCRIPTION_CHARS {
            findings.push(
                ScanFinding::new(
                    finding_id("MANIFEST_DESCRIPTION_TOO_LONG", &manifest.name),
                    "MANIFEST_DESCRIPTION_TOO_LONG",
                    ThreatCategory::PolicyViolation,
                    Severity::Low,
                    "Skill description too long",
                    "Description exceeds 1024 characters and should be reduced.",
                    AnalyzerKind::Static,
                )
                .with_file(SKILL_MANIFEST_FILE),
            );
        }

        findings
    }

    fn integrity_findings(&self) -> impl Iterator<Item = ScanFinding> + '_ {
        self.pack_warnings.iter().map(|warning| {
            ScanFinding::new(
                finding_id(RULE_PACK_INTEGRITY, warning),
                RULE_PACK_INTEGRITY,
                ThreatCategory::PolicyViolation,
                Severity::High,
                "Rule pack integrity check failed",
                warning,
                AnalyzerKind::Static,
            )
            .with_file(RULE_PACK_PATH)
            .with_remediation("Restore a signed rule pack with matching checksums.")
            .with_annotation("source", "rule-pack")
        })
    }
}

impl SkillAnalyzer for StaticAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Static
    }

    fn analyze(&self, package: &SkillPackage) -> Vec<ScanFinding> {
        let mut findings = Vec::new();

        for file in &package.files {
            let Some(content) = file.content.as_deref() else {
                continue;
            };
            trace!(file = %file.relative_path, rules = self.rules.len(), "Applying static rules");

            for rule in self.rules.pattern_rules() {
                findings.extend(Self::pattern_findings(rule, file, content));
            }
            for rule in self.rules.signature_rules() {
                findings.extend(Self::signature_finding(rule, file, content));
            }
        }

        findings.extend(Self::manifest_findings(&package.manifest));
        findings.extend(self.integrity_findings());

        let mut findings = dedupe_findings(findings);
        sort_by_severity(&mut findings);
        findings
    }
}
