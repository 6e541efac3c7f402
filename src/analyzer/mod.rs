//! Detectors that turn a loaded [`SkillPackage`] into findings, and the meta
//! stage that reconciles their output.

pub mod behavioral;
pub mod meta;
pub mod static_rules;

use std::collections::HashMap;

pub use behavioral::BehavioralAnalyzer;
pub use meta::MetaAnalyzer;
pub use static_rules::StaticAnalyzer;

use crate::rules::{AnalyzerKind, ScanFinding};
use crate::skill::SkillPackage;

/// A per-package detector.
pub trait SkillAnalyzer {
    fn kind(&self) -> AnalyzerKind;

    fn analyze(&self, package: &SkillPackage) -> Vec<ScanFinding>;
}

/// One finding per `(rule_id, file_path, line)`. The highest severity wins and
/// the first seen finding wins ties. Output keeps first-seen order.
pub fn dedupe_findings(findings: Vec<ScanFinding>) -> Vec<ScanFinding> {
    let mut index: HashMap<(String, String, usize), usize> = HashMap::new();
    let mut kept: Vec<ScanFinding> = Vec::with_capacity(findings.len());

    for finding in findings {
        match index.get(&finding.dedup_key()) {
            Some(&slot) => {
                if finding.severity > kept[slot].severity {
                    kept[slot] = finding;
                }
            }
            None => {
                index.insert(finding.dedup_key(), kept.len());
                kept.push(finding);
            }
        }
    }
    kept
}

/// Severity descending, then rule id.
pub fn sort_by_severity(findings: &mut [ScanFinding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
}
