use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::dedupe_findings;
use crate::rules::{AnalyzerKind, ScanFinding, Severity};
use crate::suppression::FindingSuppression;

pub const META_FALSE_POSITIVE: &str = "meta_false_positive";

const CONTEXT_MARKERS: &[&str] = &["example", "demo", "tutorial", "test"];

/// Cross-analyzer reconciliation: deduplication, user suppressions and
/// false-positive filtering.
#[derive(Debug, Clone, Default)]
pub struct MetaAnalyzer;

impl MetaAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Refines the raw findings of one run.
    ///
    /// Active suppressions are the only way a high or critical finding is
    /// removed. With `filter_false_positives`, findings below high that look
    /// like example or test material are dropped and every survivor is
    /// annotated `meta_false_positive = false`.
    pub fn refine(
        &self,
        findings: Vec<ScanFinding>,
        suppressions: &[FindingSuppression],
        now: DateTime<Utc>,
        filter_false_positives: bool,
    ) -> Vec<ScanFinding> {
        let total = findings.len();
        let mut refined: Vec<ScanFinding> = dedupe_findings(findings)
            .into_iter()
            .filter_map(|mut finding| {
                if let Some(suppression) = suppressions.iter().find(|s| s.matches(&finding, now)) {
                    trace!(
                        rule_id = %finding.rule_id,
                        suppression = %suppression.id,
                        "Finding suppressed"
                    );
                    return None;
                }

                if !filter_false_positives {
                    return Some(finding);
                }

                if finding.severity < Severity::High && is_suspicious_context(&finding) {
                    trace!(rule_id = %finding.rule_id, "Dropping finding in example context");
                    return None;
                }
                finding.annotate(AnalyzerKind::Meta, META_FALSE_POSITIVE, "false");
                Some(finding)
            })
            .collect();

        refined.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.line_number.cmp(&b.line_number))
        });

        debug!(input = total, output = refined.len(), "Meta refinement complete");
        refined
    }
}

fn is_suspicious_context(finding: &ScanFinding) -> bool {
    if finding.rule_id.contains("MANIFEST") {
        return true;
    }
    let text = [
        finding.title.as_str(),
        finding.description.as_str(),
        finding.snippet.as_deref().unwrap_or(""),
        finding.file_path.as_deref().unwrap_or(""),
    ]
    .join(" ")
    .to_lowercase();
    CONTEXT_MARKERS.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{create_finding, fixed_time};
    use chrono::Duration;

    fn refine(findings: Vec<ScanFinding>, suppressions: &[FindingSuppression]) -> Vec<ScanFinding> {
        MetaAnalyzer::new().refine(findings, suppressions, fixed_time(), true)
    }

    #[test]
    fn test_dedup_across_analyzers() {
        let mut behavioral = create_finding("R", Severity::Critical, Some("a.py"), Some(3));
        behavioral.analyzer = AnalyzerKind::Behavioral;
        let findings = vec![
            create_finding("R", Severity::Medium, Some("a.py"), Some(3)),
            behavioral,
        ];
        let refined = refine(findings, &[]);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].severity, Severity::Critical);
        assert_eq!(refined[0].analyzer, AnalyzerKind::Behavioral);
    }

    #[test]
    fn test_active_suppression_removes_critical() {
        let finding = create_finding("R", Severity::Critical, Some("a.py"), Some(1));
        let suppression = FindingSuppression::new("R", "accepted risk");
        assert!(refine(vec![finding], &[suppression]).is_empty());
    }

    #[test]
    fn test_expired_suppression_is_ignored() {
        let finding = create_finding("R", Severity::Critical, Some("a.py"), Some(1));
        let expired =
            FindingSuppression::new("R", "old").with_expiry(fixed_time() - Duration::hours(1));
        assert_eq!(refine(vec![finding], &[expired]).len(), 1);
    }

    #[test]
    fn test_path_scoped_suppression() {
        let a = create_finding("R", Severity::High, Some("a.py"), Some(1));
        let b = create_finding("R", Severity::High, Some("b.py"), Some(1));
        let suppression = FindingSuppression::new("R", "only a").with_file_path("a.py");
        let refined = refine(vec![a, b], &[suppression]);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].file_path.as_deref(), Some("b.py"));
    }

    #[test]
    fn test_low_severity_in_test_context_is_dropped() {
        let finding = create_finding("R", Severity::Medium, Some("tests/fixture.py"), Some(1));
        assert!(refine(vec![finding], &[]).is_empty());
    }

    #[test]
    fn test_manifest_rule_below_high_is_dropped() {
        let finding = create_finding("MANIFEST_INVALID_NAME", Severity::Info, Some("SKILL.md"), None);
        assert!(refine(vec![finding], &[]).is_empty());
    }

    #[test]
    fn test_high_signal_in_test_context_is_kept_unflagged() {
        for severity in [Severity::High, Severity::Critical] {
            let finding = create_finding("R", severity, Some("tests/demo.py"), Some(1));
            let refined = refine(vec![finding], &[]);
            assert_eq!(refined.len(), 1);
            assert_eq!(refined[0].metadata(META_FALSE_POSITIVE), Some("false"));
            assert_eq!(refined[0].metadata("meta_reason"), None);
            assert_eq!(refined[0].annotations.last().unwrap().stage, AnalyzerKind::Meta);
        }
    }

    #[test]
    fn test_high_signal_manifest_rule_is_kept() {
        let finding = create_finding("MANIFEST_SOMETHING", Severity::High, Some("SKILL.md"), None);
        let refined = refine(vec![finding], &[]);
        assert_eq!(refined[0].metadata(META_FALSE_POSITIVE), Some("false"));
    }

    #[test]
    fn test_clean_finding_annotated_false() {
        let finding = create_finding("R", Severity::Low, Some("scripts/sync.py"), Some(1));
        let refined = refine(vec![finding], &[]);
        assert_eq!(refined[0].metadata(META_FALSE_POSITIVE), Some("false"));
        assert_eq!(refined[0].metadata("meta_reason"), None);
    }

    #[test]
    fn test_without_filtering_no_annotations() {
        let finding = create_finding("MANIFEST_INVALID_NAME", Severity::Info, Some("SKILL.md"), None);
        let refined = MetaAnalyzer::new().refine(vec![finding], &[], fixed_time(), false);
        assert_eq!(refined.len(), 1);
        assert!(refined[0].annotations.is_empty());
    }

    #[test]
    fn test_output_order() {
        let findings = vec![
            create_finding("B", Severity::Low, Some("z.py"), Some(1)),
            create_finding("A", Severity::Low, Some("z.py"), Some(9)),
            create_finding("A", Severity::Low, Some("z.py"), Some(2)),
            create_finding("A", Severity::Low, Some("y.py"), Some(5)),
            create_finding("C", Severity::Critical, Some("x.py"), Some(1)),
        ];
        let refined = refine(findings, &[]);
        let keys: Vec<(String, Option<String>, Option<usize>)> = refined
            .iter()
            .map(|f| (f.rule_id.clone(), f.file_path.clone(), f.line_number))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("C".to_string(), Some("x.py".to_string()), Some(1)),
                ("A".to_string(), Some("y.py".to_string()), Some(5)),
                ("A".to_string(), Some("z.py".to_string()), Some(2)),
                ("A".to_string(), Some("z.py".to_string()), Some(9)),
                ("B".to_string(), Some("z.py".to_string()), Some(1)),
            ]
        );
    }
}
