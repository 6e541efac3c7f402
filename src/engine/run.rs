use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rules::{ScanFinding, Severity, max_severity};

/// What started a scan. Higher priority wins the coordinator's pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTrigger {
    Manual,
    CatchUp,
    Scheduled,
}

impl ScanTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanTrigger::Manual => "manual",
            ScanTrigger::CatchUp => "catch_up",
            ScanTrigger::Scheduled => "scheduled",
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            ScanTrigger::Manual => 3,
            ScanTrigger::CatchUp => 2,
            ScanTrigger::Scheduled => 1,
        }
    }

    /// Accepts both `catch_up` and `catch-up`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "manual" => Some(ScanTrigger::Manual),
            "catch_up" => Some(ScanTrigger::CatchUp),
            "scheduled" => Some(ScanTrigger::Scheduled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The record of one completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    pub id: Uuid,
    pub trigger: ScanTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub skill_count: usize,
    pub finding_count: usize,
    pub max_severity: Severity,
    pub findings: Vec<ScanFinding>,
}

impl ScanRun {
    pub fn new(
        trigger: ScanTrigger,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        skill_count: usize,
        findings: Vec<ScanFinding>,
    ) -> Self {
        let duration_seconds = (finished_at - started_at)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or(0.0)
            .max(0.0);

        Self {
            id: Uuid::new_v4(),
            trigger,
            started_at,
            finished_at,
            duration_seconds,
            skill_count,
            finding_count: findings.len(),
            max_severity: max_severity(&findings),
            findings,
        }
    }

    pub fn high_or_critical_count(&self) -> usize {
        self.high_signal_findings().count()
    }

    pub fn high_signal_findings(&self) -> impl Iterator<Item = &ScanFinding> {
        self.findings.iter().filter(|f| f.severity.is_high_signal())
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary::from_run(self)
    }
}

/// Per-severity counts for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub run_id: Uuid,
    pub trigger: ScanTrigger,
    pub max_severity: Severity,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub high_or_critical: usize,
    pub finding_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub passed: bool,
}

impl ScanSummary {
    pub fn from_run(run: &ScanRun) -> Self {
        let (critical, high, medium, low, info) =
            run.findings
                .iter()
                .fold((0, 0, 0, 0, 0), |(c, h, m, l, i), f| match f.severity {
                    Severity::Critical => (c + 1, h, m, l, i),
                    Severity::High => (c, h + 1, m, l, i),
                    Severity::Medium => (c, h, m + 1, l, i),
                    Severity::Low => (c, h, m, l + 1, i),
                    Severity::Info => (c, h, m, l, i + 1),
                    Severity::Safe => (c, h, m, l, i),
                });

        Self {
            run_id: run.id,
            trigger: run.trigger,
            max_severity: run.max_severity,
            critical,
            high,
            medium,
            low,
            info,
            high_or_critical: critical + high,
            finding_count: run.finding_count,
            started_at: run.started_at,
            finished_at: run.finished_at,
            passed: critical == 0 && high == 0,
        }
    }
}
