//! Scan orchestration.
//!
//! [`ScanEngine`] drives one scan from discovery to the final [`ScanRun`]:
//! discover skill directories, load each package, run the static and
//! behavioral analyzers, then hand everything to the meta stage for
//! suppression and false-positive handling. [`ScanCoordinator`] serializes
//! scans requested by different triggers.

pub mod coordinator;
pub mod run;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub use coordinator::{Admission, ScanCoordinator};
pub use run::{ScanRun, ScanSummary, ScanTrigger};

use crate::analyzer::{BehavioralAnalyzer, MetaAnalyzer, SkillAnalyzer, StaticAnalyzer};
use crate::config::{Config, ConfigError};
use crate::rules::pack::{LoadedRulePack, RulePackLoader};
use crate::rules::{AnalyzerKind, ScanFinding, Severity, ThreatCategory, finding_id};
use crate::skill::{SkillLoadError, SkillLoader};
use crate::suppression::FindingSuppression;

pub const SCAN_FAILURE: &str = "SCAN_FAILURE";
pub const SKILL_LOAD_ERROR: &str = "SKILL_LOAD_ERROR";
pub const NO_READABLE_ROOTS: &str = "No readable roots selected.";

/// Lifecycle of a single scan. Each phase is entered at most once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Discovering,
    Analyzing { index: usize, total: usize },
    Refining,
    Completed,
}

/// Per-scan switches.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub behavioral: bool,
    pub meta_filtering: bool,
    pub suppressions: Vec<FindingSuppression>,
    /// Clock used for suppression expiry. `None` means now.
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            behavioral: true,
            meta_filtering: true,
            suppressions: Vec::new(),
            reference_time: None,
        }
    }
}

impl ScanOptions {
    pub fn with_behavioral(mut self, enabled: bool) -> Self {
        self.behavioral = enabled;
        self
    }

    pub fn with_meta_filtering(mut self, enabled: bool) -> Self {
        self.meta_filtering = enabled;
        self
    }

    pub fn with_suppressions(mut self, suppressions: Vec<FindingSuppression>) -> Self {
        self.suppressions = suppressions;
        self
    }

    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }
}

impl From<&Config> for ScanOptions {
    fn from(config: &Config) -> Self {
        Self {
            behavioral: config.scan.behavioral,
            meta_filtering: config.scan.meta_filtering,
            suppressions: config.suppressions.clone(),
            reference_time: None,
        }
    }
}

/// Holds compiled rules and analyzers. Rules are compiled once here and
/// shared read-only by every scan.
#[derive(Debug, Clone)]
pub struct ScanEngine {
    loader: SkillLoader,
    static_analyzer: StaticAnalyzer,
    behavioral: BehavioralAnalyzer,
    meta: MetaAnalyzer,
}

impl ScanEngine {
    pub fn new(pack: LoadedRulePack) -> Self {
        info!(
            source = %pack.source,
            warnings = pack.warnings.len(),
            "Initializing scan engine"
        );
        Self {
            loader: SkillLoader::new(),
            static_analyzer: StaticAnalyzer::from_pack(&pack),
            behavioral: BehavioralAnalyzer::new(),
            meta: MetaAnalyzer::new(),
        }
    }

    pub fn bundled() -> Self {
        Self::new(RulePackLoader::bundled_only().load())
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let loader = RulePackLoader::new(config.rule_pack.resolved_path(), config.trusted_keys()?);
        Ok(Self::new(loader.load()).with_max_file_size(config.scan.max_file_size_bytes()))
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.loader = self.loader.with_max_file_size(bytes);
        self
    }

    pub fn scan(&self, roots: &[PathBuf], trigger: ScanTrigger, options: &ScanOptions) -> ScanRun {
        self.scan_with_observer(roots, trigger, options, &mut |_| {})
    }

    /// Like [`ScanEngine::scan`], reporting each phase transition to `observer`.
    pub fn scan_with_observer(
        &self,
        roots: &[PathBuf],
        trigger: ScanTrigger,
        options: &ScanOptions,
        observer: &mut dyn FnMut(ScanPhase),
    ) -> ScanRun {
        observer(ScanPhase::Idle);
        let started_at = Utc::now();

        let readable: Vec<PathBuf> = roots.iter().filter(|r| is_readable_dir(r)).cloned().collect();
        if readable.is_empty() {
            warn!(roots = roots.len(), "No readable roots");
            let run = self.failed_run(trigger, NO_READABLE_ROOTS);
            observer(ScanPhase::Completed);
            return run;
        }

        observer(ScanPhase::Discovering);
        let directories = self.loader.discover(&readable);
        info!(trigger = %trigger, skills = directories.len(), "Scanning skills");

        let mut skill_count = 0;
        let mut findings = Vec::new();
        let total = directories.len();
        for (index, directory) in directories.iter().enumerate() {
            observer(ScanPhase::Analyzing { index, total });
            match self.loader.load(directory) {
                Ok(package) => {
                    skill_count += 1;
                    findings.extend(self.static_analyzer.analyze(&package));
                    if options.behavioral {
                        findings.extend(self.behavioral.analyze(&package));
                    }
                }
                Err(e) => {
                    warn!(path = %directory.display(), error = %e, "Failed to load skill");
                    findings.push(load_error_finding(directory, &e));
                }
            }
        }

        observer(ScanPhase::Refining);
        let now = options.reference_time.unwrap_or_else(Utc::now);
        let findings = self
            .meta
            .refine(findings, &options.suppressions, now, options.meta_filtering);

        let run = ScanRun::new(trigger, started_at, Utc::now(), skill_count, findings);
        debug!(
            run_id = %run.id,
            findings = run.finding_count,
            max_severity = %run.max_severity,
            "Scan complete"
        );
        observer(ScanPhase::Completed);
        run
    }

    /// A run that analyzed nothing, carrying one low `SCAN_FAILURE` finding.
    pub fn failed_run(&self, trigger: ScanTrigger, reason: &str) -> ScanRun {
        let now = Utc::now();
        let finding = ScanFinding::new(
            finding_id("SCAN_FAILURE", &format!("{trigger}:{reason}")),
            SCAN_FAILURE,
            ThreatCategory::PolicyViolation,
            Severity::Low,
            "Scan could not execute",
            reason,
            AnalyzerKind::Engine,
        )
        .with_remediation("Review settings and selected roots.")
        .with_annotation("trigger", trigger.as_str());
        ScanRun::new(trigger, now, now, 0, vec![finding])
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::bundled()
    }
}

fn is_readable_dir(path: &Path) -> bool {
    path.is_dir() && fs::read_dir(path).is_ok()
}

fn load_error_finding(directory: &Path, error: &SkillLoadError) -> ScanFinding {
    let path = directory.display().to_string();
    ScanFinding::new(
        finding_id("LOAD_ERROR", &path),
        SKILL_LOAD_ERROR,
        ThreatCategory::PolicyViolation,
        Severity::Low,
        "Failed to load skill",
        error.to_string(),
        AnalyzerKind::Engine,
    )
    .with_file(path)
}
