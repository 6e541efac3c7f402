//! skill-audit: security scanning for agent skill packages.
//!
//! A scan discovers directories containing `SKILL.md`, loads each one into a
//! [`SkillPackage`], runs the static rule matcher and the Python taint-flow
//! analyzer over it, and reconciles the results in a meta stage that applies
//! suppressions and false-positive filtering. The result is a [`ScanRun`].

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod reporter;
pub mod rules;
pub mod skill;
pub mod suppression;

#[cfg(test)]
pub mod test_utils;

pub use analyzer::{BehavioralAnalyzer, MetaAnalyzer, SkillAnalyzer, StaticAnalyzer};
pub use cli::{Cli, OutputFormat};
pub use config::{Config, ConfigError};
pub use engine::{
    Admission, ScanCoordinator, ScanEngine, ScanOptions, ScanPhase, ScanRun, ScanSummary,
    ScanTrigger,
};
pub use error::{AuditError, Result};
pub use reporter::{JsonReporter, Reporter, TerminalReporter};
pub use rules::{
    AnalyzerKind, LoadedRulePack, RulePackLoader, ScanFinding, Severity, ThreatCategory,
    TrustedKeys,
};
pub use skill::{SkillFile, SkillFileType, SkillLoader, SkillManifest, SkillPackage};
pub use suppression::FindingSuppression;
