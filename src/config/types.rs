//! Configuration type definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::suppression::FindingSuppression;

/// Main configuration structure for skill-audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Analyzer toggles and loader limits.
    pub scan: ScanConfig,
    /// External rule pack location and trust anchors.
    pub rule_pack: RulePackConfig,
    /// Suppressions applied during meta refinement.
    pub suppressions: Vec<FindingSuppression>,
}

/// Scan configuration (corresponds to CLI options).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Run the taint-flow analyzer over Python scripts.
    pub behavioral: bool,
    /// Drop or flag findings in example/test/demo context.
    pub meta_filtering: bool,
    /// Files larger than this are listed without content.
    pub max_file_size_mb: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            behavioral: true,
            meta_filtering: true,
            max_file_size_mb: 10,
        }
    }
}

impl ScanConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Rule pack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePackConfig {
    /// Pack directory. Defaults to `<data dir>/skill-audit/rules/current`.
    pub path: Option<PathBuf>,
    /// Base64-encoded Ed25519 public keys. Empty means the bundled key.
    pub trusted_keys: Vec<String>,
}

impl RulePackConfig {
    /// Directory the loader should inspect, if one can be resolved.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("skill-audit").join("rules").join("current")))
    }
}
