use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuditError, Result};
use crate::rules::ScanFinding;

/// Default lifetime of a suppression created from a finding.
pub const DEFAULT_SUPPRESSION_DAYS: i64 = 7;

/// A user override that mutes findings of one rule, optionally scoped to a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingSuppression {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl FindingSuppression {
    pub fn new(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule_id.into(),
            file_path: None,
            reason: reason.into(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Suppression scoped to `finding`'s rule and path, expiring `days` after `now`.
    pub fn for_finding(
        finding: &ScanFinding,
        days: i64,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: finding.rule_id.clone(),
            file_path: finding.file_path.clone(),
            reason: reason.into(),
            created_at: now,
            expires_at: Some(now + Duration::days(days)),
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }

    pub fn matches(&self, finding: &ScanFinding, now: DateTime<Utc>) -> bool {
        if !self.is_active(now) || self.rule_id != finding.rule_id {
            return false;
        }
        match &self.file_path {
            None => true,
            Some(path) => finding.file_path.as_deref() == Some(path.as_str()),
        }
    }
}

/// Suppressions still in force at `now`.
pub fn active_suppressions(
    suppressions: &[FindingSuppression],
    now: DateTime<Utc>,
) -> Vec<FindingSuppression> {
    suppressions
        .iter()
        .filter(|s| s.is_active(now))
        .cloned()
        .collect()
}

/// Reads a JSON or YAML list of suppressions.
pub fn load_suppressions(path: &Path) -> Result<Vec<FindingSuppression>> {
    let content = fs::read_to_string(path).map_err(|e| AuditError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        _ => serde_json::from_str(&content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| AuditError::SuppressionParse {
        path: path.display().to_string(),
        message,
    })
}

/// Writes suppressions as YAML for `.yaml`/`.yml` paths, JSON otherwise.
pub fn save_suppressions(path: &Path, suppressions: &[FindingSuppression]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let serialized = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::to_string(suppressions).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(suppressions).map_err(|e| e.to_string()),
    }
    .map_err(|message| AuditError::SuppressionParse {
        path: path.display().to_string(),
        message,
    })?;

    fs::write(path, serialized).map_err(|e| AuditError::WriteError {
        path: path.display().to_string(),
        source: e,
    })
}
