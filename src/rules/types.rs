use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Finding severity. Declared in ascending order so that `Ord` and `max` follow
/// `critical > high > medium > low > info > safe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Integer priority used for comparisons and max-reduction.
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Safe => 0,
            Severity::Info => 1,
            Severity::Low => 2,
            Severity::Medium => 3,
            Severity::High => 4,
            Severity::Critical => 5,
        }
    }

    /// Case-insensitive parse, `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "safe" => Some(Severity::Safe),
            "info" => Some(Severity::Info),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn is_high_signal(&self) -> bool {
        *self >= Severity::High
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    PromptInjection,
    CommandInjection,
    DataExfiltration,
    UnauthorizedToolUse,
    Obfuscation,
    HardcodedSecrets,
    SocialEngineering,
    ResourceAbuse,
    PolicyViolation,
    Malware,
    HarmfulContent,
    SkillDiscoveryAbuse,
    TransitiveTrustAbuse,
    AutonomyAbuse,
    ToolChainingAbuse,
    UnicodeSteganography,
}

impl ThreatCategory {
    pub const ALL: [ThreatCategory; 16] = [
        ThreatCategory::PromptInjection,
        ThreatCategory::CommandInjection,
        ThreatCategory::DataExfiltration,
        ThreatCategory::UnauthorizedToolUse,
        ThreatCategory::Obfuscation,
        ThreatCategory::HardcodedSecrets,
        ThreatCategory::SocialEngineering,
        ThreatCategory::ResourceAbuse,
        ThreatCategory::PolicyViolation,
        ThreatCategory::Malware,
        ThreatCategory::HarmfulContent,
        ThreatCategory::SkillDiscoveryAbuse,
        ThreatCategory::TransitiveTrustAbuse,
        ThreatCategory::AutonomyAbuse,
        ThreatCategory::ToolChainingAbuse,
        ThreatCategory::UnicodeSteganography,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::PromptInjection => "prompt_injection",
            ThreatCategory::CommandInjection => "command_injection",
            ThreatCategory::DataExfiltration => "data_exfiltration",
            ThreatCategory::UnauthorizedToolUse => "unauthorized_tool_use",
            ThreatCategory::Obfuscation => "obfuscation",
            ThreatCategory::HardcodedSecrets => "hardcoded_secrets",
            ThreatCategory::SocialEngineering => "social_engineering",
            ThreatCategory::ResourceAbuse => "resource_abuse",
            ThreatCategory::PolicyViolation => "policy_violation",
            ThreatCategory::Malware => "malware",
            ThreatCategory::HarmfulContent => "harmful_content",
            ThreatCategory::SkillDiscoveryAbuse => "skill_discovery_abuse",
            ThreatCategory::TransitiveTrustAbuse => "transitive_trust_abuse",
            ThreatCategory::AutonomyAbuse => "autonomy_abuse",
            ThreatCategory::ToolChainingAbuse => "tool_chaining_abuse",
            ThreatCategory::UnicodeSteganography => "unicode_steganography",
        }
    }

    /// Exact match on the snake_case name used in rule packs.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage that produced a finding or attached an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    Static,
    Behavioral,
    Meta,
    Engine,
}

impl AnalyzerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Static => "static",
            AnalyzerKind::Behavioral => "behavioral",
            AnalyzerKind::Meta => "meta",
            AnalyzerKind::Engine => "engine",
        }
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key/value note attached to a finding by one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub stage: AnalyzerKind,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFinding {
    pub id: String,
    pub rule_id: String,
    pub category: ThreatCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    pub analyzer: AnalyzerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl ScanFinding {
    pub fn new(
        id: impl Into<String>,
        rule_id: impl Into<String>,
        category: ThreatCategory,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        analyzer: AnalyzerKind,
    ) -> Self {
        Self {
            id: id.into(),
            rule_id: rule_id.into(),
            category,
            severity,
            title: title.into(),
            description: description.into(),
            file_path: None,
            line_number: None,
            snippet: None,
            remediation: None,
            analyzer,
            annotations: Vec::new(),
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line_number = Some(line);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Builder form of [`ScanFinding::annotate`] using the finding's own analyzer as stage.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let stage = self.analyzer;
        self.annotate(stage, key, value);
        self
    }

    /// Appends an annotation. Earlier annotations are kept so the trail of
    /// stages stays visible.
    pub fn annotate(&mut self, stage: AnalyzerKind, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.push(Annotation {
            stage,
            key: key.into(),
            value: value.into(),
        });
    }

    /// Latest value recorded for `key`, if any stage set it.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.annotations
            .iter()
            .rev()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Identity used for cross-analyzer deduplication.
    pub fn dedup_key(&self) -> (String, String, usize) {
        (
            self.rule_id.clone(),
            self.file_path.clone().unwrap_or_default(),
            self.line_number.unwrap_or(0),
        )
    }
}

/// Stable, content-derived finding id: `<prefix>_<12 hex chars of sha256("<prefix>:<context>")>`.
pub fn finding_id(prefix: &str, context: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{prefix}:{context}").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}_{}", prefix, &digest[..12])
}

/// Highest severity among `findings`, `Safe` when empty.
pub fn max_severity<'a>(findings: impl IntoIterator<Item = &'a ScanFinding>) -> Severity {
    findings
        .into_iter()
        .map(|f| f.severity)
        .fold(Severity::Safe, Severity::max)
}
