use regex::Regex;
use tracing::warn;

use super::pattern::PatternRule;
use super::signature::SignatureRule;
use super::types::{Severity, ThreatCategory};
use crate::skill::SkillFileType;

/// Where a pattern first matched inside a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchLocation {
    /// 1-based line of the match start.
    pub line: usize,
    /// The trimmed text of that line.
    pub snippet: String,
    pub pattern: String,
}

/// First match of `regex` in `content` with its line and snippet.
pub fn first_match(regex: &Regex, content: &str) -> Option<MatchLocation> {
    let m = regex.find(content)?;
    let line = content[..m.start()].matches('\n').count() + 1;
    let line_start = content[..m.start()].rfind('\n').map_or(0, |i| i + 1);
    let line_end = content[m.end()..]
        .find('\n')
        .map_or(content.len(), |i| m.end() + i);
    Some(MatchLocation {
        line,
        snippet: content[line_start..line_end].trim().to_string(),
        pattern: regex.as_str().to_string(),
    })
}

fn compile_all(owner: &str, patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(rule = owner, pattern = %pattern, error = %e, "Dropping invalid rule pattern");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CompiledPatternRule {
    pub rule: PatternRule,
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl CompiledPatternRule {
    pub fn compile(rule: PatternRule) -> Option<Self> {
        let includes = compile_all(&rule.id, &rule.patterns);
        let excludes = compile_all(&rule.id, &rule.exclude_patterns);
        if includes.is_empty() {
            warn!(rule = %rule.id, "Pattern rule has no usable patterns");
            return None;
        }
        Some(Self {
            rule,
            includes,
            excludes,
        })
    }

    /// One location per include pattern that matches, or nothing when an
    /// exclude pattern matches anywhere in `content`.
    pub fn matches(&self, file_type: SkillFileType, content: &str) -> Vec<MatchLocation> {
        if !self.rule.applies_to(file_type) || self.excludes.iter().any(|r| r.is_match(content)) {
            return Vec::new();
        }
        self.includes
            .iter()
            .filter_map(|regex| first_match(regex, content))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledSignatureRule {
    pub rule: SignatureRule,
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl CompiledSignatureRule {
    pub fn compile(rule: SignatureRule) -> Option<Self> {
        let includes = compile_all(&rule.name, &rule.include_patterns);
        let excludes = compile_all(&rule.name, &rule.exclude_patterns);
        if includes.is_empty() {
            warn!(rule = %rule.name, "Signature rule has no usable patterns");
            return None;
        }
        Some(Self {
            rule,
            includes,
            excludes,
        })
    }

    /// First include pattern in declared order that matches, unless excluded.
    pub fn first_match(&self, content: &str) -> Option<MatchLocation> {
        if self.excludes.iter().any(|r| r.is_match(content)) {
            return None;
        }
        self.includes.iter().find_map(|regex| first_match(regex, content))
    }

    /// Category and severity derived from the free-form threat type label.
    pub fn classification(&self) -> (ThreatCategory, Severity) {
        classify_threat_type(&self.rule.threat_type)
    }
}

pub fn classify_threat_type(threat_type: &str) -> (ThreatCategory, Severity) {
    let upper = threat_type.to_uppercase();
    if upper.contains("PROMPT") {
        (ThreatCategory::PromptInjection, Severity::High)
    } else if upper.contains("CREDENTIAL") {
        (ThreatCategory::DataExfiltration, Severity::Critical)
    } else if upper.contains("CODE") {
        (ThreatCategory::CommandInjection, Severity::Critical)
    } else {
        (ThreatCategory::PolicyViolation, Severity::Medium)
    }
}

#[derive(Debug, Clone)]
pub enum CompiledRule {
    Pattern(CompiledPatternRule),
    Signature(CompiledSignatureRule),
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        match self {
            CompiledRule::Pattern(r) => &r.rule.id,
            CompiledRule::Signature(r) => &r.rule.name,
        }
    }
}

/// Rules compiled once and shared read-only by every scan.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(patterns: Vec<PatternRule>, signatures: Vec<SignatureRule>) -> Self {
        let rules = patterns
            .into_iter()
            .filter_map(CompiledPatternRule::compile)
            .map(CompiledRule::Pattern)
            .chain(
                signatures
                    .into_iter()
                    .filter_map(CompiledSignatureRule::compile)
                    .map(CompiledRule::Signature),
            )
            .collect();
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn pattern_rules(&self) -> impl Iterator<Item = &CompiledPatternRule> {
        self.rules.iter().filter_map(|r| match r {
            CompiledRule::Pattern(p) => Some(p),
            CompiledRule::Signature(_) => None,
        })
    }

    pub fn signature_rules(&self) -> impl Iterator<Item = &CompiledSignatureRule> {
        self.rules.iter().filter_map(|r| match r {
            CompiledRule::Signature(s) => Some(s),
            CompiledRule::Pattern(_) => None,
        })
    }
}
