//! Line-level taint tracking over Python scripts.
//!
//! Each file is read top to bottom with a running set of tainted variables.
//! An assignment whose right-hand side reads a sensitive source (environment,
//! credential files) taints its target; a bare `a = b` copies taint from `b`.
//! Network and process sinks fire only when the line mentions a tainted name,
//! matched as a plain substring. `eval`/`exec` also fire on `input(` or
//! `request` text. No AST is built.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::{SkillAnalyzer, dedupe_findings};
use crate::rules::{AnalyzerKind, ScanFinding, Severity, ThreatCategory, finding_id};
use crate::skill::{SkillFileType, SkillPackage};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("behavioral pattern: invalid regex"))
        .collect()
}

static SOURCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bos\.environ\b",
        r"\bos\.getenv\s*\(",
        r"\bgetenv\s*\(",
        r"\bopen\s*\([^)]*(\.aws/credentials|\.ssh/id_rsa|\.ssh/id_dsa|/etc/passwd|/etc/shadow)",
    ])
});

static NETWORK_SINKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\brequests\.(post|put|get|delete)\s*\(",
        r"\bhttpx\.(post|put|get|delete)\s*\(",
        r"\burllib\.request\.urlopen\s*\(",
        r"\bsocket\.(create_connection|socket)\s*\(",
    ])
});

static EXEC_SINKS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"\bos\.system\s*\(", r"\bsubprocess\.(run|call|Popen)\s*\("]));

static DYNAMIC_EXEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(eval|exec)\s*\(").expect("DYNAMIC_EXEC: invalid regex"));

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=(?:[^=]|$)").expect("ASSIGNMENT: invalid regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("IDENTIFIER: invalid regex"));

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[A-Za-z0-9._\-/]+").expect("URL: invalid regex"));

/// Hosts and services commonly used as exfiltration drops.
pub const SUSPICIOUS_DOMAINS: &[&str] = &[
    "pastebin.com",
    "transfer.sh",
    "webhook.site",
    "attacker.example.com",
    "evil.example.com",
    "ngrok.io",
    "pipedream.net",
    "requestbin",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkKind {
    Network,
    Exec,
    DynamicExecution,
}

#[derive(Debug, Clone)]
struct SinkEvent {
    kind: SinkKind,
    line: usize,
    snippet: String,
}

/// Result of tracking one Python file.
#[derive(Debug, Default)]
struct FlowAnalysis {
    /// Tainted variable to the line of the source that tainted it.
    tainted: BTreeMap<String, usize>,
    sinks: Vec<SinkEvent>,
}

impl FlowAnalysis {
    fn run(content: &str) -> Self {
        let mut flow = Self::default();

        for (index, raw_line) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = ASSIGNMENT.captures(line) {
                let target = &caps[1];
                if any_match(&SOURCE_PATTERNS, line) {
                    flow.tainted.insert(target.to_string(), line_number);
                } else if let Some(source) = propagated_from(line)
                    && source != target
                    && let Some(&source_line) = flow.tainted.get(source)
                {
                    flow.tainted.insert(target.to_string(), source_line);
                }
            }

            let tainted = flow.mentions_tainted(line);
            if tainted && any_match(&NETWORK_SINKS, line) {
                flow.push_sink(SinkKind::Network, line_number, line);
            }
            if tainted && any_match(&EXEC_SINKS, line) {
                flow.push_sink(SinkKind::Exec, line_number, line);
            }
            if DYNAMIC_EXEC.is_match(line)
                && (tainted || line.contains("input(") || line.contains("request"))
            {
                flow.push_sink(SinkKind::DynamicExecution, line_number, line);
            }
        }

        flow
    }

    fn mentions_tainted(&self, line: &str) -> bool {
        self.tainted.keys().any(|name| line.contains(name.as_str()))
    }

    fn push_sink(&mut self, kind: SinkKind, line: usize, snippet: &str) {
        self.sinks.push(SinkEvent {
            kind,
            line,
            snippet: snippet.to_string(),
        });
    }

    fn findings(&self, file_path: &str) -> Vec<ScanFinding> {
        let mut out = Vec::new();

        if !self.tainted.is_empty() {
            let listing = self
                .tainted
                .iter()
                .map(|(name, line)| format!("{name}:{line}"))
                .collect::<Vec<_>>()
                .join(",");
            out.push(
                ScanFinding::new(
                    finding_id("BEHAVIOR_TAINT_SOURCES", file_path),
                    "BEHAVIOR_TAINT_SOURCES",
                    ThreatCategory::DataExfiltration,
                    Severity::Medium,
                    "Sensitive source values detected",
                    "Found potential credential/environment data sources that may flow to sinks.",
                    AnalyzerKind::Behavioral,
                )
                .with_file(file_path)
                .with_annotation("tainted_var_count", self.tainted.len().to_string())
                .with_annotation("tainted_vars", listing),
            );
        }

        for sink in &self.sinks {
            let (rule_id, category, severity, title, description, remediation) = match sink.kind {
                SinkKind::Network => (
                    "BEHAVIOR_DATAFLOW_NETWORK",
                    ThreatCategory::DataExfiltration,
                    Severity::Critical,
                    "Tainted data reaches network sink",
                    "Potential exfiltration path: sensitive source value flows into outbound network call.",
                    "Sanitize data and restrict outbound requests.",
                ),
                SinkKind::Exec => (
                    "BEHAVIOR_DATAFLOW_EXEC",
                    ThreatCategory::CommandInjection,
                    Severity::High,
                    "Tainted data reaches process execution sink",
                    "Potential command injection path via subprocess or shell execution.",
                    "Use strict argument arrays and validate/escape untrusted input.",
                ),
                SinkKind::DynamicExecution => (
                    "BEHAVIOR_DYNAMIC_EXEC",
                    ThreatCategory::CommandInjection,
                    Severity::Critical,
                    "Dynamic execution on untrusted input",
                    "eval/exec appears to execute tainted or user-controlled input.",
                    "Remove dynamic execution and replace with explicit safe logic.",
                ),
            };
            out.push(
                ScanFinding::new(
                    finding_id(rule_id, &format!("{file_path}:{}", sink.line)),
                    rule_id,
                    category,
                    severity,
                    title,
                    description,
                    AnalyzerKind::Behavioral,
                )
                .with_file(file_path)
                .with_line(sink.line)
                .with_snippet(&sink.snippet)
                .with_remediation(remediation),
            );
        }

        out
    }
}

fn any_match(patterns: &[Regex], line: &str) -> bool {
    patterns.iter().any(|r| r.is_match(line))
}

/// `b` in `a = b`, when the right-hand side is a bare identifier.
fn propagated_from(line: &str) -> Option<&str> {
    let (_, rhs) = line.split_once('=')?;
    let rhs = rhs.trim();
    IDENTIFIER.is_match(rhs).then_some(rhs)
}

/// Unique denylisted URLs with the line of their first occurrence, sorted by URL.
fn suspicious_urls(content: &str) -> BTreeMap<String, usize> {
    let mut hits = BTreeMap::new();
    for m in URL.find_iter(content) {
        let url = m.as_str();
        let lower = url.to_lowercase();
        if hits.contains_key(url) || !SUSPICIOUS_DOMAINS.iter().any(|d| lower.contains(d)) {
            continue;
        }
        let line = content[..m.start()].matches('\n').count() + 1;
        hits.insert(url.to_string(), line);
    }
    hits
}

#[derive(Debug, Clone, Default)]
pub struct BehavioralAnalyzer;

impl BehavioralAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Findings for a single Python source, attributed to `file_path`.
    pub fn analyze_source(&self, file_path: &str, content: &str) -> Vec<ScanFinding> {
        let flow = FlowAnalysis::run(content);
        trace!(
            file = file_path,
            tainted = flow.tainted.len(),
            sinks = flow.sinks.len(),
            "Tracked python taint flow"
        );

        let mut findings = flow.findings(file_path);
        for (url, line) in suspicious_urls(content) {
            findings.push(
                ScanFinding::new(
                    finding_id("BEHAVIOR_SUSPICIOUS_URL", &format!("{file_path}:{url}")),
                    "BEHAVIOR_SUSPICIOUS_URL",
                    ThreatCategory::DataExfiltration,
                    Severity::High,
                    "Suspicious URL detected",
                    format!("Script references suspicious endpoint: {url}"),
                    AnalyzerKind::Behavioral,
                )
                .with_file(file_path)
                .with_line(line)
                .with_remediation("Verify endpoint legitimacy and intended usage.")
                .with_annotation("url", url),
            );
        }
        findings
    }

    /// Names currently considered tainted after reading `content`, for diagnostics.
    pub fn tainted_variables(&self, content: &str) -> BTreeSet<String> {
        FlowAnalysis::run(content).tainted.into_keys().collect()
    }
}

impl SkillAnalyzer for BehavioralAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Behavioral
    }

    fn analyze(&self, package: &SkillPackage) -> Vec<ScanFinding> {
        let findings = package
            .files
            .iter()
            .filter(|f| f.file_type == SkillFileType::Python)
            .filter_map(|f| {
                f.content
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .map(|c| self.analyze_source(&f.relative_path, c))
            })
            .flatten()
            .collect();
        dedupe_findings(findings)
    }
}
