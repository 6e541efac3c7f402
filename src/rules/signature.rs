//! Parser for YARA-like signature rules.
//!
//! Only the subset needed for text matching is understood: the rule name,
//! `description` and `threat_type` meta strings, and `$identifier = /regex/flags`
//! string definitions. Conditions are not evaluated; identifiers that mention
//! `legitimate`, `documentation` or `ignore` act as exclusions.

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const UNKNOWN_THREAT_TYPE: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRule {
    pub name: String,
    pub threat_type: String,
    pub description: String,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

/// Parse every rule in `source` that has a name and at least one include pattern.
///
/// A rule starts at a line beginning with `rule ` in the first column and runs
/// until the next such line. Indented `rule ` lines stay in the current rule.
/// Chunks without both `{` and `}` are skipped.
pub fn parse_signature_rules(source: &str) -> Vec<SignatureRule> {
    let mut chunks: Vec<Vec<&str>> = Vec::new();
    for line in source.lines() {
        if line.starts_with("rule ") {
            chunks.push(Vec::new());
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push(line);
        }
    }

    let rules: Vec<SignatureRule> = chunks
        .iter()
        .filter(|lines| has_braces(lines))
        .filter_map(|lines| parse_rule(lines))
        .collect();
    debug!(count = rules.len(), "Parsed signature rules");
    rules
}

fn parse_rule(lines: &[&str]) -> Option<SignatureRule> {
    let mut name: Option<String> = None;
    let mut threat_type = UNKNOWN_THREAT_TYPE.to_string();
    let mut description = String::new();
    let mut include_patterns = Vec::new();
    let mut exclude_patterns = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("rule ") {
            let head = rest.split_whitespace().next().unwrap_or("");
            let head = head.replace('{', "");
            if !head.is_empty() {
                name = Some(head);
            }
            continue;
        }

        if !trimmed.starts_with('$') {
            if trimmed.contains("threat_type")
                && let Some(value) = quoted_value(trimmed)
            {
                threat_type = value.to_string();
            } else if trimmed.contains("description")
                && let Some(value) = quoted_value(trimmed)
            {
                description = value.to_string();
            }
            continue;
        }

        let Some(pattern) = regex_literal(trimmed) else {
            continue;
        };
        let identifier = trimmed.split('=').next().unwrap_or("").trim().to_lowercase();
        if is_exclusion_identifier(&identifier) {
            exclude_patterns.push(pattern);
        } else {
            include_patterns.push(pattern);
        }
    }

    let name = name?;
    if include_patterns.is_empty() {
        debug!(rule = %name, "Dropping signature rule without include patterns");
        return None;
    }

    Some(SignatureRule {
        name,
        threat_type,
        description,
        include_patterns,
        exclude_patterns,
    })
}

fn has_braces(lines: &[&str]) -> bool {
    lines.iter().any(|l| l.contains('{')) && lines.iter().any(|l| l.contains('}'))
}

fn is_exclusion_identifier(identifier: &str) -> bool {
    ["legitimate", "documentation", "ignore"]
        .iter()
        .any(|marker| identifier.contains(marker))
}

/// Text between the first and last double quote.
fn quoted_value(line: &str) -> Option<&str> {
    let first = line.find('"')?;
    let last = line.rfind('"')?;
    (first < last).then(|| &line[first + 1..last])
}

/// Body between the first and last `/`, with `\/` unescaped and a trailing
/// `i` flag turned into an inline `(?i)`.
fn regex_literal(line: &str) -> Option<String> {
    let first = line.find('/')?;
    let last = line.rfind('/')?;
    if first >= last {
        return None;
    }
    let body = line[first + 1..last].replace(r"\/", "/");
    let flags = &line[last + 1..];
    if flags.trim().contains('i') {
        Some(format!("(?i){body}"))
    } else {
        Some(body)
    }
}
