//! Parser for the YAML-like pattern rule format.
//!
//! The format is a flat list of records:
//!
//! ```yaml
//! - id: PROMPT_INJECTION_CONCEALMENT
//!   category: prompt_injection
//!   severity: HIGH
//!   patterns:
//!     - "(?i)keep\\s+this\\s+secret"
//!   exclude_patterns: ["(?i)example"]
//!   file_types: [markdown]
//!   description: "Attempts to conceal actions from the user"
//!   remediation: "Remove concealment instructions"
//! ```
//!
//! Parsing never fails. Records missing an id, a known category or severity,
//! or a description are dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Severity, ThreatCategory};
use crate::skill::SkillFileType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: String,
    pub category: ThreatCategory,
    pub severity: Severity,
    pub patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Empty means the rule applies to every file type.
    pub file_types: Vec<SkillFileType>,
    pub description: String,
    pub remediation: String,
}

impl PatternRule {
    pub fn applies_to(&self, file_type: SkillFileType) -> bool {
        self.file_types.is_empty() || self.file_types.contains(&file_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKey {
    Patterns,
    ExcludePatterns,
}

#[derive(Debug, Default)]
struct RawRecord {
    scalars: HashMap<String, String>,
    patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    file_types: Vec<String>,
}

impl RawRecord {
    fn is_empty(&self) -> bool {
        self.scalars.is_empty()
            && self.patterns.is_empty()
            && self.exclude_patterns.is_empty()
            && self.file_types.is_empty()
    }

    fn list_mut(&mut self, key: ListKey) -> &mut Vec<String> {
        match key {
            ListKey::Patterns => &mut self.patterns,
            ListKey::ExcludePatterns => &mut self.exclude_patterns,
        }
    }

    fn into_rule(self) -> Option<PatternRule> {
        let id = self.scalars.get("id").filter(|v| !v.is_empty())?.clone();

        let Some(category) = self.scalars.get("category").and_then(|v| ThreatCategory::parse(v))
        else {
            debug!(rule_id = %id, "Dropping pattern rule with unknown category");
            return None;
        };
        let Some(severity) = self.scalars.get("severity").and_then(|v| Severity::parse(v)) else {
            debug!(rule_id = %id, "Dropping pattern rule with unknown severity");
            return None;
        };
        let Some(description) = self.scalars.get("description").cloned() else {
            debug!(rule_id = %id, "Dropping pattern rule without description");
            return None;
        };

        Some(PatternRule {
            id,
            category,
            severity,
            patterns: self.patterns,
            exclude_patterns: self.exclude_patterns,
            file_types: self
                .file_types
                .iter()
                .filter_map(|t| SkillFileType::from_rule_name(t))
                .collect(),
            description,
            remediation: self.scalars.get("remediation").cloned().unwrap_or_default(),
        })
    }
}

/// Parse every well-formed record in `source`.
pub fn parse_pattern_rules(source: &str) -> Vec<PatternRule> {
    let mut records = Vec::new();
    let mut current = RawRecord::default();
    let mut list_key: Option<ListKey> = None;

    for raw_line in source.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with("- id:") {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            list_key = None;
            current
                .scalars
                .insert("id".to_string(), unquote(value_after_colon(line)));
            continue;
        }

        if let Some(item) = line.strip_prefix('-') {
            if let Some(key) = list_key {
                current.list_mut(key).push(unquote(item.trim()));
            }
            continue;
        }

        let Some((key, _)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value_after_colon(line);

        match key {
            "patterns" | "exclude_patterns" => {
                let target = if key == "patterns" {
                    ListKey::Patterns
                } else {
                    ListKey::ExcludePatterns
                };
                if value.starts_with('[') {
                    *current.list_mut(target) = parse_inline_list(value);
                    list_key = None;
                } else {
                    current.list_mut(target).clear();
                    list_key = Some(target);
                }
            }
            "file_types" => {
                current.file_types = parse_inline_list(value);
                list_key = None;
            }
            _ => {
                current.scalars.insert(key.to_string(), unquote(value));
                list_key = None;
            }
        }
    }

    if !current.is_empty() {
        records.push(current);
    }

    let rules: Vec<PatternRule> = records.into_iter().filter_map(RawRecord::into_rule).collect();
    debug!(count = rules.len(), "Parsed pattern rules");
    rules
}

fn value_after_colon(line: &str) -> &str {
    line.split_once(':').map(|(_, v)| v.trim()).unwrap_or("")
}

/// `[a, "b, c"]` to `["a", "b, c"]`. Commas inside quotes do not split.
fn parse_inline_list(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut buf = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in inner.chars() {
        if escaped {
            buf.push(c);
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some('"'), '\\') => {
                buf.push(c);
                escaped = true;
            }
            (Some(q), _) if c == q => {
                buf.push(c);
                quote = None;
            }
            (None, '"' | '\'') => {
                buf.push(c);
                quote = Some(c);
            }
            (None, ',') => items.push(std::mem::take(&mut buf)),
            _ => buf.push(c),
        }
    }
    items.push(buf);

    items
        .iter()
        .map(|item| unquote(item.trim()))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Strip matching quotes. Double-quoted values also resolve `\\` and `\"`.
fn unquote(value: &str) -> String {
    let v = value.trim();
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        return unescape_double_quoted(&v[1..v.len() - 1]);
    }
    if v.len() >= 2 && v.starts_with('\'') && v.ends_with('\'') {
        return v[1..v.len() - 1].replace("''", "'");
    }
    v.to_string()
}

fn unescape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && (next == '\\' || next == '"')
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}
