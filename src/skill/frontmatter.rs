//! Front matter extraction and the line-oriented manifest scan.

use std::collections::{BTreeMap, HashMap};

use super::{SkillLoadError, SkillManifest};

/// Splits `SKILL.md` into front matter and instruction body and reads the
/// manifest fields out of the front matter.
pub struct FrontmatterParser;

impl FrontmatterParser {
    /// Front matter text and the trimmed body after the closing marker.
    ///
    /// The document must open with a `---` line; the block ends at the next
    /// `\n---`.
    pub fn split(content: &str) -> Option<(&str, &str)> {
        if !content.starts_with("---\n") && !content.starts_with("---\r\n") {
            return None;
        }
        let marker = "\n---";
        let end = content[3..].find(marker)? + 3;
        let front = content.get(4..end).unwrap_or("");
        let body = content[end + marker.len()..].trim();
        Some((front, body))
    }

    pub fn parse_manifest(front_matter: &str) -> Result<SkillManifest, SkillLoadError> {
        let mut values: HashMap<String, String> = HashMap::new();
        let mut allowed_tools: Vec<String> = Vec::new();
        let mut metadata: BTreeMap<String, String> = BTreeMap::new();
        let mut in_metadata = false;

        for raw_line in front_matter.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with("metadata:") {
                in_metadata = true;
                continue;
            }

            if in_metadata && line.starts_with('-') {
                continue;
            }

            if in_metadata
                && raw_line.starts_with("  ")
                && let Some((key, value)) = line.split_once(':')
            {
                metadata.insert(key.trim().to_string(), unquote(value.trim()).to_string());
                continue;
            }

            if !raw_line.starts_with("  ") {
                in_metadata = false;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value.trim());

            if key == "allowed-tools" || key == "allowed_tools" {
                let list = value
                    .strip_prefix('[')
                    .and_then(|v| v.strip_suffix(']'))
                    .unwrap_or(value);
                allowed_tools = list
                    .split(',')
                    .map(|tool| unquote(tool.trim()).to_string())
                    .filter(|tool| !tool.is_empty())
                    .collect();
            }

            values.insert(key.to_string(), value.to_string());
        }

        let name = values
            .get("name")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or(SkillLoadError::MissingManifestField("name"))?;
        let description = values
            .get("description")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or(SkillLoadError::MissingManifestField("description"))?;

        let disable_model_invocation = values
            .get("disable-model-invocation")
            .or_else(|| values.get("disable_model_invocation"))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(SkillManifest {
            name,
            description,
            license: values.get("license").cloned(),
            compatibility: values.get("compatibility").cloned(),
            allowed_tools,
            metadata,
            disable_model_invocation,
        })
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
