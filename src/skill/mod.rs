//! In-memory model of an agent skill package and its loader.

mod frontmatter;
mod loader;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use frontmatter::FrontmatterParser;
pub use loader::{DEFAULT_MAX_FILE_SIZE_BYTES, SKILL_MANIFEST_FILE, SkillLoader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillFileType {
    Markdown,
    Python,
    Bash,
    Binary,
    Other,
}

impl SkillFileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "py" => SkillFileType::Python,
            "sh" | "bash" | "zsh" => SkillFileType::Bash,
            "md" | "markdown" => SkillFileType::Markdown,
            "exe" | "dylib" | "dll" | "so" | "bin" => SkillFileType::Binary,
            _ => SkillFileType::Other,
        }
    }

    /// Name as written in a rule's `file_types` list.
    pub fn from_rule_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "markdown" => Some(SkillFileType::Markdown),
            "python" => Some(SkillFileType::Python),
            "bash" => Some(SkillFileType::Bash),
            "binary" => Some(SkillFileType::Binary),
            "other" => Some(SkillFileType::Other),
            _ => None,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, SkillFileType::Python | SkillFileType::Bash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillManifest {
    pub name: String,
    pub description: String,
    pub license: Option<String>,
    pub compatibility: Option<String>,
    pub allowed_tools: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub disable_model_invocation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFile {
    pub path: PathBuf,
    /// Relative to the package root, `/`-separated.
    pub relative_path: String,
    pub file_type: SkillFileType,
    pub size_bytes: u64,
    /// Absent for binary, oversized, or non-UTF-8 files.
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillPackage {
    pub directory: PathBuf,
    pub manifest: SkillManifest,
    pub manifest_path: PathBuf,
    pub files: Vec<SkillFile>,
    /// Markdown following the front matter.
    pub instruction_body: String,
    pub referenced_files: BTreeSet<String>,
}

impl SkillPackage {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn description(&self) -> &str {
        &self.manifest.description
    }

    pub fn scripts(&self) -> impl Iterator<Item = &SkillFile> {
        self.files.iter().filter(|f| f.file_type.is_script())
    }
}

#[derive(Error, Debug)]
pub enum SkillLoadError {
    #[error("Skill directory does not exist: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("SKILL.md not found in {}", .0.display())]
    MissingManifestFile(PathBuf),

    #[error("Invalid YAML frontmatter in {}", .0.display())]
    InvalidFrontMatter(PathBuf),

    #[error("SKILL.md missing required field: {0}")]
    MissingManifestField(&'static str),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
