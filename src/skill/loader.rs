use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use super::frontmatter::FrontmatterParser;
use super::{SkillFile, SkillFileType, SkillLoadError, SkillPackage};

pub const SKILL_MANIFEST_FILE: &str = "SKILL.md";

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Directory extensions treated as opaque bundles during discovery.
const BUNDLE_EXTENSIONS: &[&str] = &["app", "bundle", "framework", "plugin", "kext", "xcarchive"];

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\(([^\)]+)\)").expect("MARKDOWN_LINK: invalid regex"));

static RUN_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:run|execute|invoke)\s+`?([A-Za-z0-9_\-./]+\.(?:py|sh))`?")
        .expect("RUN_PHRASE: invalid regex")
});

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn is_bundle_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| BUNDLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Discovers skill directories and loads them into [`SkillPackage`]s.
#[derive(Debug, Clone)]
pub struct SkillLoader {
    max_file_size_bytes: u64,
}

impl SkillLoader {
    pub fn new() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size_bytes
    }

    /// Every directory under `roots` that directly contains `SKILL.md`,
    /// deduplicated and sorted by path.
    pub fn discover(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let mut discovered = BTreeSet::new();
        for root in roots {
            let walker = WalkDir::new(root)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !(is_hidden(e) || is_bundle_dir(e)));
            for entry in walker.filter_map(|e| e.ok()) {
                if entry.file_type().is_file()
                    && entry.file_name() == SKILL_MANIFEST_FILE
                    && let Some(parent) = entry.path().parent()
                {
                    trace!(path = %parent.display(), "Found skill directory");
                    discovered.insert(parent.to_path_buf());
                }
            }
        }
        debug!(count = discovered.len(), "Discovered skill directories");
        discovered.into_iter().collect()
    }

    pub fn load(&self, directory: &Path) -> Result<SkillPackage, SkillLoadError> {
        if !directory.is_dir() {
            return Err(SkillLoadError::DirectoryMissing(directory.to_path_buf()));
        }

        let manifest_path = directory.join(SKILL_MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(SkillLoadError::MissingManifestFile(directory.to_path_buf()));
        }

        let content = fs::read_to_string(&manifest_path).map_err(|e| SkillLoadError::Read {
            path: manifest_path.clone(),
            source: e,
        })?;
        let (front_matter, body) = FrontmatterParser::split(&content)
            .ok_or_else(|| SkillLoadError::InvalidFrontMatter(manifest_path.clone()))?;
        let manifest = FrontmatterParser::parse_manifest(front_matter)?;
        let files = self.collect_files(directory);
        let referenced_files = extract_referenced_files(body);

        debug!(
            skill = %manifest.name,
            path = %directory.display(),
            files = files.len(),
            "Loaded skill package"
        );

        Ok(SkillPackage {
            directory: directory.to_path_buf(),
            manifest,
            manifest_path,
            files,
            instruction_body: body.to_string(),
            referenced_files,
        })
    }

    fn collect_files(&self, directory: &Path) -> Vec<SkillFile> {
        WalkDir::new(directory)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|entry| self.read_file(directory, &entry))
            .collect()
    }

    fn read_file(&self, directory: &Path, entry: &DirEntry) -> SkillFile {
        let path = entry.path();
        let relative_path = path
            .strip_prefix(directory)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let mut file_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(SkillFileType::Other, SkillFileType::from_extension);

        let mut content = None;
        if size_bytes <= self.max_file_size_bytes && file_type != SkillFileType::Binary {
            match fs::read(path).map(String::from_utf8) {
                Ok(Ok(text)) => content = Some(text),
                _ => {
                    trace!(path = %path.display(), "Treating unreadable or non-UTF-8 file as binary");
                    file_type = SkillFileType::Binary;
                }
            }
        }

        SkillFile {
            path: path.to_path_buf(),
            relative_path,
            file_type,
            size_bytes,
            content,
        }
    }
}

impl Default for SkillLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Local markdown link targets and `run <script>` phrases in the instruction body.
pub fn extract_referenced_files(body: &str) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    for caps in MARKDOWN_LINK.captures_iter(body) {
        let link = &caps[1];
        if !link.starts_with("http://") && !link.starts_with("https://") && !link.starts_with('#') {
            refs.insert(link.to_string());
        }
    }
    for caps in RUN_PHRASE.captures_iter(body) {
        refs.insert(caps[1].to_string());
    }
    refs
}
