//! Configuration loading functions.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::error::ConfigError;
use super::types::Config;
use crate::rules::pack::TrustedKeys;

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                path: path.display().to_string(),
                source: e,
            }),
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
                path: path.display().to_string(),
                source: e,
            }),
            "toml" => toml::from_str(&content).map_err(|e| ConfigError::ParseToml {
                path: path.display().to_string(),
                source: e,
            }),
            _ => Err(ConfigError::UnsupportedFormat(
                path.display().to_string(),
                ext,
            )),
        }
    }

    /// Load configuration from the project directory or global config.
    ///
    /// Search order:
    /// 1. `.skill-audit.{yaml,yml,json,toml}` in project root
    /// 2. `~/.config/skill-audit/config.yaml`
    /// 3. Default configuration
    pub fn load(project_root: Option<&Path>) -> Self {
        if let Some(root) = project_root {
            for filename in &[
                ".skill-audit.yaml",
                ".skill-audit.yml",
                ".skill-audit.json",
                ".skill-audit.toml",
            ] {
                let path = root.join(filename);
                if path.exists()
                    && let Ok(config) = Self::from_file(&path)
                {
                    debug!(path = %path.display(), "Loaded project config");
                    return config;
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let global_config = config_dir.join("skill-audit").join("config.yaml");
            if global_config.exists()
                && let Ok(config) = Self::from_file(&global_config)
            {
                debug!(path = %global_config.display(), "Loaded global config");
                return config;
            }
        }

        Self::default()
    }

    /// Trust anchors for rule pack verification.
    pub fn trusted_keys(&self) -> Result<TrustedKeys, ConfigError> {
        if self.rule_pack.trusted_keys.is_empty() {
            return Ok(TrustedKeys::bundled());
        }
        let keys = self
            .rule_pack
            .trusted_keys
            .iter()
            .map(|key| {
                TrustedKeys::decode_key(key).map_err(|e| ConfigError::InvalidTrustedKey {
                    key: key.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TrustedKeys::new(keys))
    }
}
