//! Signed rule pack resolution.
//!
//! An external pack is a directory holding `manifest.json`, an Ed25519
//! signature over the exact manifest bytes in `manifest.sig` (64 raw bytes or
//! base64 text), and the rule files the manifest lists with their SHA-256.
//! Any failure falls back to the bundled rules and records a warning; the
//! loader never fails.

use std::fs;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::builtin::{DEFAULT_PATTERN_RULES, DEFAULT_SIGNATURE_RULES};
use super::matcher::RuleSet;
use super::pattern::{PatternRule, parse_pattern_rules};
use super::signature::{SignatureRule, parse_signature_rules};

/// Public key of the official rule pack publisher.
pub const BUNDLED_PUBLIC_KEY: &str = "XvzVn84LJbVpTMEvUK/MPNJXL0Y74B+bXZnnhWbRf60=";

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "manifest.sig";

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("expected 32 key bytes, found {0}")]
    Length(usize),

    #[error("not a valid ed25519 public key")]
    Point,
}

/// Ed25519 keys accepted as rule pack signers. A pack is trusted when any key
/// verifies its manifest.
#[derive(Debug, Clone, Default)]
pub struct TrustedKeys(Vec<VerifyingKey>);

impl TrustedKeys {
    pub fn new(keys: Vec<VerifyingKey>) -> Self {
        Self(keys)
    }

    /// The single publisher key compiled into the binary.
    pub fn bundled() -> Self {
        match Self::decode_key(BUNDLED_PUBLIC_KEY) {
            Ok(key) => Self(vec![key]),
            Err(e) => {
                warn!(error = %e, "Bundled rule pack key is unusable");
                Self::default()
            }
        }
    }

    pub fn decode_key(encoded: &str) -> Result<VerifyingKey, KeyError> {
        let bytes = Base64.decode(encoded.trim())?;
        let key_bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length(bytes.len()))?;
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| KeyError::Point)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0
            .iter()
            .any(|key| key.verify_strict(message, signature).is_ok())
    }
}

/// Why an external pack was rejected. The display text is the warning shown
/// to the user, minus the fallback notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulePackError {
    #[error("Rule pack missing manifest.json.")]
    MissingManifest,

    #[error("Rule pack missing or invalid manifest.sig.")]
    InvalidSignatureFile,

    #[error("Rule pack signature verification failed.")]
    SignatureRejected,

    #[error("Rule pack manifest format is invalid.")]
    InvalidManifest,

    #[error("Rule pack file missing: {0}.")]
    MissingFile(String),

    #[error("Rule pack checksum mismatch for {0}.")]
    ChecksumMismatch(String),

    #[error("Rule pack parsed zero rules.")]
    NoRules,
}

impl RulePackError {
    pub fn warning(&self) -> String {
        format!("{self} Falling back to bundled rules.")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePackManifest {
    #[serde(default)]
    pub pack_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PackSource {
    Bundled,
    External {
        pack_id: Option<String>,
        version: Option<String>,
    },
}

impl std::fmt::Display for PackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackSource::Bundled => f.write_str("bundled"),
            PackSource::External { pack_id, version } => write!(
                f,
                "{}@{}",
                pack_id.as_deref().unwrap_or("unnamed"),
                version.as_deref().unwrap_or("unversioned")
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedRulePack {
    pub pattern_rules: Vec<PatternRule>,
    pub signature_rules: Vec<SignatureRule>,
    pub warnings: Vec<String>,
    pub source: PackSource,
}

impl LoadedRulePack {
    pub fn bundled() -> Self {
        Self {
            pattern_rules: parse_pattern_rules(DEFAULT_PATTERN_RULES),
            signature_rules: parse_signature_rules(DEFAULT_SIGNATURE_RULES),
            warnings: Vec::new(),
            source: PackSource::Bundled,
        }
    }

    fn fallback(error: &RulePackError) -> Self {
        let mut pack = Self::bundled();
        pack.warnings.push(error.warning());
        pack
    }

    pub fn compile(&self) -> RuleSet {
        RuleSet::compile(self.pattern_rules.clone(), self.signature_rules.clone())
    }
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct RulePackLoader {
    pack_dir: Option<PathBuf>,
    trusted_keys: TrustedKeys,
}

impl RulePackLoader {
    pub fn new(pack_dir: Option<PathBuf>, trusted_keys: TrustedKeys) -> Self {
        Self {
            pack_dir,
            trusted_keys,
        }
    }

    /// Loader that only ever yields the bundled rules.
    pub fn bundled_only() -> Self {
        Self::new(None, TrustedKeys::bundled())
    }

    pub fn load(&self) -> LoadedRulePack {
        let Some(dir) = self.pack_dir.as_deref().filter(|d| d.is_dir()) else {
            debug!("No external rule pack, using bundled rules");
            return LoadedRulePack::bundled();
        };

        match self.load_external(dir) {
            Ok(pack) => {
                info!(
                    path = %dir.display(),
                    source = %pack.source,
                    pattern_rules = pack.pattern_rules.len(),
                    signature_rules = pack.signature_rules.len(),
                    "Loaded external rule pack"
                );
                pack
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Rejected external rule pack");
                LoadedRulePack::fallback(&e)
            }
        }
    }

    fn load_external(&self, dir: &Path) -> Result<LoadedRulePack, RulePackError> {
        let manifest_bytes =
            fs::read(dir.join(MANIFEST_FILE)).map_err(|_| RulePackError::MissingManifest)?;
        let signature = read_signature(&dir.join(SIGNATURE_FILE))?;

        if !self.trusted_keys.verify(&manifest_bytes, &signature) {
            return Err(RulePackError::SignatureRejected);
        }

        let manifest: RulePackManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|_| RulePackError::InvalidManifest)?;

        let mut contents = Vec::with_capacity(manifest.files.len());
        for entry in &manifest.files {
            let relative = Path::new(&entry.path);
            if relative.is_absolute()
                || relative
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
            {
                return Err(RulePackError::MissingFile(entry.path.clone()));
            }

            let data = fs::read(dir.join(relative))
                .map_err(|_| RulePackError::MissingFile(entry.path.clone()))?;
            if sha256_hex(&data) != entry.sha256.to_lowercase() {
                return Err(RulePackError::ChecksumMismatch(entry.path.clone()));
            }
            contents.push((entry.path.to_lowercase(), data));
        }

        let mut yaml_source = String::new();
        let mut yara_source = String::new();
        for (path, data) in contents {
            let Ok(text) = String::from_utf8(data) else {
                continue;
            };
            if path.ends_with(".yaml") || path.ends_with(".yml") {
                yaml_source.push('\n');
                yaml_source.push_str(&text);
            } else if path.ends_with(".yar") || path.ends_with(".yara") {
                yara_source.push('\n');
                yara_source.push_str(&text);
            }
        }

        let pattern_rules = parse_pattern_rules(&yaml_source);
        let signature_rules = parse_signature_rules(&yara_source);
        if pattern_rules.is_empty() && signature_rules.is_empty() {
            return Err(RulePackError::NoRules);
        }

        let bundled = LoadedRulePack::bundled();
        Ok(LoadedRulePack {
            pattern_rules: if pattern_rules.is_empty() {
                bundled.pattern_rules
            } else {
                pattern_rules
            },
            signature_rules: if signature_rules.is_empty() {
                bundled.signature_rules
            } else {
                signature_rules
            },
            warnings: Vec::new(),
            source: PackSource::External {
                pack_id: manifest.pack_id,
                version: manifest.version,
            },
        })
    }
}

fn read_signature(path: &Path) -> Result<Signature, RulePackError> {
    let data = fs::read(path).map_err(|_| RulePackError::InvalidSignatureFile)?;
    if data.is_empty() {
        return Err(RulePackError::InvalidSignatureFile);
    }
    let raw = if data.len() == 64 {
        data
    } else {
        let text = std::str::from_utf8(&data).map_err(|_| RulePackError::InvalidSignatureFile)?;
        Base64
            .decode(text.trim())
            .map_err(|_| RulePackError::InvalidSignatureFile)?
    };
    Signature::try_from(raw.as_slice()).map_err(|_| RulePackError::InvalidSignatureFile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use tempfile::TempDir;

    const PACK_YAML: &str = "- id: TEST_RULE\n  category: malware\n  severity: HIGH\n  patterns: [\"evil\"]\n  description: test\n";
    const PACK_YARA: &str = "rule test_rule {\n  meta:\n    threat_type = \"CODE EXECUTION\"\n  strings:\n    $a = /boom/\n}\n";

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn trusted() -> TrustedKeys {
        TrustedKeys::new(vec![signing_key().verifying_key()])
    }

    fn write_pack(dir: &Path, files: &[(&str, &str)], base64_sig: bool) {
        let manifest = RulePackManifest {
            pack_id: Some("test-pack".to_string()),
            version: Some("1.0.0".to_string()),
            files: files
                .iter()
                .map(|(path, content)| {
                    fs::write(dir.join(path), content).unwrap();
                    ManifestEntry {
                        path: path.to_string(),
                        sha256: sha256_hex(content.as_bytes()),
                    }
                })
                .collect(),
        };
        let bytes = serde_json::to_vec(&manifest).unwrap();
        fs::write(dir.join(MANIFEST_FILE), &bytes).unwrap();
        let signature = signing_key().sign(&bytes).to_bytes();
        if base64_sig {
            fs::write(dir.join(SIGNATURE_FILE), format!("{}\n", Base64.encode(signature))).unwrap();
        } else {
            fs::write(dir.join(SIGNATURE_FILE), signature).unwrap();
        }
    }

    fn signed_pack() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_pack(dir.path(), &[("rules.yaml", PACK_YAML), ("rules.yar", PACK_YARA)], false);
        dir
    }

    #[test]
    fn test_bundled_key_decodes() {
        assert_eq!(TrustedKeys::bundled().len(), 1);
    }

    #[test]
    fn test_decode_key_errors() {
        assert!(matches!(TrustedKeys::decode_key("%%%"), Err(KeyError::Base64(_))));
        assert!(matches!(
            TrustedKeys::decode_key(&Base64.encode([1u8; 16])),
            Err(KeyError::Length(16))
        ));
    }

    #[test]
    fn test_no_directory_uses_bundled_without_warnings() {
        let pack = RulePackLoader::new(None, trusted()).load();
        assert_eq!(pack.source, PackSource::Bundled);
        assert!(pack.warnings.is_empty());
        assert!(!pack.pattern_rules.is_empty());
        assert!(!pack.signature_rules.is_empty());

        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let pack = RulePackLoader::new(Some(missing), trusted()).load();
        assert_eq!(pack.source, PackSource::Bundled);
        assert!(pack.warnings.is_empty());
    }

    #[test]
    fn test_signed_pack_loads() {
        let dir = signed_pack();
        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();

        assert!(pack.warnings.is_empty());
        assert_eq!(
            pack.source,
            PackSource::External {
                pack_id: Some("test-pack".to_string()),
                version: Some("1.0.0".to_string())
            }
        );
        assert_eq!(pack.pattern_rules.len(), 1);
        assert_eq!(pack.pattern_rules[0].id, "TEST_RULE");
        assert_eq!(pack.signature_rules.len(), 1);
        assert_eq!(pack.signature_rules[0].name, "test_rule");
    }

    #[test]
    fn test_base64_signature_accepted() {
        let dir = TempDir::new().unwrap();
        write_pack(dir.path(), &[("rules.yaml", PACK_YAML)], true);
        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert!(pack.warnings.is_empty());
        assert_eq!(pack.pattern_rules[0].id, "TEST_RULE");
    }

    #[test]
    fn test_missing_family_is_backfilled() {
        let dir = TempDir::new().unwrap();
        write_pack(dir.path(), &[("rules.yml", PACK_YAML)], false);
        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert_eq!(pack.pattern_rules.len(), 1);
        assert_eq!(
            pack.signature_rules.len(),
            LoadedRulePack::bundled().signature_rules.len()
        );
    }

    #[test]
    fn test_tampered_file_falls_back() {
        let dir = signed_pack();
        fs::write(dir.path().join("rules.yaml"), PACK_YAML.replace("evil", "evil2")).unwrap();

        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert_eq!(pack.source, PackSource::Bundled);
        assert_eq!(
            pack.warnings,
            vec!["Rule pack checksum mismatch for rules.yaml. Falling back to bundled rules."]
        );
        assert!(
            pack.pattern_rules
                .iter()
                .any(|r| r.id == "PROMPT_INJECTION_IGNORE_INSTRUCTIONS")
        );
    }

    #[test]
    fn test_tampered_manifest_fails_signature() {
        let dir = signed_pack();
        let mut manifest = fs::read(dir.path().join(MANIFEST_FILE)).unwrap();
        manifest.push(b' ');
        fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();

        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert_eq!(
            pack.warnings,
            vec!["Rule pack signature verification failed. Falling back to bundled rules."]
        );
    }

    #[test]
    fn test_untrusted_key_rejected() {
        let dir = signed_pack();
        let other = SigningKey::from_bytes(&[9u8; 32]).verifying_key();
        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), TrustedKeys::new(vec![other])).load();
        assert_eq!(pack.source, PackSource::Bundled);
        assert_eq!(pack.warnings.len(), 1);
    }

    #[test]
    fn test_any_trusted_key_suffices() {
        let dir = signed_pack();
        let other = SigningKey::from_bytes(&[9u8; 32]).verifying_key();
        let keys = TrustedKeys::new(vec![other, signing_key().verifying_key()]);
        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), keys).load();
        assert!(pack.warnings.is_empty());
    }

    #[test]
    fn test_missing_manifest_and_signature() {
        let dir = TempDir::new().unwrap();
        let loader = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted());
        assert_eq!(
            loader.load().warnings,
            vec!["Rule pack missing manifest.json. Falling back to bundled rules."]
        );

        fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();
        assert_eq!(
            loader.load().warnings,
            vec!["Rule pack missing or invalid manifest.sig. Falling back to bundled rules."]
        );

        fs::write(dir.path().join(SIGNATURE_FILE), "").unwrap();
        assert_eq!(
            loader.load().warnings,
            vec!["Rule pack missing or invalid manifest.sig. Falling back to bundled rules."]
        );
    }

    #[test]
    fn test_signed_but_malformed_manifest() {
        let dir = TempDir::new().unwrap();
        let bytes = br#"{"pack_id": "x"}"#;
        fs::write(dir.path().join(MANIFEST_FILE), bytes).unwrap();
        fs::write(dir.path().join(SIGNATURE_FILE), signing_key().sign(bytes).to_bytes()).unwrap();

        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert_eq!(
            pack.warnings,
            vec!["Rule pack manifest format is invalid. Falling back to bundled rules."]
        );
    }

    #[test]
    fn test_listed_file_missing() {
        let dir = signed_pack();
        fs::remove_file(dir.path().join("rules.yar")).unwrap();
        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert_eq!(
            pack.warnings,
            vec!["Rule pack file missing: rules.yar. Falling back to bundled rules."]
        );
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let outer = TempDir::new().unwrap();
        let pack_dir = outer.path().join("pack");
        fs::create_dir(&pack_dir).unwrap();
        fs::write(outer.path().join("outside.yaml"), PACK_YAML).unwrap();

        let manifest = RulePackManifest {
            pack_id: None,
            version: None,
            files: vec![ManifestEntry {
                path: "../outside.yaml".to_string(),
                sha256: sha256_hex(PACK_YAML.as_bytes()),
            }],
        };
        let bytes = serde_json::to_vec(&manifest).unwrap();
        fs::write(pack_dir.join(MANIFEST_FILE), &bytes).unwrap();
        fs::write(pack_dir.join(SIGNATURE_FILE), signing_key().sign(&bytes).to_bytes()).unwrap();

        let pack = RulePackLoader::new(Some(pack_dir), trusted()).load();
        assert_eq!(
            pack.warnings,
            vec!["Rule pack file missing: ../outside.yaml. Falling back to bundled rules."]
        );
    }

    #[test]
    fn test_zero_rules_parsed() {
        let dir = TempDir::new().unwrap();
        write_pack(dir.path(), &[("rules.yaml", "# nothing here\n")], false);
        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert_eq!(
            pack.warnings,
            vec!["Rule pack parsed zero rules. Falling back to bundled rules."]
        );
    }

    #[test]
    fn test_checksum_comparison_ignores_case() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("rules.yaml"), PACK_YAML).unwrap();
        let manifest = RulePackManifest {
            pack_id: None,
            version: None,
            files: vec![ManifestEntry {
                path: "rules.yaml".to_string(),
                sha256: sha256_hex(PACK_YAML.as_bytes()).to_uppercase(),
            }],
        };
        let bytes = serde_json::to_vec(&manifest).unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), &bytes).unwrap();
        fs::write(dir.path().join(SIGNATURE_FILE), signing_key().sign(&bytes).to_bytes()).unwrap();

        let pack = RulePackLoader::new(Some(dir.path().to_path_buf()), trusted()).load();
        assert!(pack.warnings.is_empty());
        assert_eq!(pack.source.to_string(), "unnamed@unversioned");
    }
}
