use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rdfo_crypto::ChecksumAlgorithm;
use rdfo_types::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Settings for a [`PartStore`](crate::PartStore) backed by the filesystem.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// uri_base = "http://data.example.org/obj/"
/// storage_dir = "/var/lib/rdfo"
/// checksum = "sha256"
///
/// [context]
/// service = "catalogue"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Object URIs are `{uri_base}{object_id}`.
    pub uri_base: String,
    pub storage_dir: PathBuf,
    /// Separator between part id and version in stream names.
    pub prefix: String,
    /// Characters per directory level when sharding object ids (1 or 2).
    pub shorty_length: usize,
    /// Fixed for the life of a store; changing it strands existing checksums.
    pub checksum: ChecksumAlgorithm,
    /// JSON-lines audit file. No audit trail when unset.
    pub audit_log: Option<PathBuf>,
    /// Static fields attached to every audit event.
    pub context: BTreeMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri_base: "info:local/".to_string(),
            storage_dir: PathBuf::from("./rdffilestore"),
            prefix: "_".to_string(),
            shorty_length: 2,
            checksum: ChecksumAlgorithm::Blake3,
            audit_log: None,
            context: BTreeMap::new(),
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Same config rooted at another directory.
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if !(1..=2).contains(&self.shorty_length) {
            return Err(StoreError::InvalidConfig(format!(
                "shorty_length must be 1 or 2, got {}",
                self.shorty_length
            )));
        }
        if self.prefix.is_empty() || self.prefix.contains('/') || self.prefix.bytes().any(|b| b.is_ascii_digit()) {
            return Err(StoreError::InvalidConfig(format!(
                "prefix {:?} must be non-empty, without '/' or digits",
                self.prefix
            )));
        }
        self.normalized_uri_base()?;
        Ok(())
    }

    /// `uri_base` with a trailing `/` added unless it already ends in
    /// `/`, `#` or `:`.
    pub fn normalized_uri_base(&self) -> StoreResult<Uri> {
        normalize_uri_base(&self.uri_base)
    }
}

pub(crate) fn normalize_uri_base(base: &str) -> StoreResult<Uri> {
    let mut base = base.trim().to_string();
    if !base.ends_with(['/', '#', ':']) {
        base.push('/');
    }
    Uri::parse(base).map_err(|e| StoreError::InvalidConfig(format!("uri_base: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.uri_base, "info:local/");
        assert_eq!(c.storage_dir, PathBuf::from("./rdffilestore"));
        assert_eq!(c.prefix, "_");
        assert_eq!(c.shorty_length, 2);
        assert_eq!(c.checksum, ChecksumAlgorithm::Blake3);
        assert!(c.audit_log.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StoreConfig::from_toml_str(
            r#"
            uri_base = "http://example.org/obj"
            checksum = "sha256"

            [context]
            service = "catalogue"
            "#,
        )
        .unwrap();
        assert_eq!(c.checksum, ChecksumAlgorithm::Sha256);
        assert_eq!(c.prefix, "_");
        assert_eq!(c.context.get("service").map(String::as_str), Some("catalogue"));
        assert_eq!(c.normalized_uri_base().unwrap().as_str(), "http://example.org/obj/");
    }

    #[test]
    fn uri_base_separators_are_kept() {
        for base in ["info:local/", "http://x.org/ns#", "urn:objects:"] {
            let c = StoreConfig {
                uri_base: base.to_string(),
                ..StoreConfig::default()
            };
            assert_eq!(c.normalized_uri_base().unwrap().as_str(), base);
        }
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(StoreConfig::from_toml_str("shorty_length = 3").is_err());
        assert!(StoreConfig::from_toml_str("prefix = \"\"").is_err());
        assert!(StoreConfig::from_toml_str("prefix = \"v1\"").is_err());
        assert!(StoreConfig::from_toml_str("uri_base = \"not a uri\"").is_err());
        assert!(matches!(
            StoreConfig::from_toml_str("shorty_length = \"two\"").unwrap_err(),
            StoreError::InvalidConfig(_)
        ));
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.toml");
        let c = StoreConfig::default().with_storage_dir(tmp.path().join("data"));
        std::fs::write(&path, c.to_toml_string().unwrap()).unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap(), c);
    }
}
