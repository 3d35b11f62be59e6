//! Module definition and manifest types.
//!
//! A module directory carries one provider-agnostic [`ModuleDefinition`]
//! (`module.json` at its root). Packaging a provider variant turns it into a
//! [`ModuleManifest`], which is what gets written to the staging root and
//! shipped inside the archive.

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::Provider;

/// Errors that can occur when loading or building a module manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// A required field is empty.
    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    /// The JSON content could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Provider-agnostic module metadata, as authored in the module root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    /// Publisher namespace (e.g. `acme`).
    pub namespace: String,
    /// Module name, unique within the namespace.
    pub name: String,
    /// Semantic version of this release.
    pub version: Version,
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Short summary shown in the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Search tags, in authored order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Project website URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Source repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl ModuleDefinition {
    /// Parse a module definition from JSON, rejecting empty identity fields.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for malformed JSON or a missing
    /// required field, and [`ManifestError::EmptyField`] when `namespace` or
    /// `name` is blank.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let definition: ModuleDefinition = serde_json::from_str(content)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::EmptyField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.namespace.trim().is_empty() {
            return Err(ManifestError::EmptyField("namespace"));
        }
        if self.name.trim().is_empty() {
            return Err(ManifestError::EmptyField("name"));
        }
        Ok(())
    }
}

/// Provider-specific module manifest, serialized to `module.json` in the
/// package archive.
///
/// Fields are private: a manifest is immutable once built, and the
/// identity fields (`namespace`, `name`, `provider`, `version`) are always
/// present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    namespace: String,
    name: String,
    provider: Provider,
    version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repository: Option<String>,
}

impl ModuleManifest {
    /// Build the manifest for `provider` from a module definition.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::EmptyField`] if the definition has a blank
    /// namespace or name.
    pub fn from_definition(
        definition: &ModuleDefinition,
        provider: Provider,
    ) -> Result<Self, ManifestError> {
        definition.validate()?;
        Ok(Self {
            namespace: definition.namespace.clone(),
            name: definition.name.clone(),
            provider,
            version: definition.version.clone(),
            display_name: definition.display_name.clone(),
            description: definition.description.clone(),
            tags: definition.tags.clone(),
            icon: definition.icon.clone(),
            website: definition.website.clone(),
            repository: definition.repository.clone(),
        })
    }

    /// Parse a published manifest, rejecting blank identity fields.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for malformed JSON or a missing
    /// required field, and [`ManifestError::EmptyField`] when `namespace` or
    /// `name` is blank.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: ModuleManifest = serde_json::from_str(content)?;
        if manifest.namespace.trim().is_empty() {
            return Err(ManifestError::EmptyField("namespace"));
        }
        if manifest.name.trim().is_empty() {
            return Err(ManifestError::EmptyField("name"));
        }
        Ok(manifest)
    }

    /// Return a copy of this manifest with `tag` appended, unless already
    /// present.
    pub fn with_tag(mut self, tag: &str) -> Self {
        if !self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            self.tags.push(tag.to_string());
        }
        self
    }

    /// Publisher namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target provider.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Release version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Human-readable title, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Summary, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Search tags in order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Icon URL, if any.
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Website URL, if any.
    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// Repository URL, if any.
    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    /// Pretty-printed JSON (2-space indent, camelCase keys, absent optional
    /// fields omitted).
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ModuleDefinition {
        ModuleDefinition::parse(
            r#"{
                "namespace": "acme",
                "name": "transcode",
                "version": "1.2.0",
                "displayName": "Transcode Service",
                "tags": ["media"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_manifest_json_omits_absent_fields() {
        let manifest = ModuleManifest::from_definition(&definition(), Provider::Aws).unwrap();
        let json = manifest.to_json().unwrap();

        assert!(json.contains("\"displayName\": \"Transcode Service\""));
        assert!(json.contains("\"provider\": \"AWS\""));
        assert!(json.contains("\"version\": \"1.2.0\""));
        assert!(!json.contains("description"));
        assert!(!json.contains("null"));
        // two-space indentation
        assert!(json.contains("\n  \"namespace\": \"acme\""));
    }

    #[test]
    fn test_with_tag_deduplicates() {
        let manifest = ModuleManifest::from_definition(&definition(), Provider::Azure)
            .unwrap()
            .with_tag("azure")
            .with_tag("Azure")
            .with_tag("media");
        assert_eq!(manifest.tags(), ["media", "azure"]);
    }

    #[test]
    fn test_empty_namespace_rejected() {
        let err = ModuleDefinition::parse(r#"{"namespace": " ", "name": "x", "version": "1.0.0"}"#)
            .unwrap_err();
        assert!(matches!(err, ManifestError::EmptyField("namespace")));
    }

    #[test]
    fn test_published_manifest_roundtrip() {
        let manifest = ModuleManifest::from_definition(&definition(), Provider::GoogleCloud)
            .unwrap()
            .with_tag("googlecloud");
        let parsed = ModuleManifest::parse(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed, manifest);

        let err = ModuleManifest::parse(
            r#"{"namespace": "acme", "name": "", "provider": "AWS", "version": "1.0.0"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::EmptyField("name")));

        let err = ModuleManifest::parse(r#"{"namespace": "acme", "name": "x", "version": "1.0.0"}"#)
            .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_missing_version_rejected() {
        let err = ModuleDefinition::parse(r#"{"namespace": "acme", "name": "x"}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_invalid_semver_rejected() {
        let err =
            ModuleDefinition::parse(r#"{"namespace": "acme", "name": "x", "version": "1.0"}"#)
                .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }
}
