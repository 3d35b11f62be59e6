//! Cloud providers a module can be packaged for.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cloud provider a module variant targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    /// Amazon Web Services.
    #[serde(rename = "AWS", alias = "aws", alias = "Aws")]
    Aws,
    /// Microsoft Azure.
    #[serde(rename = "Azure", alias = "azure")]
    Azure,
    /// Google Cloud Platform.
    #[serde(rename = "GoogleCloud", alias = "googlecloud", alias = "google-cloud")]
    GoogleCloud,
    /// Kubernetes clusters, independent of the hosting cloud.
    #[serde(rename = "Kubernetes", alias = "kubernetes")]
    Kubernetes,
}

/// Error returned when a provider name is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown provider '{0}': expected one of aws, azure, googlecloud, kubernetes")]
pub struct ProviderParseError(pub String);

impl Provider {
    /// All supported providers, in folder-discovery order.
    pub const ALL: [Provider; 4] = [
        Provider::Aws,
        Provider::Azure,
        Provider::GoogleCloud,
        Provider::Kubernetes,
    ];

    /// Canonical display name, as written to `module.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Azure => "Azure",
            Provider::GoogleCloud => "GoogleCloud",
            Provider::Kubernetes => "Kubernetes",
        }
    }

    /// Lowercase name of the provider's folder inside a module directory.
    pub fn folder_name(self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::GoogleCloud => "googlecloud",
            Provider::Kubernetes => "kubernetes",
        }
    }
}

impl FromStr for Provider {
    type Err = ProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], "");
        Provider::ALL
            .into_iter()
            .find(|p| p.folder_name() == normalized)
            .ok_or_else(|| ProviderParseError(s.to_string()))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
