//! Provider-specific manifest mapping.

use modkit_schema::{ManifestError, ModuleDefinition, ModuleManifest, Provider};

/// Maps a provider-agnostic module definition to the manifest published for
/// one provider variant.
pub trait ProviderManifest: Send + Sync {
    /// Provider this mapping produces manifests for.
    fn provider(&self) -> Provider;

    /// Build the provider-specific manifest.
    fn manifest(&self, definition: &ModuleDefinition) -> Result<ModuleManifest, ManifestError>;
}

/// Stock mapping: copies the definition, sets the provider and tags the
/// manifest with the provider's folder name.
#[derive(Debug, Clone, Copy)]
pub struct DefaultProviderManifest(pub Provider);

impl ProviderManifest for DefaultProviderManifest {
    fn provider(&self) -> Provider {
        self.0
    }

    fn manifest(&self, definition: &ModuleDefinition) -> Result<ModuleManifest, ManifestError> {
        Ok(ModuleManifest::from_definition(definition, self.0)?.with_tag(self.0.folder_name()))
    }
}

/// Mapping for `provider`.
pub fn for_provider(provider: Provider) -> Box<dyn ProviderManifest> {
    Box::new(DefaultProviderManifest(provider))
}
