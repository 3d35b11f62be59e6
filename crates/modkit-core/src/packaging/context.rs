//! Packaging context: where a provider variant is read from and staged to.
//!
//! Default layout for a module directory `<module>` and provider `aws`:
//!
//! ```text
//! <module>/
//! ├── module.json                 # ModuleDefinition
//! └── aws/                        # provider folder
//!     ├── module-package.json     # ModulePackage
//!     └── .publish/
//!         ├── staging/            # archived as-is
//!         │   ├── functions/
//!         │   └── module.json     # ModuleManifest
//!         ├── logs/               # per-function build logs
//!         └── <ns>-<name>-aws-<version>.zip
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use modkit_schema::{
    MODULE_JSON, MODULE_PACKAGE_JSON, ModuleDefinition, ModuleManifest, ModulePackage, Provider,
};

use super::tokens::TokenReplacer;
use super::{IoResultExt, PackagingError};
use crate::paths::PUBLISH_DIR;
use crate::provider;

type Substitution = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Everything one packaging run needs. Owns the staging folder for the
/// duration of the run.
pub struct PackagingContext {
    provider_folder: PathBuf,
    output_staging_folder: PathBuf,
    output_staging_function_folder: PathBuf,
    output_zip_file: PathBuf,
    log_folder: PathBuf,
    module_package: ModulePackage,
    manifest: ModuleManifest,
    replace_tokens: Substitution,
}

impl fmt::Debug for PackagingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagingContext")
            .field("provider_folder", &self.provider_folder)
            .field("output_staging_folder", &self.output_staging_folder)
            .field("output_zip_file", &self.output_zip_file)
            .finish_non_exhaustive()
    }
}

impl PackagingContext {
    /// Build a context with the default `.publish` layout under
    /// `provider_folder` and `${key}` token substitution.
    pub fn new(
        provider_folder: impl Into<PathBuf>,
        module_package: ModulePackage,
        manifest: ModuleManifest,
    ) -> Self {
        let provider_folder = provider_folder.into();
        let publish = provider_folder.join(PUBLISH_DIR);
        let staging = publish.join("staging");
        let zip_name = format!(
            "{}-{}-{}-{}.zip",
            manifest.namespace(),
            manifest.name(),
            manifest.provider().folder_name(),
            manifest.version()
        );
        let replacer = TokenReplacer::for_manifest(&manifest, &module_package.tokens);

        Self {
            output_staging_function_folder: staging.join("functions"),
            output_staging_folder: staging,
            output_zip_file: publish.join(zip_name),
            log_folder: publish.join("logs"),
            provider_folder,
            module_package,
            manifest,
            replace_tokens: Box::new(move |content| replacer.replace(content)),
        }
    }

    /// Load the definition and package descriptor for `provider` from a
    /// module directory.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is missing or invalid.
    pub fn load(module_dir: &Path, provider: Provider) -> Result<Self, PackagingError> {
        let definition_path = module_dir.join(MODULE_JSON);
        let content = fs::read_to_string(&definition_path).at(&definition_path)?;
        let definition = ModuleDefinition::parse(&content)?;

        let provider_folder = module_dir.join(provider.folder_name());
        let package_path = provider_folder.join(MODULE_PACKAGE_JSON);
        let content = fs::read_to_string(&package_path).at(&package_path)?;
        let module_package =
            ModulePackage::parse(&content).map_err(|source| PackagingError::Descriptor {
                path: package_path,
                source,
            })?;

        let manifest = provider::for_provider(provider).manifest(&definition)?;
        Ok(Self::new(provider_folder, module_package, manifest))
    }

    /// Stage into `folder` instead of `.publish/staging`.
    pub fn with_staging_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.output_staging_folder = folder.into();
        self.output_staging_function_folder = self.output_staging_folder.join("functions");
        self
    }

    /// Write the archive to `path`.
    pub fn with_output_zip_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_zip_file = path.into();
        self
    }

    /// Replace the content transform applied to staged text files.
    pub fn with_token_substitution<F>(mut self, substitute: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.replace_tokens = Box::new(substitute);
        self
    }

    /// Source root of this provider variant.
    pub fn provider_folder(&self) -> &Path {
        &self.provider_folder
    }

    /// Root of the tree that gets archived.
    pub fn output_staging_folder(&self) -> &Path {
        &self.output_staging_folder
    }

    /// Folder function builds write into.
    pub fn output_staging_function_folder(&self) -> &Path {
        &self.output_staging_function_folder
    }

    /// Final archive path.
    pub fn output_zip_file(&self) -> &Path {
        &self.output_zip_file
    }

    /// Folder for per-function build logs (outside the staging tree).
    pub fn log_folder(&self) -> &Path {
        &self.log_folder
    }

    /// Functions and additional files to package.
    pub fn module_package(&self) -> &ModulePackage {
        &self.module_package
    }

    /// Provider-specific manifest written to the staging root.
    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    /// Apply token substitution to text content.
    pub fn replace_tokens(&self, content: &str) -> String {
        (self.replace_tokens)(content)
    }
}

/// Providers with a package descriptor in `module_dir`.
pub fn available_providers(module_dir: &Path) -> Vec<Provider> {
    Provider::ALL
        .into_iter()
        .filter(|p| {
            module_dir
                .join(p.folder_name())
                .join(MODULE_PACKAGE_JSON)
                .is_file()
        })
        .collect()
}
