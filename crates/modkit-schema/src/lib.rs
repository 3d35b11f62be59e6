//! Shared types for modkit module packages.
//!
//! Everything here is pure data: the provider-agnostic module definition,
//! the provider-specific manifest that ends up in `module.json`, and the
//! package descriptor (`module-package.json`) that drives packaging.

pub mod manifest;
pub mod package;
pub mod provider;

// Re-exports
pub use manifest::{ManifestError, ModuleDefinition, ModuleManifest};
pub use package::{AdditionalFileSpec, FileSpecError, FunctionDescriptor, ModulePackage};
pub use provider::{Provider, ProviderParseError};

/// File name of the provider-agnostic module definition at the module root,
/// and of the provider-specific manifest at the staging root.
pub const MODULE_JSON: &str = "module.json";

/// File name of the package descriptor inside each provider folder.
pub const MODULE_PACKAGE_JSON: &str = "module-package.json";
