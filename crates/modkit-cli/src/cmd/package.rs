//! Package command: build and archive provider variants of a module
use std::path::Path;

use anyhow::{Context, Result, bail};
use modkit_core::packaging::{self, PackagingContext, ScriptBuildSystem, available_providers};
use modkit_schema::{MODULE_PACKAGE_JSON, Provider};
use tracing::debug;

/// Package `module_dir` for each provider, or for every provider folder
/// that has a package descriptor when none are given.
pub fn package(module_dir: &Path, providers: &[Provider], verbose: bool) -> Result<()> {
    let providers = if providers.is_empty() {
        available_providers(module_dir)
    } else {
        providers.to_vec()
    };

    if providers.is_empty() {
        bail!(
            "No provider folder with a {MODULE_PACKAGE_JSON} found in {}",
            module_dir.display()
        );
    }

    debug!(
        "Providers to package in {}: {:?}",
        module_dir.display(),
        providers
    );
    let build_system = ScriptBuildSystem::new(verbose);

    for provider in providers {
        let ctx = PackagingContext::load(module_dir, provider)
            .with_context(|| format!("Failed to load the {provider} package"))?;

        println!(
            "Packaging {}/{} {} for {provider}",
            ctx.manifest().namespace(),
            ctx.manifest().name(),
            ctx.manifest().version()
        );

        let outcome = packaging::package(&ctx, &build_system)
            .with_context(|| format!("Failed to package for {provider}"))?;

        println!("  {}", outcome.archive.display());
        println!("  {} files, {} bytes", outcome.files, outcome.size);
        println!("  sha256 {}", outcome.sha256);
    }

    Ok(())
}
