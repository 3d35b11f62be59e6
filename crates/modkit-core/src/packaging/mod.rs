//! Module packaging pipeline.
//!
//! [`package`] stages a provider variant of a module, builds each function
//! through a [`BuildSystem`], copies additional files, writes the
//! provider-specific `module.json`, and zips the staging tree. On any failure
//! the staging tree is removed and the error is returned.

mod archive;
mod build;
mod context;
mod files;
mod tokens;

pub use archive::PackageOutcome;
pub use build::{BuildSystem, ScriptBuildSystem, copy_dir_all};
pub use context::{PackagingContext, available_providers};
pub use tokens::TokenReplacer;

use std::fs;
use std::path::{Path, PathBuf};

use modkit_schema::{FileSpecError, MODULE_JSON, ManifestError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Invalid additional file spec: {0}")]
    FileSpec(#[from] FileSpecError),

    #[error("Invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid package descriptor {}: {source}", path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid module definition: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Build failed for function '{name}': {source}")]
    Function {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to walk staging tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Attach the offending path to an IO error.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T, PackagingError>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T, PackagingError> {
        self.map_err(|source| PackagingError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Package one provider variant of a module.
///
/// Either a complete archive exists at
/// [`PackagingContext::output_zip_file`] afterwards, or an error is returned
/// and the staging folder has been removed. An archive from a previous run
/// is only replaced once staging has fully succeeded.
///
/// # Errors
///
/// Malformed file specs, bad patterns, IO failures and build failures are
/// all fatal.
pub fn package(
    ctx: &PackagingContext,
    build_system: &dyn BuildSystem,
) -> Result<PackageOutcome, PackagingError> {
    match run(ctx, build_system) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            let staging = ctx.output_staging_folder();
            if let Err(cleanup) = fs::remove_dir_all(staging) {
                if staging.exists() {
                    warn!(
                        "Failed to remove staging folder {}: {cleanup}",
                        staging.display()
                    );
                }
            }
            Err(e)
        }
    }
}

fn run(
    ctx: &PackagingContext,
    build_system: &dyn BuildSystem,
) -> Result<PackageOutcome, PackagingError> {
    let staging = ctx.output_staging_folder();
    if staging.exists() {
        debug!("Clearing {}", staging.display());
        fs::remove_dir_all(staging).at(staging)?;
    }
    let function_folder = ctx.output_staging_function_folder();
    fs::create_dir_all(function_folder).at(function_folder)?;

    let package = ctx.module_package();
    for function in &package.functions {
        info!("Packaging function '{}' ({})", function.name, function.kind);
        build_system
            .package_function(ctx, function)
            .map_err(|e| PackagingError::Function {
                name: function.name.clone(),
                source: e.into(),
            })?;
    }

    for entry in package.files.iter().flatten() {
        files::stage_additional_files(ctx, entry)?;
    }

    let manifest_path = ctx.output_staging_folder().join(MODULE_JSON);
    fs::write(&manifest_path, ctx.manifest().to_json()?).at(&manifest_path)?;

    let zip_path = ctx.output_zip_file();
    if zip_path.exists() {
        fs::remove_file(zip_path).at(zip_path)?;
    }
    if let Some(parent) = zip_path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }

    let outcome = archive::create_archive(ctx.output_staging_folder(), zip_path)?;
    info!(
        "Created {} ({} files, {} bytes)",
        outcome.archive.display(),
        outcome.files,
        outcome.size
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use modkit_schema::{FunctionDescriptor, ModuleDefinition, ModuleManifest, ModulePackage, Provider};
    use std::io::Read;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    /// Writes `<name>.txt` into the function folder and records call order.
    #[derive(Default)]
    struct FakeBuild {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl BuildSystem for FakeBuild {
        fn package_function(
            &self,
            ctx: &PackagingContext,
            function: &FunctionDescriptor,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(function.name.clone());
            if self.fail_on == Some(function.name.as_str()) {
                bail!("compiler exploded");
            }
            fs::write(
                ctx.output_staging_function_folder()
                    .join(format!("{}.txt", function.name)),
                &function.kind,
            )?;
            Ok(())
        }
    }

    const PACKAGE: &str = r#"{
        "functions": [
            {"name": "A", "type": "api"},
            {"name": "B", "type": "worker"}
        ],
        "files": [
            {"src": "assets/**/*.json", "dest": "config", "flatten": true}
        ]
    }"#;

    fn context(dir: &TempDir, package_json: &str) -> PackagingContext {
        let definition = ModuleDefinition::parse(
            r#"{"namespace": "acme", "name": "ingest", "version": "1.2.3", "displayName": "Ingest"}"#,
        )
        .unwrap();
        let manifest = ModuleManifest::from_definition(&definition, Provider::Aws).unwrap();
        let provider = dir.path().join("aws");
        fs::create_dir_all(provider.join("assets/x")).unwrap();
        fs::write(provider.join("assets/x/settings.json"), r#"{"n": "${displayName}"}"#)
            .unwrap();
        fs::write(provider.join("assets/logo.bin"), b"${name}").unwrap();
        PackagingContext::new(provider, ModulePackage::parse(package_json).unwrap(), manifest)
    }

    fn zip_entries(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_scenario_functions_in_order_and_files_flattened() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, PACKAGE);
        let build = FakeBuild::default();

        let outcome = package(&ctx, &build).unwrap();

        assert_eq!(*build.calls.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(outcome.archive, ctx.output_zip_file());
        assert!(ctx.output_zip_file().ends_with("acme-ingest-aws-1.2.3.zip"));

        let staging = ctx.output_staging_folder();
        assert_eq!(
            fs::read_to_string(staging.join("config/settings.json")).unwrap(),
            r#"{"n": "Ingest"}"#
        );
        assert!(!staging.join("config/x").exists());
        assert!(!staging.join("config/logo.bin").exists());

        assert_eq!(
            zip_entries(ctx.output_zip_file()),
            vec![
                "config/",
                "config/settings.json",
                "functions/",
                "functions/A.txt",
                "functions/B.txt",
                "module.json",
            ]
        );

        let mut archive = zip::ZipArchive::new(fs::File::open(ctx.output_zip_file()).unwrap()).unwrap();
        let mut manifest = String::new();
        archive
            .by_name("module.json")
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        assert!(manifest.contains("\"provider\": \"AWS\""));
        assert!(manifest.contains("\"displayName\": \"Ingest\""));
        assert!(!manifest.contains("\"icon\""));
    }

    #[test]
    fn test_stale_function_output_is_cleared() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, PACKAGE);
        fs::create_dir_all(ctx.output_staging_function_folder()).unwrap();
        fs::write(ctx.output_staging_function_folder().join("old.txt"), "stale").unwrap();

        package(&ctx, &FakeBuild::default()).unwrap();
        assert!(!ctx.output_staging_function_folder().join("old.txt").exists());
    }

    #[test]
    fn test_files_from_previous_run_are_not_archived() {
        let dir = tempdir().unwrap();
        let first = context(&dir, r#"{"functions": [], "files": ["assets/x/*.json"]}"#);
        package(&first, &FakeBuild::default()).unwrap();
        assert!(zip_entries(first.output_zip_file()).contains(&"assets/x/settings.json".to_string()));

        let second = context(&dir, r#"{"functions": [], "files": []}"#);
        package(&second, &FakeBuild::default()).unwrap();

        assert_eq!(
            zip_entries(second.output_zip_file()),
            vec!["functions/", "module.json"]
        );
        assert!(!second.output_staging_folder().join("assets").exists());
    }

    #[test]
    fn test_src_outside_provider_folder_fails() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, r#"{"functions": [], "files": ["../shared/*.json"]}"#);
        fs::create_dir_all(dir.path().join("shared")).unwrap();
        fs::write(dir.path().join("shared/common.json"), "{}").unwrap();

        let err = package(&ctx, &FakeBuild::default()).unwrap_err();
        assert!(matches!(
            err,
            PackagingError::FileSpec(FileSpecError::UnsafeSrc(_))
        ));
        assert!(!ctx.output_zip_file().exists());
        assert!(!ctx.provider_folder().join(".publish/shared").exists());
    }

    #[test]
    fn test_existing_archive_replaced_on_success() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, PACKAGE);
        fs::create_dir_all(ctx.output_zip_file().parent().unwrap()).unwrap();
        fs::write(ctx.output_zip_file(), "previous").unwrap();

        package(&ctx, &FakeBuild::default()).unwrap();
        assert_ne!(fs::read(ctx.output_zip_file()).unwrap(), b"previous");
        assert!(zip_entries(ctx.output_zip_file()).contains(&"module.json".to_string()));
    }

    #[test]
    fn test_build_failure_keeps_archive_and_removes_staging() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, PACKAGE);
        fs::create_dir_all(ctx.output_zip_file().parent().unwrap()).unwrap();
        fs::write(ctx.output_zip_file(), "previous").unwrap();

        let build = FakeBuild {
            fail_on: Some("B"),
            ..FakeBuild::default()
        };
        let err = package(&ctx, &build).unwrap_err();

        assert!(matches!(err, PackagingError::Function { ref name, .. } if name == "B"));
        assert!(err.to_string().contains("compiler exploded"));
        assert_eq!(*build.calls.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(fs::read(ctx.output_zip_file()).unwrap(), b"previous");
        assert!(!ctx.output_staging_folder().exists());
    }

    #[test]
    fn test_malformed_file_spec_fails_without_archive() {
        let dir = tempdir().unwrap();
        let ctx = context(
            &dir,
            r#"{"functions": [{"name": "A", "type": "api"}], "files": [42]}"#,
        );

        let err = package(&ctx, &FakeBuild::default()).unwrap_err();
        assert!(matches!(err, PackagingError::FileSpec(_)));
        assert!(!ctx.output_zip_file().exists());
        assert!(!ctx.output_staging_folder().exists());
    }

    #[test]
    fn test_missing_src_fails() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, r#"{"functions": [], "files": [{"dest": "config"}]}"#);

        let err = package(&ctx, &FakeBuild::default()).unwrap_err();
        assert!(matches!(
            err,
            PackagingError::FileSpec(FileSpecError::MissingSrc)
        ));
        assert!(!ctx.output_staging_folder().exists());
    }

    #[test]
    fn test_packaging_is_idempotent() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, PACKAGE);

        let first = package(&ctx, &FakeBuild::default()).unwrap();
        let manifest_first =
            fs::read(ctx.output_staging_folder().join(MODULE_JSON)).unwrap();
        let second = package(&ctx, &FakeBuild::default()).unwrap();
        let manifest_second =
            fs::read(ctx.output_staging_folder().join(MODULE_JSON)).unwrap();

        assert_eq!(manifest_first, manifest_second);
        assert_eq!(first.sha256, second.sha256);
        assert_eq!(first.files, second.files);
    }

    #[test]
    fn test_no_functions_no_files() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir, r#"{"functions": []}"#);

        let outcome = package(&ctx, &FakeBuild::default()).unwrap();
        assert_eq!(outcome.files, 1);
        assert_eq!(
            zip_entries(ctx.output_zip_file()),
            vec!["functions/", "module.json"]
        );
    }
}
