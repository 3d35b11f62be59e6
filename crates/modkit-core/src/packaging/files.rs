//! Additional-file staging: glob, copy, and token substitution.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::MatchOptions;
use modkit_schema::AdditionalFileSpec;
use serde_json::Value;
use tracing::{debug, info};

use super::context::PackagingContext;
use super::{IoResultExt, PackagingError};
use crate::paths::PUBLISH_DIR;

/// Extensions treated as text and passed through token substitution.
const TEXT_FILE_EXTS: [&str; 9] = [
    "tf", "json", "yaml", "txt", "xml", "config", "html", "md", "ini",
];

/// Resolve one raw `files` entry and stage every file it matches.
///
/// Returns the number of files staged.
pub(crate) fn stage_additional_files(
    ctx: &PackagingContext,
    entry: &Value,
) -> Result<usize, PackagingError> {
    let spec = AdditionalFileSpec::from_value(entry)?;
    let matches = match_files(ctx.provider_folder(), spec.src())?;

    let dest_root = ctx.output_staging_folder().join(spec.dest());
    fs::create_dir_all(&dest_root).at(&dest_root)?;

    info!(
        "Copying files matching pattern '{}' in {} to {}",
        spec.src(),
        ctx.provider_folder().display(),
        dest_root.display()
    );

    for rel in &matches {
        let src_path = ctx.provider_folder().join(rel);
        let dest_path = if spec.flatten() {
            match rel.file_name() {
                Some(name) => dest_root.join(name),
                None => continue,
            }
        } else {
            dest_root.join(rel)
        };

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        if is_text_file(&src_path) {
            debug!("Replacing tokens in {}", src_path.display());
            let content = read_text(&src_path)?;
            fs::write(&dest_path, ctx.replace_tokens(&content)).at(&dest_path)?;
        } else {
            debug!("Copying {} to {}", src_path.display(), dest_path.display());
            fs::copy(&src_path, &dest_path).at(&dest_path)?;
        }
    }

    Ok(matches.len())
}

/// Files under `root` matching `pattern`, as sorted paths relative to
/// `root`. Anything under the `.publish` folder is excluded.
pub(crate) fn match_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, PackagingError> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let full_pattern = format!(
        "{}/{}",
        escaped_root.trim_end_matches(['/', '\\']),
        pattern.trim_start_matches("./")
    );

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let paths = glob::glob_with(&full_pattern, options).map_err(|source| {
        PackagingError::Pattern {
            pattern: pattern.to_string(),
            source,
        }
    })?;

    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            PackagingError::Io {
                path,
                source: e.into(),
            }
        })?;
        if !path.is_file() {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            debug!("Skipping {} outside {}", path.display(), root.display());
            continue;
        }
        if is_published(rel) {
            continue;
        }
        matches.push(rel.to_path_buf());
    }

    matches.sort();
    matches.dedup();
    Ok(matches)
}

/// Text content of `path`, minus any UTF-8 byte order mark. Invalid UTF-8
/// sequences decode to U+FFFD.
fn read_text(path: &Path) -> Result<String, PackagingError> {
    const BOM: &[u8] = b"\xEF\xBB\xBF";
    let bytes = fs::read(path).at(path)?;
    let content = bytes.strip_prefix(BOM).unwrap_or(&bytes[..]);
    Ok(String::from_utf8_lossy(content).into_owned())
}

fn is_published(rel: &Path) -> bool {
    matches!(rel.components().next(), Some(Component::Normal(first)) if first == PUBLISH_DIR)
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_FILE_EXTS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
}
