//! Zip archiving of the staging tree.
//!
//! Entries are added in file-name order with a fixed timestamp, so packaging
//! identical inputs yields byte-identical archives.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{IoResultExt, PackagingError};

/// Result of a successful packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    /// Path of the written archive.
    pub archive: PathBuf,
    /// Hex SHA-256 digest of the archive.
    pub sha256: String,
    /// Archive size in bytes.
    pub size: u64,
    /// Number of file entries (directories excluded).
    pub files: usize,
}

/// Zip `src_dir` into `zip_path`. A partially written archive is removed
/// on failure.
pub(crate) fn create_archive(
    src_dir: &Path,
    zip_path: &Path,
) -> Result<PackageOutcome, PackagingError> {
    let files = match write_archive(src_dir, zip_path) {
        Ok(files) => files,
        Err(e) => {
            let _ = fs::remove_file(zip_path);
            return Err(e);
        }
    };

    let (sha256, size) = digest(zip_path)?;
    Ok(PackageOutcome {
        archive: zip_path.to_path_buf(),
        sha256,
        size,
        files,
    })
}

fn write_archive(src_dir: &Path, zip_path: &Path) -> Result<usize, PackagingError> {
    let file = File::create(zip_path).at(zip_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let mut files = 0;
    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if path == zip_path {
            continue;
        }
        let Ok(rel) = path.strip_prefix(src_dir) else {
            continue;
        };
        let name = entry_name(rel);

        if entry.file_type().is_dir() {
            zip.add_directory(name, entry_options(0o755))?;
            continue;
        }

        zip.start_file(name, entry_options(file_mode(&entry.metadata()?)))?;
        let mut src = File::open(path).at(path)?;
        std::io::copy(&mut src, &mut zip).at(path)?;
        files += 1;
    }

    let mut writer = zip.finish()?;
    writer.flush().at(zip_path)?;
    Ok(files)
}

fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(mode)
}

/// Archive entry name: relative path with `/` separators.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}

fn digest(path: &Path) -> Result<(String, u64), PackagingError> {
    let mut file = File::open(path).at(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let count = file.read(&mut buffer).at(path)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
        size += count as u64;
    }
    Ok((hex::encode(hasher.finalize()), size))
}
