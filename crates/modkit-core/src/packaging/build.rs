//! Per-function builds.
//!
//! [`BuildSystem`] is the contract the pipeline delegates each function to.
//! [`ScriptBuildSystem`] is the stock implementation: every function entry
//! in `module-package.json` names a shell `command` and, optionally, the
//! `output` it produces.
//!
//! ## Environment contract
//!
//! | Variable | Value |
//! |---|---|
//! | `MODKIT_FUNCTION_NAME` | Function name |
//! | `MODKIT_FUNCTION_TYPE` | Function type |
//! | `MODKIT_STAGING_DIR` | Absolute staging root |
//! | `MODKIT_FUNCTION_DIR` | Absolute function staging folder |
//!
//! The command runs with the provider folder as its working directory.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use modkit_schema::FunctionDescriptor;
use tracing::debug;

use super::context::PackagingContext;

/// Lines of build log shown when a command fails.
const LOG_TAIL_LINES: usize = 20;

/// Produces one function's build output inside the staging tree.
pub trait BuildSystem: Send + Sync {
    /// Build `function` and place its output under
    /// [`PackagingContext::output_staging_function_folder`].
    ///
    /// # Errors
    ///
    /// Any error aborts the packaging run.
    fn package_function(&self, ctx: &PackagingContext, function: &FunctionDescriptor)
    -> Result<()>;
}

/// Runs each function's `command` through the platform shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptBuildSystem {
    verbose: bool,
}

impl ScriptBuildSystem {
    /// Create a build system. With `verbose`, command output streams to the
    /// terminal instead of the function's log file.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl BuildSystem for ScriptBuildSystem {
    fn package_function(
        &self,
        ctx: &PackagingContext,
        function: &FunctionDescriptor,
    ) -> Result<()> {
        let script = function.parameter_str("command").with_context(|| {
            format!(
                "Function '{}' has no 'command' build parameter",
                function.name
            )
        })?;

        fs::create_dir_all(ctx.log_folder()).context("Failed to create build log folder")?;
        let log_path = ctx.log_folder().join(format!("{}.log", function.name));

        let mut cmd = shell(script);
        cmd.current_dir(ctx.provider_folder())
            .env("MODKIT_FUNCTION_NAME", &function.name)
            .env("MODKIT_FUNCTION_TYPE", &function.kind)
            .env("MODKIT_STAGING_DIR", absolute(ctx.output_staging_folder()))
            .env(
                "MODKIT_FUNCTION_DIR",
                absolute(ctx.output_staging_function_folder()),
            );

        debug!("Running build command for '{}': {script}", function.name);

        let status = if self.verbose {
            cmd.status().context("Failed to execute build command")?
        } else {
            let log_file =
                fs::File::create(&log_path).context("Failed to create build log file")?;
            cmd.stdout(Stdio::from(log_file.try_clone()?))
                .stderr(Stdio::from(log_file))
                .status()
                .context("Failed to execute build command")?
        };

        if !status.success() {
            let tail = if self.verbose {
                String::new()
            } else {
                read_last_lines(&log_path, LOG_TAIL_LINES)
                    .map(|tail| format!("\nLast {LOG_TAIL_LINES} lines:\n{tail}\nFull log: {}", log_path.display()))
                    .unwrap_or_default()
            };
            bail!(
                "Build command for '{}' failed with exit code: {:?}{tail}",
                function.name,
                status.code()
            );
        }

        if let Some(output) = function.parameter_str("output") {
            collect_output(ctx, function, output)?;
        }

        Ok(())
    }
}

fn shell(script: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(script);
        cmd
    } else {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(script);
        cmd
    }
}

fn absolute(path: &Path) -> std::path::PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Copy a function's build output into the function staging folder:
/// a file becomes `<name>.<ext>`, a directory becomes `<name>/`.
fn collect_output(ctx: &PackagingContext, function: &FunctionDescriptor, output: &str) -> Result<()> {
    let src = ctx.provider_folder().join(output);
    let function_folder = ctx.output_staging_function_folder();

    if src.is_dir() {
        let dest = function_folder.join(&function.name);
        if dest.exists() {
            fs::remove_dir_all(&dest)?;
        }
        fs::create_dir_all(&dest)?;
        copy_dir_all(&src, &dest)
    } else if src.is_file() {
        let file_name = match src.extension() {
            Some(ext) => format!("{}.{}", function.name, ext.to_string_lossy()),
            None => function.name.clone(),
        };
        fs::copy(&src, function_folder.join(file_name))
            .with_context(|| format!("Failed to copy build output {}", src.display()))?;
        Ok(())
    } else {
        bail!(
            "Build output '{}' for function '{}' does not exist",
            src.display(),
            function.name
        )
    }
}

/// Recursively copy a directory tree from `src` to `dst`.
///
/// # Errors
///
/// Returns an error if any file or directory cannot be copied.
pub fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )
    .map_err(|e| anyhow::anyhow!("Copy failed: {e}"))?;
    Ok(())
}

/// Read the last N lines of a build log without loading all of it.
fn read_last_lines(path: &Path, n: usize) -> Result<String> {
    use std::io::{Read, Seek, SeekFrom};

    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = fs::File::open(path)?;
    let file_len = file.metadata()?.len();

    let seek_pos = file_len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    let buffer = String::from_utf8_lossy(&buffer);

    // A mid-file seek lands inside a line; drop it.
    let content = if seek_pos > 0 {
        buffer.find('\n').map_or(&*buffer, |idx| &buffer[idx + 1..])
    } else {
        &buffer
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}
