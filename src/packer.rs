//! Invocation of the packaging tool.
//!
//! `npm pack` is run once with the package directory as its argument and
//! the scratch directory as its working directory. On success it leaves one
//! tarball there and prints the tarball's file name on stdout.

use crate::error::{CheckError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::process::{Command, Output, Stdio};

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs `cmd` with `args` in `cwd` and returns the captured output.
    ///
    /// Standard error is passed through to the user rather than captured.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    fn run<'a>(&self, cmd: &str, args: &[&'a str], cwd: &Utf8Path) -> Result<Output>;
}

/// Executes commands on the host system.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use pack_check::packer::{CommandExecutor, SystemCommandExecutor};
///
/// let executor = SystemCommandExecutor;
/// let output = executor.run("npm", &["--version"], Utf8Path::new("."))?;
/// assert!(output.status.success());
/// # Ok::<(), pack_check::error::CheckError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str], cwd: &Utf8Path) -> Result<Output> {
        Command::new(cmd)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(CheckError::from)
    }
}

/// The tarball left behind by a successful pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArchive {
    /// File name as printed by the packer.
    pub file_name: String,
    /// Full path inside the working directory.
    pub path: Utf8PathBuf,
}

/// Packs `source_dir` into `work_dir` using `program`.
///
/// # Errors
///
/// Returns [`CheckError::PackFailed`] when the packer exits unsuccessfully,
/// [`CheckError::UnexpectedPackOutput`] when its stdout is not a single file
/// name, and I/O errors from spawning it.
pub fn pack(
    executor: &dyn CommandExecutor,
    program: &str,
    source_dir: &Utf8Path,
    work_dir: &Utf8Path,
) -> Result<PackedArchive> {
    info!("packing {source_dir} with `{program} pack`");
    let output = executor.run(
        program,
        &["pack", "--color=always", "--", source_dir.as_str()],
        work_dir,
    )?;

    if !output.status.success() {
        return Err(CheckError::PackFailed {
            program: program.to_owned(),
            code: output.status.code(),
        });
    }

    let file_name =
        archive_name_from_stdout(&output.stdout).map_err(|reason| CheckError::UnexpectedPackOutput {
            program: program.to_owned(),
            reason,
        })?;
    let path = work_dir.join(&file_name);
    debug!("packer produced {path}");

    Ok(PackedArchive { file_name, path })
}

/// Extracts the tarball file name from the packer's stdout.
///
/// The output must be exactly one newline-terminated line naming a file in
/// the working directory.
///
/// # Errors
///
/// Returns a description of the problem when the output is not UTF-8, lacks
/// the line terminator, is empty, or spans several lines or directories.
///
/// # Examples
///
/// ```
/// use pack_check::packer::archive_name_from_stdout;
///
/// assert_eq!(archive_name_from_stdout(b"demo-1.0.0.tgz\n").as_deref(), Ok("demo-1.0.0.tgz"));
/// assert!(archive_name_from_stdout(b"demo-1.0.0.tgz").is_err());
/// ```
pub fn archive_name_from_stdout(stdout: &[u8]) -> std::result::Result<String, String> {
    let text = std::str::from_utf8(stdout).map_err(|_| "output is not valid UTF-8".to_owned())?;
    let name = text
        .strip_suffix('\n')
        .ok_or_else(|| "expected a line terminator".to_owned())?;

    if name.is_empty() {
        return Err("empty file name".to_owned());
    }
    if name.contains('\n') {
        return Err(format!("expected one line, got {}", name.lines().count()));
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(format!("{name:?} is not a plain file name"));
    }

    Ok(name.to_owned())
}
