//! Shared test utilities: fixture tarballs and a scripted command executor.

use crate::error::{CheckError, Result};
use crate::packer::CommandExecutor;
use camino::Utf8Path;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn success_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given exit code.
#[must_use]
pub fn failure_output(code: i32) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// One entry of a fixture tarball.
#[derive(Debug, Clone)]
pub struct FixtureEntry {
    /// Raw entry name, including any root directory.
    pub name: String,
    /// File contents; `None` for a directory entry.
    pub contents: Option<Vec<u8>>,
}

impl FixtureEntry {
    /// A regular file with UTF-8 contents.
    #[must_use]
    pub fn file(name: &str, contents: &str) -> Self {
        Self::bytes(name, contents.as_bytes())
    }

    /// A regular file with arbitrary contents.
    #[must_use]
    pub fn bytes(name: &str, contents: &[u8]) -> Self {
        Self {
            name: name.to_owned(),
            contents: Some(contents.to_vec()),
        }
    }

    /// A directory entry.
    #[must_use]
    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            contents: None,
        }
    }
}

/// Builds an in-memory tarball, gzip-compressed when `gzip` is set.
///
/// # Panics
///
/// Panics if an entry cannot be appended; fixture names are expected to be
/// valid tar paths.
#[must_use]
pub fn tarball(entries: &[FixtureEntry], gzip: bool) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match &entry.contents {
            Some(contents) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(contents.len() as u64);
                builder
                    .append_data(&mut header, &entry.name, contents.as_slice())
                    .expect("append fixture file");
            }
            None => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder
                    .append_data(&mut header, &entry.name, std::io::empty())
                    .expect("append fixture directory");
            }
        }
    }
    let tar_bytes = builder.into_inner().expect("finish tar stream");
    if !gzip {
        return tar_bytes;
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).expect("compress fixture");
    encoder.finish().expect("finish gzip stream")
}

/// Builds a gzip tarball laid out like `npm pack` output: every file under
/// `package/`.
#[must_use]
pub fn npm_tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let entries: Vec<FixtureEntry> = files
        .iter()
        .map(|(name, contents)| FixtureEntry::file(&format!("package/{name}"), contents))
        .collect();
    tarball(&entries, true)
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "npm").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// Bytes written as `<cwd>/<name>` before returning, simulating the
    /// tarball a packer leaves behind.
    pub writes: Option<(String, Vec<u8>)>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without spawning npm.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str], cwd: &Utf8Path) -> Result<Output> {
        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CheckError::StubMismatch {
                message: format!("unexpected invocation of {cmd} {args:?}"),
            })?;

        if call.cmd != cmd || call.args != args {
            return Err(CheckError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {cmd} {args:?}",
                    call.cmd, call.args
                ),
            });
        }

        if let Some((name, bytes)) = call.writes {
            std::fs::write(cwd.join(name), bytes)?;
        }

        call.result
    }
}
