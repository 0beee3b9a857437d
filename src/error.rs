//! Error types for the pack-check CLI.
//!
//! Every variant here is fatal for the current run: nothing is retried, and
//! the binary reports the message once before exiting. Declared files that
//! are missing from the tarball are not errors; they surface as a failed
//! [`crate::reconcile::Outcome`] instead.

use crate::archive::ArchiveError;
use crate::config::ConfigError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can abort a pack-check run.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The packer exited unsuccessfully.
    #[error("`{program} pack` failed with {}", describe_exit(.code))]
    PackFailed {
        /// Program that was invoked.
        program: String,
        /// Exit code, or `None` when the process was killed by a signal.
        code: Option<i32>,
    },

    /// The packer succeeded but its standard output was not a single
    /// newline-terminated file name.
    #[error("unexpected output from `{program} pack`: {reason}")]
    UnexpectedPackOutput {
        /// Program that was invoked.
        program: String,
        /// Description of what was wrong with the output.
        reason: String,
    },

    /// The tarball could not be read or had an unexpected layout.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A directory argument could not be resolved.
    #[error("directory {path} is unusable: {reason}")]
    InvalidDirectory {
        /// The offending path.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// The finished tarball could not be moved into the output directory.
    #[error("failed to move {from} to {to}: {source}")]
    Finalize {
        /// Location of the tarball inside the working directory.
        from: Utf8PathBuf,
        /// Requested destination.
        to: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write a status message or the archive name.
    #[error("failed to write output: {source}")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl CheckError {
    /// Process exit code the binary should use for this error.
    ///
    /// A failing packer propagates its own exit code; everything else maps
    /// to `1`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pack_check::error::CheckError;
    ///
    /// let err = CheckError::PackFailed { program: "npm".to_owned(), code: Some(243) };
    /// assert_eq!(err.exit_code(), 243);
    /// ```
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PackFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || "termination by signal".to_owned(),
        |code| format!("exit code {code}"),
    )
}

/// Result type alias using [`CheckError`].
pub type Result<T> = std::result::Result<T, CheckError>;
