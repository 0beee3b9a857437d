//! Pack-and-verify pipeline.
//!
//! One run packs the package into a scratch directory, reads the tarball
//! once, reconciles it, prints the status block, and on success moves the
//! tarball into the output directory. The scratch directory is a
//! [`tempfile::TempDir`] and is removed on every exit path.

use crate::archive::read_package_file;
use crate::config::CheckConfig;
use crate::error::{CheckError, Result};
use crate::output::render_report;
use crate::packer::{CommandExecutor, pack};
use crate::reconcile::{Outcome, ValidationReport, reconcile};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::io::Write;

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The tarball was moved to `archive`; `report` may still carry warnings.
    Finalized {
        /// Final location of the tarball.
        archive: Utf8PathBuf,
        /// The validation report.
        report: ValidationReport,
    },
    /// Declared files were missing; no tarball was kept.
    Rejected {
        /// The validation report.
        report: ValidationReport,
    },
}

impl CheckOutcome {
    /// The validation report for the run.
    #[must_use]
    pub const fn report(&self) -> &ValidationReport {
        match self {
            Self::Finalized { report, .. } | Self::Rejected { report } => report,
        }
    }

    /// Process exit code for the run.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Finalized { .. } => 0,
            Self::Rejected { report } => report.outcome().exit_code(),
        }
    }
}

/// Runs the full check described by `config`.
///
/// The status block is written to `stderr`; on success the tarball's file
/// name is written to `stdout` on its own line.
///
/// # Errors
///
/// Returns a [`CheckError`] when the scratch directory cannot be created,
/// the packer fails or misbehaves, the tarball is malformed, the tarball
/// cannot be moved, or writing output fails. Missing declared files are not
/// an error; they yield [`CheckOutcome::Rejected`].
pub fn run_check(
    config: &CheckConfig,
    executor: &dyn CommandExecutor,
    stderr: &mut dyn Write,
    stdout: &mut dyn Write,
) -> Result<CheckOutcome> {
    let scratch = tempfile::Builder::new().prefix("pack-check-").tempdir()?;
    let work_dir = Utf8Path::from_path(scratch.path()).ok_or_else(|| {
        CheckError::InvalidDirectory {
            path: Utf8PathBuf::from(scratch.path().to_string_lossy().into_owned()),
            reason: "temporary directory is not valid UTF-8".to_owned(),
        }
    })?;
    debug!("working directory {work_dir}");

    let packed = pack(executor, &config.packer, &config.source_dir, work_dir)?;
    let contents = read_package_file(packed.path.as_std_path(), &config.archive_root)?;
    info!(
        "{}: {} file(s), {} relative require(s)",
        contents.manifest.label(),
        contents.entries.len(),
        contents.dependencies.len()
    );

    let report = reconcile(&contents.manifest, &contents.entries, &contents.dependencies)
        .without_allowed(&config.allow_unresolved);

    stderr
        .write_all(render_report(&report, config.color).as_bytes())
        .map_err(|source| CheckError::WriteFailed { source })?;

    match report.outcome() {
        Outcome::Failed => {
            warn!(
                "{} declared file(s) missing; discarding {}",
                report.missing_declared.len(),
                packed.file_name
            );
            return Ok(CheckOutcome::Rejected { report });
        }
        Outcome::Warned => warn!("{} require target(s) not found", report.unresolved.len()),
        Outcome::Passed => {}
    }

    let archive = finalize(&packed.path, &config.output_dir.join(&packed.file_name))?;
    writeln!(stdout, "{}", packed.file_name)
        .map_err(|source| CheckError::WriteFailed { source })?;

    Ok(CheckOutcome::Finalized { archive, report })
}

/// Moves the tarball from the scratch directory to `destination`,
/// replacing any existing file.
///
/// Falls back to copy-and-delete when the two paths are on different file
/// systems.
fn finalize(from: &Utf8Path, destination: &Utf8Path) -> Result<Utf8PathBuf> {
    move_file(from, destination, |src, dst| std::fs::rename(src, dst))
}

fn move_file(
    from: &Utf8Path,
    destination: &Utf8Path,
    rename: impl FnOnce(&Utf8Path, &Utf8Path) -> std::io::Result<()>,
) -> Result<Utf8PathBuf> {
    let to_error = |source| CheckError::Finalize {
        from: from.to_owned(),
        to: destination.to_owned(),
        source,
    };

    if let Err(err) = rename(from, destination) {
        debug!("rename failed ({err}); copying instead");
        std::fs::copy(from, destination).map_err(to_error)?;
        std::fs::remove_file(from).map_err(to_error)?;
    }
    info!("wrote {destination}");
    Ok(destination.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::MockCommandExecutor;
    use crate::test_utils::{failure_output, npm_tarball, success_output};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Dirs {
        _root: TempDir,
        source: Utf8PathBuf,
        output: Utf8PathBuf,
    }

    #[fixture]
    fn dirs() -> Dirs {
        let root = TempDir::new().expect("temp dir creation succeeds");
        let base = Utf8PathBuf::try_from(root.path().to_path_buf()).expect("UTF-8 temp dir");
        let source = base.join("pkg");
        let output = base.join("out");
        std::fs::create_dir_all(&source).expect("create source");
        std::fs::create_dir_all(&output).expect("create output");
        Dirs {
            _root: root,
            source,
            output,
        }
    }

    fn packing(tarball: Vec<u8>) -> MockCommandExecutor {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .times(1)
            .returning(move |_, _, cwd| {
                std::fs::write(cwd.join("demo-1.0.0.tgz"), &tarball)?;
                Ok(success_output("demo-1.0.0.tgz\n"))
            });
        executor
    }

    fn run(
        config: &CheckConfig,
        executor: &MockCommandExecutor,
    ) -> (Result<CheckOutcome>, String, String) {
        let mut stderr = Vec::new();
        let mut stdout = Vec::new();
        let result = run_check(config, executor, &mut stderr, &mut stdout);
        (
            result,
            String::from_utf8(stderr).expect("stderr is UTF-8"),
            String::from_utf8(stdout).expect("stdout is UTF-8"),
        )
    }

    fn config(dirs: &Dirs) -> CheckConfig {
        let mut config = CheckConfig::new(dirs.source.clone(), dirs.output.clone());
        config.color = false;
        config
    }

    #[rstest]
    fn clean_package_is_finalized(dirs: Dirs) {
        let executor = packing(npm_tarball(&[
            ("package.json", r#"{"files":["index.js","lib/foo.js"]}"#),
            ("index.js", "require('./lib/foo');"),
            ("lib/foo.js", ""),
        ]));

        let (result, stderr, stdout) = run(&config(&dirs), &executor);
        let outcome = result.expect("run succeeds");

        assert_eq!(stdout, "demo-1.0.0.tgz\n");
        assert!(stderr.contains("no missing files"));
        assert_eq!(outcome.exit_code(), 0);
        assert!(dirs.output.join("demo-1.0.0.tgz").is_file());
    }

    #[rstest]
    fn unresolved_require_warns_but_finalizes(dirs: Dirs) {
        let executor = packing(npm_tarball(&[
            ("package.json", r#"{"files":["lib/bar.js"]}"#),
            ("lib/bar.js", "require('./missing');"),
        ]));

        let (result, stderr, stdout) = run(&config(&dirs), &executor);
        let outcome = result.expect("run succeeds");

        assert!(stderr.contains("potentially missing:\n    - lib/missing.js"));
        assert_eq!(stdout, "demo-1.0.0.tgz\n");
        assert_eq!(outcome.exit_code(), 0);
        assert!(outcome.report().unresolved.contains("lib/missing.js"));
        assert!(dirs.output.join("demo-1.0.0.tgz").is_file());
    }

    #[rstest]
    fn missing_declared_file_rejects_tarball(dirs: Dirs) {
        let executor = packing(npm_tarball(&[
            ("package.json", r#"{"files":["a.js","b.js"]}"#),
            ("a.js", ""),
        ]));

        let (result, stderr, stdout) = run(&config(&dirs), &executor);
        let outcome = result.expect("run completes");

        assert_eq!(outcome.report().missing_declared, vec!["b.js"]);
        assert_eq!(outcome.exit_code(), 1);
        assert!(stderr.contains("missing:\n    - b.js"));
        assert!(stdout.is_empty());
        assert!(!dirs.output.join("demo-1.0.0.tgz").exists());
    }

    #[rstest]
    fn allowed_unresolved_paths_pass(dirs: Dirs) {
        let executor = packing(npm_tarball(&[
            ("package.json", r#"{"files":[]}"#),
            ("index.js", "require('./build/addon');"),
        ]));
        let mut config = config(&dirs);
        config.allow_unresolved.insert("build/addon.js".to_owned());

        let (result, stderr, _) = run(&config, &executor);
        assert!(result.expect("run succeeds").report().unresolved.is_empty());
        assert!(stderr.contains("no missing files"));
    }

    #[rstest]
    fn existing_output_is_overwritten(dirs: Dirs) {
        std::fs::write(dirs.output.join("demo-1.0.0.tgz"), b"stale").expect("seed stale file");
        let tarball = npm_tarball(&[("package.json", "{}")]);
        let executor = packing(tarball.clone());

        let (result, _, _) = run(&config(&dirs), &executor);
        result.expect("run succeeds");

        let written = std::fs::read(dirs.output.join("demo-1.0.0.tgz")).expect("read output");
        assert_eq!(written, tarball);
    }

    #[rstest]
    fn packer_failure_aborts_before_reading(dirs: Dirs) {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .returning(|_, _, _| Ok(failure_output(2)));

        let (result, stderr, stdout) = run(&config(&dirs), &executor);
        let err = result.expect_err("packer failure is fatal");

        assert_eq!(err.exit_code(), 2);
        assert!(stderr.is_empty());
        assert!(stdout.is_empty());
    }

    #[rstest]
    fn unexpected_layout_is_fatal(dirs: Dirs) {
        let executor = packing(crate::test_utils::tarball(
            &[crate::test_utils::FixtureEntry::file("other/package.json", "{}")],
            true,
        ));

        let (result, _, stdout) = run(&config(&dirs), &executor);
        let err = result.expect_err("layout is rejected");
        assert!(matches!(err, CheckError::Archive(_)));
        assert!(stdout.is_empty());
    }

    #[rstest]
    fn finalize_replaces_destination(dirs: Dirs) {
        let from = dirs.source.join("a.tgz");
        let to = dirs.output.join("a.tgz");
        std::fs::write(&from, b"new").expect("write source");
        std::fs::write(&to, b"old").expect("write destination");

        let written = finalize(&from, &to).expect("finalize succeeds");

        assert_eq!(written, to);
        assert_eq!(std::fs::read(&to).expect("read"), b"new");
        assert!(!from.exists());
    }

    #[rstest]
    fn failed_rename_falls_back_to_copy(dirs: Dirs) {
        let from = dirs.source.join("a.tgz");
        let to = dirs.output.join("a.tgz");
        std::fs::write(&from, b"new").expect("write source");
        std::fs::write(&to, b"old").expect("write destination");

        let written = move_file(&from, &to, |_, _| {
            Err(std::io::Error::other("cross-device link"))
        })
        .expect("copy fallback succeeds");

        assert_eq!(written, to);
        assert_eq!(std::fs::read(&to).expect("read"), b"new");
        assert!(!from.exists());
    }

    #[rstest]
    fn finalize_reports_missing_destination_dir(dirs: Dirs) {
        let from = dirs.source.join("a.tgz");
        std::fs::write(&from, b"new").expect("write source");

        let err = finalize(&from, &dirs.output.join("gone").join("a.tgz"))
            .expect_err("destination directory is absent");
        assert!(matches!(err, CheckError::Finalize { .. }));
    }
}
