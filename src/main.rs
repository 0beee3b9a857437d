//! pack-check CLI entrypoint.
//!
//! This binary packs the npm package in the source directory, verifies the
//! tarball, and on success prints the tarball's file name on stdout so it can
//! be handed straight to `npm publish`.

use camino::Utf8PathBuf;
use clap::Parser;
use pack_check::check::run_check;
use pack_check::cli::Cli;
use pack_check::config::CheckConfig;
use pack_check::error::{CheckError, Result};
use pack_check::packer::SystemCommandExecutor;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<i32> {
    let cwd = current_dir()?;
    let config = CheckConfig::from_cli(cli, &cwd)?;
    let outcome = run_check(&config, &SystemCommandExecutor, stderr, stdout)?;
    Ok(outcome.exit_code())
}

/// Resolves the process working directory as a UTF-8 path.
fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|err| CheckError::InvalidDirectory {
        path: Utf8PathBuf::from(err.as_path().to_string_lossy().into_owned()),
        reason: "current directory is not valid UTF-8".to_owned(),
    })
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format_args!("pack-check: {err}"));
            err.exit_code()
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort; nothing else can report the failure.
    }
}
