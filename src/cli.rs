//! CLI argument definitions for pack-check.
//!
//! Kept separate from the entrypoint so the binary stays focused on
//! orchestration and the arguments can be constructed in tests.

use camino::Utf8PathBuf;
use clap::Parser;
use log::LevelFilter;

/// Pack an npm package and verify the tarball ships everything it needs.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pack-check")]
#[command(version, about)]
#[command(long_about = concat!(
    "Pack an npm package and verify the tarball ships everything it needs.\n\n",
    "pack-check runs `npm pack`, then checks two things against the resulting ",
    "tarball: every path listed in package.json `files` must be present, and ",
    "every relative require('./...') in a packaged .js file must resolve to a ",
    "packaged file. Missing declared files fail the run and no tarball is ",
    "produced. Unresolvable requires are reported as warnings.\n\n",
    "On success the tarball is moved to the output directory and its file name ",
    "is printed on stdout; all other messages go to stderr.",
))]
#[command(after_help = concat!(
    "CONFIGURATION:\n",
    "  Settings may also be placed in pack-check.toml in the package directory:\n\n",
    "    packer = \"npm\"\n",
    "    archive_root = \"package\"\n",
    "    allow_unresolved = [\"build/Release/addon.js\"]\n\n",
    "  Command-line flags override the file.\n\n",
    "EXAMPLES:\n",
    "  Check the package in the current directory:\n",
    "    $ pack-check\n\n",
    "  Publish only what passed the check:\n",
    "    $ npm publish \"$(pack-check)\"\n\n",
    "  Check another package and keep the tarball in dist/:\n",
    "    $ pack-check --source-dir packages/core --output-dir dist\n",
))]
pub struct Cli {
    /// Package directory to pack [default: current directory].
    #[arg(short, long, value_name = "DIR")]
    pub source_dir: Option<Utf8PathBuf>,

    /// Directory that receives the finished tarball [default: current directory].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Configuration file [default: pack-check.toml in the package directory].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Program invoked as `<PROGRAM> pack`.
    #[arg(long, value_name = "PROGRAM")]
    pub packer: Option<String>,

    /// Top-level directory that wraps every tarball entry.
    #[arg(long, value_name = "NAME")]
    pub archive_root: Option<String>,

    /// Print status messages without ANSI colors.
    #[arg(long)]
    pub no_color: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        alias = "verbosity",
        action = clap::ArgAction::Count
    )]
    pub verbosity: u8,
}

impl Cli {
    /// Log level selected by the `-v` flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use log::LevelFilter;
    /// use pack_check::cli::Cli;
    ///
    /// assert_eq!(Cli::parse_from(["pack-check"]).log_level(), LevelFilter::Warn);
    /// assert_eq!(Cli::parse_from(["pack-check", "-vv"]).log_level(), LevelFilter::Debug);
    /// ```
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
