//! Layered run configuration.
//!
//! Settings come from three layers, later layers winning: built-in defaults,
//! an optional `pack-check.toml` in the package directory (or the file named
//! by `--config`), and command-line flags. The result is a [`CheckConfig`]
//! carrying every directory explicitly, so nothing below the CLI consults the
//! process working directory.

use crate::cli::Cli;
use crate::resolution::normalize;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// File name looked up in the package directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "pack-check.toml";

/// Packer invoked when nothing else is configured.
pub const DEFAULT_PACKER: &str = "npm";

/// Root directory `npm pack` wraps every entry in.
pub const DEFAULT_ARCHIVE_ROOT: &str = "package";

/// Errors arising while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying parse failure.
        #[source]
        source: toml::de::Error,
    },

    /// A setting has an unusable value.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// Name of the setting.
        key: &'static str,
        /// Description of the problem.
        reason: String,
    },

    /// A directory could not be resolved to an absolute UTF-8 path.
    #[error("directory {path} is unusable: {reason}")]
    InvalidDirectory {
        /// The offending path.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },
}

/// Contents of `pack-check.toml`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Program invoked as `<packer> pack`.
    pub packer: Option<String>,
    /// Top-level directory wrapping every tarball entry.
    pub archive_root: Option<String>,
    /// Dependency paths that should not be reported as potentially missing,
    /// for example modules generated at install time.
    pub allow_unresolved: Vec<String>,
}

impl FileConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not valid TOML or
    /// contains unknown keys; `path` is used for the message only.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use pack_check::config::FileConfig;
    ///
    /// let config = FileConfig::parse(
    ///     "allow_unresolved = [\"build/Release/addon.js\"]\n",
    ///     Utf8Path::new("pack-check.toml"),
    /// )?;
    /// assert_eq!(config.allow_unresolved, vec!["build/Release/addon.js"]);
    /// assert!(config.packer.is_none());
    /// # Ok::<(), pack_check::config::ConfigError>(())
    /// ```
    pub fn parse(text: &str, path: &Utf8Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Loads the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Loads the file at `path` if it exists.
    ///
    /// # Errors
    ///
    /// As for [`FileConfig::load`], except that a missing file yields `None`.
    pub fn load_optional(path: &Utf8Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path).map(Some),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: path.to_owned(),
                source,
            }),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckConfig {
    /// Absolute path of the package directory handed to the packer.
    pub source_dir: Utf8PathBuf,
    /// Absolute path of the directory receiving the finished tarball.
    pub output_dir: Utf8PathBuf,
    /// Program invoked as `<packer> pack`.
    pub packer: String,
    /// Top-level directory wrapping every tarball entry.
    pub archive_root: String,
    /// Dependency paths exempt from the potentially-missing warning.
    pub allow_unresolved: BTreeSet<String>,
    /// Whether status messages use ANSI colors.
    pub color: bool,
}

impl CheckConfig {
    /// Creates a configuration with default settings for the given
    /// directories.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use pack_check::config::CheckConfig;
    ///
    /// let config = CheckConfig::new(Utf8PathBuf::from("/src/demo"), Utf8PathBuf::from("/out"));
    /// assert_eq!(config.packer, "npm");
    /// assert_eq!(config.archive_root, "package");
    /// assert!(config.color);
    /// ```
    #[must_use]
    pub fn new(source_dir: Utf8PathBuf, output_dir: Utf8PathBuf) -> Self {
        Self {
            source_dir,
            output_dir,
            packer: DEFAULT_PACKER.to_owned(),
            archive_root: DEFAULT_ARCHIVE_ROOT.to_owned(),
            allow_unresolved: BTreeSet::new(),
            color: true,
        }
    }

    /// Resolves the configuration for a CLI invocation made from `cwd`.
    ///
    /// Relative directory arguments are taken relative to `cwd`; both
    /// directories must exist.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a directory cannot be resolved, an
    /// explicitly named configuration file cannot be loaded, the default
    /// configuration file is malformed, or a setting is invalid.
    pub fn from_cli(cli: &Cli, cwd: &Utf8Path) -> Result<Self, ConfigError> {
        let source_dir = resolve_dir(cwd, cli.source_dir.as_deref())?;
        let output_dir = resolve_dir(cwd, cli.output_dir.as_deref())?;

        let file_path = cli
            .config
            .as_ref()
            .map_or_else(|| source_dir.join(CONFIG_FILE_NAME), |path| cwd.join(path));
        let file = if cli.config.is_some() {
            Some(FileConfig::load(&file_path)?)
        } else {
            FileConfig::load_optional(&file_path)?
        };
        if file.is_some() {
            debug!("loaded configuration from {file_path}");
        }

        let mut config = Self::new(source_dir, output_dir).with_file(file.unwrap_or_default());
        if let Some(packer) = &cli.packer {
            config.packer.clone_from(packer);
        }
        if let Some(root) = &cli.archive_root {
            config.archive_root.clone_from(root);
        }
        config.color = !cli.no_color;

        config.validate()?;
        Ok(config)
    }

    /// Applies the settings present in `file`.
    #[must_use]
    pub fn with_file(mut self, file: FileConfig) -> Self {
        if let Some(packer) = file.packer {
            self.packer = packer;
        }
        if let Some(root) = file.archive_root {
            self.archive_root = root;
        }
        for path in file.allow_unresolved {
            if normalize(&path) != path {
                warn!(
                    "allow_unresolved entry {path:?} is not a normalized package path \
                     and will never match"
                );
            }
            self.allow_unresolved.insert(path);
        }
        self
    }

    /// Checks that the packer and archive root are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an empty packer or an
    /// archive root that is not a single path segment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packer.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "packer",
                reason: "must not be empty".to_owned(),
            });
        }
        let root = self.archive_root.as_str();
        if root.is_empty() || root.contains('/') || root == "." || root == ".." {
            return Err(ConfigError::InvalidValue {
                key: "archive_root",
                reason: format!("{root:?} is not a single directory name"),
            });
        }
        Ok(())
    }
}

fn resolve_dir(cwd: &Utf8Path, requested: Option<&Utf8Path>) -> Result<Utf8PathBuf, ConfigError> {
    let joined = requested.map_or_else(|| cwd.to_owned(), |path| cwd.join(path));
    let canonical = joined
        .canonicalize_utf8()
        .map_err(|err| ConfigError::InvalidDirectory {
            path: joined.clone(),
            reason: err.to_string(),
        })?;
    if !canonical.is_dir() {
        return Err(ConfigError::InvalidDirectory {
            path: joined,
            reason: "not a directory".to_owned(),
        });
    }
    Ok(canonical)
}
