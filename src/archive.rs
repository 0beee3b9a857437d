//! One-pass reader for the tarball produced by `npm pack`.
//!
//! The archive is read strictly in storage order without seeking. While
//! walking it the reader records every file name, parses `package.json`,
//! and scans each `.js` entry for relative `require` calls, so the tarball
//! is never decompressed twice.

use crate::manifest::PackageManifest;
use crate::resolution::{CandidateSet, resolve};
use crate::scanner::{LoadStatement, scan_requires};
use camino::Utf8Path;
use flate2::read::GzDecoder;
use log::debug;
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tar::EntryType;
use thiserror::Error;

/// Archive-relative name of the package manifest.
pub const MANIFEST_NAME: &str = "package.json";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors arising while reading the packed tarball.
///
/// All of these mean the packer produced something other than the expected
/// npm layout; none are recoverable.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O error while reading or decompressing the archive.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry does not live under the archive root directory.
    #[error("archive entry {entry:?} is not under the expected root directory {root:?}")]
    OutsideRoot {
        /// Raw entry name.
        entry: String,
        /// Expected root directory.
        root: String,
    },

    /// An entry names the root directory itself as a file.
    #[error("archive entry {entry:?} has an empty name once {root:?} is stripped")]
    EmptyEntryName {
        /// Raw entry name.
        entry: String,
        /// Expected root directory.
        root: String,
    },

    /// An entry name is not valid UTF-8.
    #[error("archive entry name is not valid UTF-8: {entry}")]
    NonUtf8Name {
        /// Lossy rendering of the name.
        entry: String,
    },

    /// A `.js` entry could not be decoded as UTF-8.
    #[error("{path} is not valid UTF-8")]
    NonUtf8Source {
        /// Archive-relative path of the file.
        path: String,
    },

    /// The archive has no `package.json` at its root.
    #[error("package.json not found in archive")]
    ManifestNotFound,

    /// `package.json` could not be parsed.
    #[error("invalid package.json: {0}")]
    InvalidManifest(#[from] serde_json::Error),
}

/// The set of file names present in the tarball, root prefix stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveEntrySet {
    names: BTreeSet<String>,
}

impl ArchiveEntrySet {
    /// Returns `true` when the archive holds a file at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.names.contains(path)
    }

    /// Number of files in the archive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` when the archive holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates the file names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ArchiveEntrySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// A `require` call paired with the paths that could satisfy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The call as found in the source.
    pub statement: LoadStatement,
    /// Paths the loader would try for it.
    pub candidates: CandidateSet,
}

impl From<LoadStatement> for Dependency {
    fn from(statement: LoadStatement) -> Self {
        let candidates = resolve(&statement);
        Self {
            statement,
            candidates,
        }
    }
}

/// Everything gathered from one pass over the tarball.
#[derive(Debug, Clone)]
pub struct PackageContents {
    /// Every file in the archive.
    pub entries: ArchiveEntrySet,
    /// The parsed `package.json`.
    pub manifest: PackageManifest,
    /// Relative `require` calls from every `.js` file, in archive order.
    pub dependencies: Vec<Dependency>,
}

/// Opens and reads the tarball at `path`.
///
/// # Errors
///
/// See [`read_package`].
pub fn read_package_file(path: &Path, root: &str) -> Result<PackageContents, ArchiveError> {
    let file = std::fs::File::open(path)?;
    read_package(file, root)
}

/// Reads a tarball whose entries all live under `root/`.
///
/// Gzip compression is detected from the stream's magic bytes; plain tar
/// streams are accepted too.
///
/// # Errors
///
/// Returns an [`ArchiveError`] when an entry lies outside `root/`, a name or
/// `.js` file is not UTF-8, `package.json` is absent or malformed, or the
/// stream cannot be read.
///
/// # Examples
///
/// ```
/// use pack_check::archive::read_package;
///
/// let mut builder = tar::Builder::new(Vec::new());
/// for (name, body) in [
///     ("package/package.json", r#"{"files":["index.js"]}"#),
///     ("package/index.js", "module.exports = require('./lib/');"),
/// ] {
///     let mut header = tar::Header::new_gnu();
///     header.set_size(body.len() as u64);
///     header.set_mode(0o644);
///     builder.append_data(&mut header, name, body.as_bytes())?;
/// }
/// let tarball = builder.into_inner()?;
///
/// let contents = read_package(tarball.as_slice(), "package")?;
/// assert!(contents.entries.contains("index.js"));
/// assert_eq!(contents.dependencies[0].candidates.primary, "lib/index.js");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn read_package(reader: impl Read, root: &str) -> Result<PackageContents, ArchiveError> {
    let mut buffered = BufReader::new(reader);
    if buffered.fill_buf()?.starts_with(&GZIP_MAGIC) {
        debug!("reading gzip-compressed tarball");
        scan_archive(tar::Archive::new(GzDecoder::new(buffered)), root)
    } else {
        debug!("reading uncompressed tarball");
        scan_archive(tar::Archive::new(buffered), root)
    }
}

fn scan_archive<R: Read>(
    mut archive: tar::Archive<R>,
    root: &str,
) -> Result<PackageContents, ArchiveError> {
    let prefix = format!("{root}/");
    let mut entries = BTreeSet::new();
    let mut manifest = None;
    let mut dependencies = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let kind = entry.header().entry_type();
        if matches!(kind, EntryType::XGlobalHeader) {
            continue;
        }

        let raw = entry_name(&entry)?;
        if kind.is_dir() || raw.ends_with('/') {
            continue;
        }
        let name = strip_root(&raw, &prefix, root)?;

        if name == MANIFEST_NAME {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            manifest = Some(PackageManifest::from_slice(&bytes)?);
        } else if name.ends_with(".js") {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            let source = String::from_utf8(bytes)
                .map_err(|_| ArchiveError::NonUtf8Source { path: name.clone() })?;
            let before = dependencies.len();
            dependencies.extend(scan_requires(&source, Utf8Path::new(&name)).map(Dependency::from));
            debug!("{name}: {} relative require(s)", dependencies.len() - before);
        }

        entries.insert(name);
    }

    let manifest = manifest.ok_or(ArchiveError::ManifestNotFound)?;
    debug!(
        "{} holds {} file(s) and {} relative require(s)",
        manifest.label(),
        entries.len(),
        dependencies.len()
    );

    Ok(PackageContents {
        entries: ArchiveEntrySet { names: entries },
        manifest,
        dependencies,
    })
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String, ArchiveError> {
    let bytes = entry.path_bytes();
    std::str::from_utf8(&bytes)
        .map(str::to_owned)
        .map_err(|_| ArchiveError::NonUtf8Name {
            entry: String::from_utf8_lossy(&bytes).into_owned(),
        })
}

fn strip_root(raw: &str, prefix: &str, root: &str) -> Result<String, ArchiveError> {
    match raw.strip_prefix(prefix) {
        Some("") => Err(ArchiveError::EmptyEntryName {
            entry: raw.to_owned(),
            root: root.to_owned(),
        }),
        Some(name) => Ok(name.to_owned()),
        None => Err(ArchiveError::OutsideRoot {
            entry: raw.to_owned(),
            root: root.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixtureEntry, npm_tarball, tarball};
    use rstest::rstest;

    #[test]
    fn collects_files_and_skips_directories() {
        let bytes = tarball(
            &[
                FixtureEntry::dir("package/"),
                FixtureEntry::dir("package/lib/"),
                FixtureEntry::file("package/package.json", "{}"),
                FixtureEntry::file("package/lib/a.js", ""),
                FixtureEntry::file("package/README.md", "# demo"),
            ],
            true,
        );

        let contents = read_package(bytes.as_slice(), "package").expect("valid archive");
        let names: Vec<&str> = contents.entries.iter().collect();
        assert_eq!(names, vec!["README.md", "lib/a.js", "package.json"]);
        assert!(!contents.entries.contains("lib"));
        assert!(!contents.entries.contains("lib/"));
    }

    #[test]
    fn accepts_uncompressed_tar() {
        let bytes = tarball(&[FixtureEntry::file("package/package.json", "{}")], false);
        let contents = read_package(bytes.as_slice(), "package").expect("valid archive");
        assert_eq!(contents.entries.len(), 1);
    }

    #[test]
    fn parses_manifest_and_scans_only_js() {
        let bytes = npm_tarball(&[
            ("package.json", r#"{"name":"demo","files":["index.js","lib/util.js"]}"#),
            ("index.js", "const util = require('./lib/util');"),
            ("lib/util.js", "module.exports = require('../data.json');"),
            ("lib/notes.txt", "require('./not-code')"),
            ("lib/types.ts", "require('./not-js')"),
        ]);

        let contents = read_package(bytes.as_slice(), "package").expect("valid archive");
        assert_eq!(contents.manifest.declared_files, vec!["index.js", "lib/util.js"]);

        let primaries: Vec<&str> = contents
            .dependencies
            .iter()
            .map(|dependency| dependency.candidates.primary.as_str())
            .collect();
        assert_eq!(primaries, vec!["lib/util.js", "data.json.js"]);
        assert_eq!(
            contents
                .dependencies
                .first()
                .map(|dependency| dependency.statement.containing_file.as_str()),
            Some("index.js")
        );
    }

    #[rstest]
    #[case::other_root("other/package.json")]
    #[case::no_root("package.json")]
    #[case::root_name_prefix("packages/index.js")]
    fn rejects_entries_outside_root(#[case] name: &str) {
        let bytes = tarball(
            &[
                FixtureEntry::file("package/package.json", "{}"),
                FixtureEntry::file(name, ""),
            ],
            true,
        );

        let err = read_package(bytes.as_slice(), "package").expect_err("layout should be rejected");
        assert!(
            matches!(&err, ArchiveError::OutsideRoot { entry, .. } if entry == name),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_missing_manifest() {
        let bytes = npm_tarball(&[("index.js", "")]);
        let err = read_package(bytes.as_slice(), "package").expect_err("manifest is required");
        assert!(matches!(err, ArchiveError::ManifestNotFound));
    }

    #[rstest]
    #[case::not_json("{ not json")]
    #[case::top_level_array("[]")]
    #[case::positional_array(r#"["demo","1.0.0",["gone.js"]]"#)]
    fn rejects_malformed_manifest(#[case] manifest: &str) {
        let bytes = npm_tarball(&[("package.json", manifest)]);
        let err = read_package(bytes.as_slice(), "package").expect_err("manifest must parse");
        assert!(matches!(err, ArchiveError::InvalidManifest(_)));
    }

    #[test]
    fn rejects_non_utf8_entry_name() {
        let raw_name: &[u8] = b"package/\xffbin.js";
        let mut header = tar::Header::new_old();
        for (slot, byte) in header.as_old_mut().name.iter_mut().zip(raw_name) {
            *slot = *byte;
        }
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(0);
        header.set_cksum();

        let mut builder = tar::Builder::new(Vec::new());
        builder
            .append(&header, std::io::empty())
            .expect("append raw entry");
        let bytes = builder.into_inner().expect("finish tar stream");

        let err = read_package(bytes.as_slice(), "package").expect_err("name must be UTF-8");
        assert!(
            matches!(
                &err,
                ArchiveError::NonUtf8Name { entry } if entry == "package/\u{fffd}bin.js"
            ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_non_utf8_source() {
        let bytes = tarball(
            &[
                FixtureEntry::file("package/package.json", "{}"),
                FixtureEntry::bytes("package/lib/bin.js", &[0xff, 0xfe, 0x00]),
            ],
            true,
        );
        let err = read_package(bytes.as_slice(), "package").expect_err("source must be UTF-8");
        assert!(matches!(err, ArchiveError::NonUtf8Source { path } if path == "lib/bin.js"));
    }

    #[test]
    fn honours_custom_root() {
        let bytes = tarball(
            &[
                FixtureEntry::file("demo/package.json", "{}"),
                FixtureEntry::file("demo/index.js", ""),
            ],
            true,
        );
        let contents = read_package(bytes.as_slice(), "demo").expect("valid archive");
        assert!(contents.entries.contains("index.js"));
    }

    #[test]
    fn entry_set_from_iterator() {
        let set: ArchiveEntrySet = ["b.js", "a.js", "b.js"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("a.js"));
        assert!(!set.is_empty());
    }

    #[rstest]
    #[case::file("package/a.js", "a.js")]
    #[case::nested("package/lib/a.js", "lib/a.js")]
    #[case::dotted("package/.npmignore", ".npmignore")]
    fn strip_root_keeps_relative_name(#[case] raw: &str, #[case] expected: &str) {
        let stripped = strip_root(raw, "package/", "package").ok();
        assert_eq!(stripped.as_deref(), Some(expected));
    }

    #[test]
    fn strip_root_rejects_bare_root() {
        let err = strip_root("package/", "package/", "package").expect_err("empty name");
        assert!(matches!(err, ArchiveError::EmptyEntryName { .. }));
    }
}
