//! Candidate path resolution for relative `require` calls.
//!
//! Mirrors Node's CommonJS lookup for relative specifiers: try the path as
//! given, then with each registered extension, then as a directory with an
//! `index` module. Paths are archive-relative and use `/` separators
//! regardless of host platform, because they are compared against tarball
//! entry names.

use crate::scanner::LoadStatement;
use camino::Utf8Path;

/// Extensions Node tries, in order, when a specifier has no exact match.
pub const REQUIRE_EXTENSIONS: [&str; 3] = [".js", ".json", ".node"];

/// Suffixes tried for a specifier that names a file.
pub const FILE_SUFFIXES: [&str; 7] = [
    "",
    ".js",
    ".json",
    ".node",
    "/index.js",
    "/index.json",
    "/index.node",
];

/// The paths a single `require` call could load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateSet {
    /// The `.js` module the call is assumed to target; reported when nothing
    /// matches.
    pub primary: String,
    /// Every path the loader would try, in trial order.
    pub alternatives: Vec<String>,
}

impl CandidateSet {
    /// Returns `true` when `exists` accepts the primary path or any
    /// alternative.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use pack_check::resolution::resolve;
    /// use pack_check::scanner::LoadStatement;
    ///
    /// let statement = LoadStatement {
    ///     literal_path: "./data".to_owned(),
    ///     containing_file: Utf8PathBuf::from("lib/index.js"),
    ///     line: 1,
    /// };
    /// let candidates = resolve(&statement);
    /// assert!(candidates.is_satisfied_by(|path| path == "lib/data.json"));
    /// assert!(!candidates.is_satisfied_by(|path| path == "data.json"));
    /// ```
    pub fn is_satisfied_by(&self, mut exists: impl FnMut(&str) -> bool) -> bool {
        exists(&self.primary) || self.alternatives.iter().any(|path| exists(path))
    }
}

/// Computes the candidate paths for `statement`.
///
/// The literal is joined onto the directory of the containing file and
/// normalized. A literal ending in `/` names a directory, so only its
/// `index` module is considered; anything else is tried as a file first.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use pack_check::resolution::resolve;
/// use pack_check::scanner::LoadStatement;
///
/// let statement = LoadStatement {
///     literal_path: "../util/".to_owned(),
///     containing_file: Utf8PathBuf::from("lib/cli/main.js"),
///     line: 1,
/// };
/// let candidates = resolve(&statement);
/// assert_eq!(candidates.primary, "lib/util/index.js");
/// assert_eq!(
///     candidates.alternatives,
///     vec!["lib/util/index.js", "lib/util/index.json", "lib/util/index.node"],
/// );
/// ```
#[must_use]
pub fn resolve(statement: &LoadStatement) -> CandidateSet {
    let joined = join_relative(&statement.containing_file, &statement.literal_path);

    let (target, suffixes): (String, &[&str]) = if joined.ends_with('/') {
        (normalize(&format!("{joined}index")), REQUIRE_EXTENSIONS.as_slice())
    } else {
        (normalize(&joined), FILE_SUFFIXES.as_slice())
    };

    CandidateSet {
        primary: format!("{target}.js"),
        alternatives: suffixes
            .iter()
            .map(|suffix| format!("{target}{suffix}"))
            .collect(),
    }
}

fn join_relative(containing_file: &Utf8Path, literal: &str) -> String {
    match containing_file.as_str().rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => format!("{dir}/{literal}"),
        Some(_) => format!("/{literal}"),
        None => literal.to_owned(),
    }
}

/// Collapses `.`, `..` and repeated separators in a `/`-separated path.
///
/// Leading `..` segments of a relative path are kept; `..` at the root of an
/// absolute path is dropped. An empty result becomes `.`.
///
/// # Examples
///
/// ```
/// use pack_check::resolution::normalize;
///
/// assert_eq!(normalize("lib/./a//b/../c"), "lib/a/c");
/// assert_eq!(normalize("lib/../../x"), "../x");
/// assert_eq!(normalize("./"), ".");
/// ```
#[must_use]
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            _ => segments.push(segment),
        }
    }

    let body = segments.join("/");
    match (absolute, body.is_empty()) {
        (true, _) => format!("/{body}"),
        (false, true) => ".".to_owned(),
        (false, false) => body,
    }
}
