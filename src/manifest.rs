//! The subset of `package.json` that pack-check reads.

use serde::Deserialize;
use serde::de::Error as _;
use serde_json::Value;

/// Package metadata parsed from the `package.json` inside the tarball.
///
/// Only `files` drives validation; `name` and `version` are used for log
/// messages. Unknown fields are ignored because `package.json` carries
/// arbitrary tool configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    /// Package name, when present.
    #[serde(default)]
    pub name: Option<String>,
    /// Package version, when present.
    #[serde(default)]
    pub version: Option<String>,
    /// Paths the package declares it ships, in manifest order.
    #[serde(rename = "files", default)]
    pub declared_files: Vec<String>,
}

impl PackageManifest {
    /// Parses manifest JSON.
    ///
    /// A manifest without `files` declares nothing.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the document is not valid JSON, is
    /// not a JSON object, or `files` is not an array of strings.
    ///
    /// # Examples
    ///
    /// ```
    /// use pack_check::manifest::PackageManifest;
    ///
    /// let manifest = PackageManifest::from_slice(br#"{"name":"demo","files":["index.js","lib/"]}"#)?;
    /// assert_eq!(manifest.declared_files, vec!["index.js", "lib/"]);
    /// # Ok::<(), serde_json::Error>(())
    /// ```
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<Value>(bytes)? {
            document @ Value::Object(_) => serde_json::from_value(document),
            _ => Err(serde_json::Error::custom(
                "package.json must contain a JSON object",
            )),
        }
    }

    /// Human-readable `name@version` label for log messages.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.name, &self.version) {
            (Some(name), Some(version)) => format!("{name}@{version}"),
            (Some(name), None) => name.clone(),
            _ => "<unnamed package>".to_owned(),
        }
    }
}
