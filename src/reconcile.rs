//! Cross-checks the manifest and the `require` graph against the tarball.

use crate::archive::{ArchiveEntrySet, Dependency};
use crate::manifest::PackageManifest;
use log::debug;
use std::collections::BTreeSet;

/// Overall verdict of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing is missing.
    Passed,
    /// Some `require` targets could not be found; the tarball is still kept.
    Warned,
    /// Declared files are missing; the tarball must not be published.
    Failed,
}

impl Outcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Passed | Self::Warned => 0,
            Self::Failed => 1,
        }
    }
}

/// Result of reconciling a package against its tarball.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Declared files absent from the tarball, in manifest order.
    pub missing_declared: Vec<String>,
    /// Primary paths of `require` calls that no tarball entry satisfies.
    pub unresolved: BTreeSet<String>,
}

impl ValidationReport {
    /// Classifies the report.
    ///
    /// # Examples
    ///
    /// ```
    /// use pack_check::reconcile::{Outcome, ValidationReport};
    ///
    /// let mut report = ValidationReport::default();
    /// assert_eq!(report.outcome(), Outcome::Passed);
    ///
    /// report.unresolved.insert("lib/gone.js".to_owned());
    /// assert_eq!(report.outcome(), Outcome::Warned);
    ///
    /// report.missing_declared.push("index.js".to_owned());
    /// assert_eq!(report.outcome(), Outcome::Failed);
    /// ```
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if !self.missing_declared.is_empty() {
            Outcome::Failed
        } else if !self.unresolved.is_empty() {
            Outcome::Warned
        } else {
            Outcome::Passed
        }
    }

    /// Drops unresolved paths the user has explicitly allowed.
    #[must_use]
    pub fn without_allowed(mut self, allowed: &BTreeSet<String>) -> Self {
        self.unresolved.retain(|path| {
            let keep = !allowed.contains(path);
            if !keep {
                debug!("{path} is unresolved but allowed by configuration");
            }
            keep
        });
        self
    }
}

/// Builds the validation report for one tarball.
///
/// A declared file is missing when no entry has exactly its name. A
/// dependency is unresolved when neither its primary path nor any
/// alternative is an entry.
#[must_use]
pub fn reconcile(
    manifest: &PackageManifest,
    entries: &ArchiveEntrySet,
    dependencies: &[Dependency],
) -> ValidationReport {
    let missing_declared = manifest
        .declared_files
        .iter()
        .filter(|path| !entries.contains(path))
        .cloned()
        .collect();

    let unresolved = dependencies
        .iter()
        .filter(|dependency| {
            let found = dependency
                .candidates
                .is_satisfied_by(|path| entries.contains(path));
            if !found {
                let statement = &dependency.statement;
                debug!(
                    "{}:{}: require('{}') matches none of {:?}",
                    statement.containing_file,
                    statement.line,
                    statement.literal_path,
                    dependency.candidates.alternatives
                );
            }
            !found
        })
        .map(|dependency| dependency.candidates.primary.clone())
        .collect();

    ValidationReport {
        missing_declared,
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan_requires;
    use camino::Utf8Path;
    use rstest::rstest;

    fn manifest(files: &[&str]) -> PackageManifest {
        PackageManifest {
            declared_files: files.iter().map(|file| (*file).to_owned()).collect(),
            ..PackageManifest::default()
        }
    }

    fn dependencies(file: &str, source: &str) -> Vec<Dependency> {
        scan_requires(source, Utf8Path::new(file))
            .map(Dependency::from)
            .collect()
    }

    #[rstest]
    #[case::all_present(&["a.js", "b.js"], &["a.js", "b.js"], &[])]
    #[case::one_absent(&["a.js", "b.js"], &["a.js"], &["b.js"])]
    #[case::keeps_manifest_order(&["z.js", "a.js", "m.js"], &["a.js"], &["z.js", "m.js"])]
    #[case::directory_is_not_a_file(&["lib"], &["lib/a.js"], &["lib"])]
    fn missing_declared_preserves_order(
        #[case] declared: &[&str],
        #[case] present: &[&str],
        #[case] expected: &[&str],
    ) {
        let entries: ArchiveEntrySet = present.iter().copied().collect();
        let report = reconcile(&manifest(declared), &entries, &[]);
        assert_eq!(report.missing_declared, expected);
    }

    #[test]
    fn sibling_module_resolves() {
        let entries: ArchiveEntrySet = ["lib/bar.js", "lib/foo.js"].into_iter().collect();
        let report = reconcile(
            &manifest(&[]),
            &entries,
            &dependencies("lib/bar.js", "require('./foo')"),
        );
        assert!(report.unresolved.is_empty());
        assert_eq!(report.outcome(), Outcome::Passed);
    }

    #[test]
    fn absent_module_is_reported_by_primary_path() {
        let entries: ArchiveEntrySet = ["lib/bar.js", "lib/mist.js"].into_iter().collect();
        let report = reconcile(
            &manifest(&[]),
            &entries,
            &dependencies("lib/bar.js", "require('./missing')"),
        );
        assert_eq!(
            report.unresolved.iter().collect::<Vec<_>>(),
            vec!["lib/missing.js"]
        );
        assert_eq!(report.outcome(), Outcome::Warned);
    }

    #[rstest]
    #[case::json("lib/data.json")]
    #[case::native("lib/data.node")]
    #[case::exact("lib/data")]
    #[case::directory_index("lib/data/index.js")]
    fn any_alternative_satisfies(#[case] present: &str) {
        let entries: ArchiveEntrySet = [present].into_iter().collect();
        let report = reconcile(
            &manifest(&[]),
            &entries,
            &dependencies("lib/main.js", "require('./data')"),
        );
        assert!(report.unresolved.is_empty(), "{present} should satisfy ./data");
    }

    #[test]
    fn directory_require_ignores_bare_index() {
        let entries: ArchiveEntrySet = ["sub/index"].into_iter().collect();
        let report = reconcile(
            &manifest(&[]),
            &entries,
            &dependencies("main.js", "require('./sub/')"),
        );
        assert!(report.unresolved.contains("sub/index.js"));
    }

    #[test]
    fn unresolved_paths_are_deduplicated_and_sorted() {
        let mut found = dependencies("lib/a.js", "require('./z'); require('./y');");
        found.extend(dependencies("lib/b.js", "require('./z')"));

        let report = reconcile(&manifest(&[]), &ArchiveEntrySet::default(), &found);
        assert_eq!(
            report.unresolved.into_iter().collect::<Vec<_>>(),
            vec!["lib/y.js", "lib/z.js"]
        );
    }

    #[test]
    fn missing_declared_outranks_unresolved() {
        let entries: ArchiveEntrySet = ["a.js"].into_iter().collect();
        let report = reconcile(
            &manifest(&["a.js", "b.js"]),
            &entries,
            &dependencies("a.js", "require('./gone')"),
        );
        assert_eq!(report.missing_declared, vec!["b.js"]);
        assert_eq!(report.outcome(), Outcome::Failed);
        assert_eq!(report.outcome().exit_code(), 1);
    }

    #[test]
    fn allowed_paths_are_dropped() {
        let report = reconcile(
            &manifest(&[]),
            &ArchiveEntrySet::default(),
            &dependencies("index.js", "require('./build/addon'); require('./gone');"),
        );
        let allowed: BTreeSet<String> = ["build/addon.js".to_owned()].into_iter().collect();

        let filtered = report.without_allowed(&allowed);
        assert_eq!(
            filtered.unresolved.into_iter().collect::<Vec<_>>(),
            vec!["gone.js"]
        );
    }

    #[rstest]
    #[case::passed(Outcome::Passed, 0)]
    #[case::warned(Outcome::Warned, 0)]
    #[case::failed(Outcome::Failed, 1)]
    fn outcome_exit_codes(#[case] outcome: Outcome, #[case] expected: i32) {
        assert_eq!(outcome.exit_code(), expected);
    }
}
