//! Status messages printed after validation.
//!
//! Each block starts and ends with a blank line so it stands apart from the
//! packer's own output on stderr. Only the status glyph is colored.

use crate::reconcile::{Outcome, ValidationReport};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

fn glyph(symbol: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("{color}{symbol}{RESET}")
    } else {
        symbol.to_owned()
    }
}

fn list_block<'a>(heading: &str, items: impl IntoIterator<Item = &'a String>) -> String {
    let mut lines = vec![String::new(), heading.to_owned()];
    lines.extend(items.into_iter().map(|item| format!("    - {item}")));
    lines.push(String::new());
    lines.push(String::new());
    lines.join("\n")
}

/// Renders the status block for `report`.
///
/// Missing declared files take precedence: when any are present the
/// potentially-missing list is not shown.
///
/// # Examples
///
/// ```
/// use pack_check::output::render_report;
/// use pack_check::reconcile::ValidationReport;
///
/// let report = ValidationReport {
///     missing_declared: vec!["b.js".to_owned()],
///     ..ValidationReport::default()
/// };
/// assert_eq!(render_report(&report, false), "\n  ✗ missing:\n    - b.js\n\n");
/// ```
#[must_use]
pub fn render_report(report: &ValidationReport, color: bool) -> String {
    match report.outcome() {
        Outcome::Failed => list_block(
            &format!("  {} missing:", glyph("✗", RED, color)),
            &report.missing_declared,
        ),
        Outcome::Warned => list_block(
            &format!("  {} potentially missing:", glyph("!", YELLOW, color)),
            &report.unresolved,
        ),
        Outcome::Passed => format!("\n  {} no missing files\n\n", glyph("✓", GREEN, color)),
    }
}
