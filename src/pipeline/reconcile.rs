//! Count reconciliation: force the section list to exactly the requested
//! number of slides without losing source text.
//!
//! Policy, in order:
//!
//! 1. **Completeness.** Sections that are blank are dropped. The trimmed
//!    source's non-whitespace characters are matched, in order, against the
//!    concatenated sections. If the match stops early, everything from the
//!    start of the line holding the first unmatched character to the end of
//!    the source is appended as one extra section.
//! 2. **Over-count.** More sections than slides: adjacent sections are joined
//!    with a paragraph break in groups of `ceil(len / target)`.
//! 3. **Under-count.** Fewer sections than slides: empty slides are appended.
//!
//! Completeness runs first and wins over count; merging never drops text.

use serde::Serialize;
use tracing::{debug, warn};

/// Separator used when adjacent sections are merged into one slide.
pub const MERGE_SEPARATOR: &str = "\n\n";

/// What reconciliation had to do to reach the target count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Blank sections removed before anything else.
    pub blank_dropped: usize,
    /// Whether uncovered source text was appended as a trailing section.
    pub remainder_appended: bool,
    /// Group size used for merging, when merging happened.
    pub merge_factor: Option<usize>,
    /// Empty slides appended to reach the target.
    pub padded: usize,
}

/// Reconcile `sections` to exactly `target` slides. See the module docs.
pub fn reconcile(sections: Vec<String>, target: usize, source: &str) -> Vec<String> {
    reconcile_with_report(sections, target, source).0
}

/// [`reconcile`], also reporting which steps were applied.
///
/// A `target` of zero is treated as one; request validation never lets it
/// through.
pub fn reconcile_with_report(
    sections: Vec<String>,
    target: usize,
    source: &str,
) -> (Vec<String>, ReconcileReport) {
    let target = target.max(1);
    let mut report = ReconcileReport::default();

    let before = sections.len();
    let mut sections: Vec<String> = sections
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
    report.blank_dropped = before - sections.len();
    if report.blank_dropped > 0 {
        warn!("Dropped {} blank sections", report.blank_dropped);
    }

    if let Some(remainder) = uncovered_remainder(&sections, source) {
        warn!(
            "Model output missed source text; appending {} char remainder",
            remainder.chars().count()
        );
        sections.push(remainder.to_string());
        report.remainder_appended = true;
    }

    if sections.len() > target {
        let factor = sections.len().div_ceil(target);
        debug!(
            "Merging {} sections into {} slides (factor {})",
            sections.len(),
            target,
            factor
        );
        sections = sections
            .chunks(factor)
            .map(|group| group.join(MERGE_SEPARATOR))
            .collect();
        report.merge_factor = Some(factor);
    }

    if sections.len() < target {
        report.padded = target - sections.len();
        sections.resize(target, String::new());
    }

    (sections, report)
}

/// The tail of the trimmed source not covered by `sections`, if any.
fn uncovered_remainder<'a>(sections: &[String], source: &'a str) -> Option<&'a str> {
    let source = source.trim();
    let idx = first_unmatched(sections, source)?;
    let line_start = source[..idx].rfind('\n').map_or(0, |i| i + 1);
    let remainder = source[line_start..].trim();
    (!remainder.is_empty()).then_some(remainder)
}

/// Byte offset in `source` of the first non-whitespace character that cannot
/// be matched, in order, against the sections' non-whitespace characters.
fn first_unmatched(sections: &[String], source: &str) -> Option<usize> {
    let mut covered = sections
        .iter()
        .flat_map(|s| s.chars())
        .filter(|c| !c.is_whitespace());

    source
        .char_indices()
        .filter(|(_, c)| !c.is_whitespace())
        .find(|(_, ch)| !covered.any(|c| c == *ch))
        .map(|(idx, _)| idx)
}
