use crate::feed::{DocumentError, FeedDocument};
use crate::filter::PatternSet;

/// Outcome of a filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub kept: usize,
    pub removed: usize,
}

/// Removes every channel item whose title matches none of `patterns`.
///
/// Each item present when the pass starts is visited exactly once, in
/// document order. The successor is fetched before the current item is
/// evaluated, because a removed item no longer has a position to advance from.
///
/// Only a missing root or `<channel>` is an error; non-matching titles are
/// the normal case.
pub fn run(doc: &mut FeedDocument, patterns: &PatternSet) -> Result<FilterReport, DocumentError> {
    let mut report = FilterReport::default();
    let mut cursor = doc.first_item()?;

    while let Some(item) = cursor {
        cursor = doc.next_item(item);

        let title = doc.title_of(item)?;
        if patterns.matches_any(&title) {
            tracing::trace!(title = %title, "Keeping item");
            report.kept += 1;
        } else {
            tracing::debug!(title = %title, "Removing item");
            doc.remove_item(item)?;
            report.removed += 1;
        }
    }

    tracing::info!(
        kept = report.kept,
        removed = report.removed,
        "Filtered feed items"
    );
    Ok(report)
}
