// src/reconcile.rs
//
// The primary feed is comprehensive and consistently structured; the
// supplementary "new marks" feed is sparse, sometimes absent, and
// occasionally fresher. Merging replaces a primary entry only when the
// supplementary one is better. The supplementary feed carries facility
// names without group information, so it is keyed by name alone.

use tracing::debug;

use crate::ingest::source::{Feed, NameFeed, RawStatus};

/// Merge supplementary entries into the primary feed in place.
/// Returns how many entries were replaced.
pub fn merge(primary: &mut Feed, supplementary: &NameFeed) -> usize {
    if supplementary.is_empty() {
        return 0;
    }

    let mut replaced = 0;
    for places in primary.values_mut() {
        for (name, status) in places.iter_mut() {
            if let Some(candidate) = supplementary.get(name) {
                if is_better(candidate, status) {
                    *status = candidate.clone();
                    replaced += 1;
                }
            }
        }
    }

    if replaced > 0 {
        debug!(replaced, "supplementary feed replaced primary entries");
    }
    replaced
}

/// Tie-break: a dated side beats a dateless one; with two dates the later
/// wins; with no dates at all the primary side is kept.
fn is_better(candidate: &RawStatus, current: &RawStatus) -> bool {
    match (candidate.date, current.date) {
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (Some(c), Some(p)) => c > p,
        (None, None) => false,
    }
}
