//! Fuzzy title similarity between staged product titles and master catalog
//! titles.
//!
//! Uses a normalized Levenshtein ratio over scrubbed titles; any candidate at
//! or below [`SIMILARITY_FLOOR`] is discarded. Ties break by highest raw
//! score, then lowest product id, so repeated runs are deterministic.

use offergrid_db::ProductTitleRow;

/// Candidates scoring at or below this are never returned.
///
/// Tunable: chosen to drop clearly-unrelated titles early while leaving the
/// accept/reject decision to the product matcher's own threshold.
pub const SIMILARITY_FLOOR: f64 = 0.4;

/// Similarity between two titles in `[0.0, 1.0]`.
#[must_use]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&scrub(a), &scrub(b))
}

/// Returns the best-matching master product for `title`, or `None` when no
/// candidate exceeds [`SIMILARITY_FLOOR`].
#[must_use]
pub fn best_title_match(title: &str, candidates: &[ProductTitleRow]) -> Option<(i64, f64)> {
    let needle = scrub(title);
    let mut best: Option<(i64, f64)> = None;

    for candidate in candidates {
        let score = strsim::normalized_levenshtein(&needle, &scrub(&candidate.title));
        if score <= SIMILARITY_FLOOR {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_id, best_score)) => {
                score > best_score || (score == best_score && candidate.id < best_id)
            }
        };
        if better {
            best = Some((candidate.id, score));
        }
    }

    best
}

/// Lower-cases and collapses runs of whitespace so formatting differences do
/// not dominate the edit distance.
fn scrub(title: &str) -> String {
    title.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
