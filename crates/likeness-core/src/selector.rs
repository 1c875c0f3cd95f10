//! Best-candidate selection over a classification response.

use crate::types::{ClassificationCandidate, SelectionResult};

/// Pick the candidate whose own top score is the highest of all.
///
/// Candidates are scanned in response order and a later candidate replaces
/// the current best only on a strictly greater score, so among equal maxima
/// the first one wins.
///
/// Callers must not pass an empty slice: an empty response means no face was
/// detected and is reported before selection. Returns `None` for an empty
/// slice, or when no candidate carries a usable score.
pub fn select_best(candidates: &[ClassificationCandidate]) -> Option<SelectionResult> {
    let mut best: Option<(&ClassificationCandidate, f32)> = None;

    for candidate in candidates {
        let Some(score) = candidate.confidence() else {
            tracing::debug!(label = %candidate.label, "candidate has no usable score; skipped");
            continue;
        };
        let is_better = match best {
            None => true,
            Some((_, best_score)) => score > best_score,
        };
        if is_better {
            best = Some((candidate, score));
        }
    }

    best.map(|(candidate, confidence)| SelectionResult {
        candidate: candidate.clone(),
        confidence,
    })
}
