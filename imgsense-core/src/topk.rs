//! Rank-based selection of the highest scores in a probability vector.
//!
//! Scores are ranked by value, descending. Equal values rank by index, lowest first, so the
//! selection is fully deterministic even when a classifier emits duplicate probabilities.
//! NaN ranks below every number.

use std::cmp::Ordering;

use crate::error::SelectionError;

/// Compare two positions of `scores` by rank; `Less` means `a` ranks ahead of `b`.
fn rank(scores: &[f32], a: usize, b: usize) -> Ordering {
    let (va, vb) = (scores[a], scores[b]);
    let by_value = match (va.is_nan(), vb.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => vb.partial_cmp(&va).unwrap_or(Ordering::Equal),
    };
    by_value.then(a.cmp(&b))
}

/// Return the indices of the `k` highest scores, best first.
///
/// Runs in `O(n + k log k)`: a partial selection isolates the top `k` positions and only those
/// are sorted.
///
/// # Errors
///
/// [`SelectionError::EmptyInput`] when `scores` is empty, [`SelectionError::InvalidK`] when `k`
/// is zero or larger than `scores.len()`.
pub fn top_k(scores: &[f32], k: usize) -> Result<Vec<usize>, SelectionError> {
    if scores.is_empty() {
        return Err(SelectionError::EmptyInput);
    }
    if k == 0 || k > scores.len() {
        return Err(SelectionError::InvalidK {
            k,
            len: scores.len(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    let by_rank = |a: &usize, b: &usize| rank(scores, *a, *b);
    if k < order.len() {
        order.select_nth_unstable_by(k - 1, by_rank);
        order.truncate(k);
    }
    order.sort_unstable_by(by_rank);
    Ok(order)
}

/// Return the index of the highest score; the first occurrence wins on ties.
pub fn best_match(scores: &[f32]) -> Result<usize, SelectionError> {
    if scores.is_empty() {
        return Err(SelectionError::EmptyInput);
    }
    Ok((1..scores.len()).fold(0, |best, i| {
        if rank(scores, i, best).is_lt() { i } else { best }
    }))
}
