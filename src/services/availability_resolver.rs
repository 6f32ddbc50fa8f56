//! Availability resolver.
//!
//! Finds the index closest to a target whose binary can be obtained, probing
//! outward in both directions. The probes of one radius step run
//! concurrently and are joined before deciding, so the answer does not
//! depend on which probe finishes first.

use futures::future::join_all;
use std::future::Future;
use std::ops::Range;
use tracing::trace;

use crate::domain::errors::{SearchError, SearchResult};

/// Nearest available index to `target` within `0..len`.
pub async fn closest_available<F, Fut>(len: usize, target: usize, probe: F) -> SearchResult<usize>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = bool>,
{
    closest_available_within(0..len, target, probe).await
}

/// Nearest available index to `target` restricted to `bounds`.
///
/// Distances are absolute; on a tie the smaller index wins. A target outside
/// `bounds` is clamped onto the nearest bound first. Results of `probe` are
/// not cached here.
///
/// # Errors
///
/// Returns [`SearchError::NoAvailableRevision`] once every index in `bounds`
/// has been probed without success.
pub async fn closest_available_within<F, Fut>(
    bounds: Range<usize>,
    target: usize,
    probe: F,
) -> SearchResult<usize>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = bool>,
{
    if bounds.is_empty() {
        return Err(SearchError::NoAvailableRevision { target });
    }
    let center = target.clamp(bounds.start, bounds.end - 1);

    let mut radius = 0usize;
    loop {
        let mut candidates: Vec<usize> = [
            center.checked_add(radius),
            center.checked_add(radius + 1),
            center.checked_sub(radius),
            center.checked_sub(radius + 1),
        ]
        .into_iter()
        .flatten()
        .filter(|index| bounds.contains(index))
        .collect();
        candidates.sort_unstable();
        candidates.dedup();

        if candidates.is_empty() {
            return Err(SearchError::NoAvailableRevision { target });
        }

        let answers = join_all(candidates.iter().map(|&index| probe(index))).await;
        trace!(target, radius, ?candidates, ?answers, "probed availability");

        let closest = candidates
            .iter()
            .zip(answers)
            .filter_map(|(&index, available)| available.then_some(index))
            .min_by_key(|&index| (index.abs_diff(center), index));

        if let Some(index) = closest {
            return Ok(index);
        }
        radius += 2;
    }
}
