//! Weighted random selection of challenge templates.

use rand::Rng;

/// Roulette-wheel draw over `items`.
///
/// A threshold is drawn in `[0, total)` and consumed by a linear scan. Items
/// with a non-positive weight are never drawn, unless every weight is
/// non-positive, in which case the draw is uniform.
pub fn pick_weighted<'a, T, R, F>(items: &'a [T], weight: F, rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
    F: Fn(&T) -> i64,
{
    if items.is_empty() {
        return None;
    }

    let total: i64 = items.iter().map(|item| weight(item).max(0)).sum();
    if total == 0 {
        return items.get(rng.gen_range(0..items.len()));
    }

    let mut threshold = rng.gen_range(0..total);
    for item in items {
        let w = weight(item);
        if w <= 0 {
            continue;
        }
        if threshold < w {
            return Some(item);
        }
        threshold -= w;
    }

    // threshold < total guarantees the scan returns
    items.iter().rev().find(|item| weight(item) > 0)
}
