// src/transform/dedup.rs

use std::collections::HashSet;
use std::hash::Hash;

/// Keep the first row for every key, in source order.
///
/// Returns the surviving rows and the number of duplicates dropped.
/// Later duplicates are discarded as-is; nothing is merged.
pub fn dedup_first_by<T, K, F>(rows: Vec<T>, key: F) -> (Vec<T>, usize)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(rows.len());
    let before = rows.len();
    let kept: Vec<T> = rows.into_iter().filter(|r| seen.insert(key(r))).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
