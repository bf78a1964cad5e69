//! Post-processing of merged candidates: duplicate elimination, nested-repeat
//! filtering and ranking.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::repeat::RepeatPattern;

/// Drops candidates that repeat an earlier `(reference_position, length, is_reverse)`
///
/// Workers that scan overlapping regions (or both index directions) can emit the
/// same repeat more than once. The first occurrence is kept.
#[must_use]
pub fn dedup_repeats(repeats: Vec<RepeatPattern>) -> Vec<RepeatPattern> {
    let mut seen = HashSet::with_capacity(repeats.len());
    repeats
        .into_iter()
        .filter(|r| seen.insert((r.reference_position, r.length, r.is_reverse)))
        .collect()
}

/// Keeps the longest repeat for every `(reference_position, is_reverse)` anchor
///
/// Among equally long candidates the first one seen wins. Surviving repeats keep
/// the order in which their anchor was first seen, so the filter is idempotent.
#[must_use]
pub fn filter_nested(repeats: Vec<RepeatPattern>) -> Vec<RepeatPattern> {
    let mut slots: HashMap<(usize, bool), usize> = HashMap::with_capacity(repeats.len());
    let mut kept: Vec<RepeatPattern> = Vec::with_capacity(repeats.len());

    for repeat in repeats {
        match slots.entry(repeat.anchor()) {
            Entry::Occupied(slot) => {
                let current = &mut kept[*slot.get()];
                if repeat.length > current.length {
                    *current = repeat;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(repeat);
            }
        }
    }
    kept
}

/// Sorts repeats by `length * repeat_count`, highest first
///
/// Ties are broken by `(reference_position, length, is_reverse)` ascending, so the
/// order never depends on how the input was assembled.
pub fn rank(repeats: &mut [RepeatPattern]) {
    repeats.sort_by_key(|r| {
        (
            Reverse(r.score()),
            r.reference_position,
            r.length,
            r.is_reverse,
        )
    });
}
