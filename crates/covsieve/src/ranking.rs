//! Report ordering for deltas
//!
//! Lines first, then instructions, branches and methods, all descending.
//! The sort is stable, so ties keep discovery order. There is no further
//! tie-break.

use crate::delta::DeltaMetrics;
use std::cmp::Ordering;

/// Comparator placing the larger contribution first
pub fn compare_deltas<D: DeltaMetrics>(a: &D, b: &D) -> Ordering {
    b.added_lines()
        .cmp(&a.added_lines())
        .then_with(|| b.added_instructions().cmp(&a.added_instructions()))
        .then_with(|| b.added_branches().cmp(&a.added_branches()))
        .then_with(|| b.added_methods().cmp(&a.added_methods()))
}

/// Sort deltas in report order
#[must_use]
pub fn rank<D: DeltaMetrics>(mut deltas: Vec<D>) -> Vec<D> {
    deltas.sort_by(compare_deltas);
    deltas
}

/// The `n` highest-ranked deltas
#[must_use]
pub fn top_n<D: DeltaMetrics>(deltas: Vec<D>, n: usize) -> Vec<D> {
    let mut ranked = rank(deltas);
    ranked.truncate(n);
    ranked
}
