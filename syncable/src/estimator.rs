//! The order-reconstruction estimator (`spec.md` §4.7).
//!
//! Given two sequences over the same multiset of keys, produces a
//! deterministic, close-to-minimal list of keys such that removing and
//! re-inserting each (in the listed order, at its `dst` position) carries
//! `src` to `dst` exactly. Confirmed against `ZDCOrder.h`'s
//! `estimateChangesetFrom:to:hints:` in `original_source/`.
//!
//! Not claimed optimal — `spec.md` explicitly disclaims minimality
//! ("if you're a math genius, you're welcome to try your hand at solving
//! this problem").

use std::collections::HashSet;
use std::hash::Hash;

/// Estimates the move list that carries `src` to `dst`.
///
/// `hints` are keys already known to likely have moved (e.g. keys that also
/// appear in a map changeset's value edits); seeding with them first tends
/// to produce a shorter move list, but does not affect correctness — the
/// result always reproduces `dst` exactly regardless of which hints are
/// supplied. Hints are seeded in `dst` order rather than by iterating the
/// set directly, so the returned move list is deterministic and doesn't
/// depend on `HashSet`'s iteration order.
///
/// # Panics
/// Does not panic, but the result is only meaningful if `src` and `dst` are
/// permutations of the same multiset. Keys in `dst` but not `src` (or vice
/// versa) are silently ignored by the positional search, which can produce
/// a move list that doesn't fully reproduce `dst` — callers are expected to
/// reconcile membership (inserts/removes) before calling the estimator.
pub fn estimate_moves<K>(src: &[K], dst: &[K], hints: &HashSet<K>) -> Vec<K>
where
    K: Eq + Hash + Clone,
{
    let mut working = src.to_vec();
    let mut moves = Vec::new();

    // Step 1: seed with hinted keys already out of place, in `dst` order so
    // the result doesn't depend on `hints`' (unordered) hash iteration order.
    for key in dst {
        if !hints.contains(key) {
            continue;
        }
        if let (Some(cur), Some(target)) = (position_of(&working, key), position_of(dst, key)) {
            if cur != target {
                apply_move(&mut working, key, target);
                moves.push(key.clone());
            }
        }
    }

    // Step 2: left-to-right pass over dst.
    for (i, key) in dst.iter().enumerate() {
        match position_of(&working, key) {
            Some(j) if j != i => {
                apply_move(&mut working, key, i);
                moves.push(key.clone());
            }
            _ => {}
        }
    }

    moves
}

fn position_of<K: Eq>(seq: &[K], key: &K) -> Option<usize> {
    seq.iter().position(|k| k == key)
}

/// Removes `key` from its current position in `seq` and re-inserts it at
/// `target`, clamping if the sequence shrank past `target` (shouldn't
/// happen for a permutation of matching multisets, but keeps this total).
fn apply_move<K: Eq>(seq: &mut Vec<K>, key: &K, target: usize) {
    if let Some(pos) = position_of(seq, key) {
        let value = seq.remove(pos);
        let target = target.min(seq.len());
        seq.insert(target, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_estimate(src: &[&str], moves: &[&str], dst: &[&str]) -> Vec<String> {
        let mut working: Vec<String> = src.iter().map(|s| s.to_string()).collect();
        for m in moves {
            let target = dst.iter().position(|k| k == m).unwrap();
            apply_move(&mut working, &m.to_string(), target);
        }
        working
    }

    #[test]
    fn s4_move_c_to_front() {
        // spec.md S4: [a,b,c] -> [c,a,b], expected moves = [c]
        let src = ["a", "b", "c"];
        let dst = ["c", "a", "b"];
        let moves = estimate_moves(&src, &dst, &HashSet::new());
        assert_eq!(moves, vec!["c"]);
        assert_eq!(apply_estimate(&src, &moves, &dst), dst);
    }

    #[test]
    fn identity_produces_no_moves() {
        let src = ["a", "b", "c"];
        let moves = estimate_moves(&src, &src, &HashSet::new());
        assert!(moves.is_empty());
    }

    #[test]
    fn reverses_entire_sequence() {
        let src = ["a", "b", "c", "d"];
        let dst = ["d", "c", "b", "a"];
        let moves = estimate_moves(&src, &dst, &HashSet::new());
        assert_eq!(apply_estimate(&src, &moves, &dst), dst);
    }

    #[test]
    fn hints_seed_moves_without_changing_correctness() {
        let src = ["a", "b", "c", "d", "e"];
        let dst = ["a", "d", "b", "c", "e"];
        let hints: HashSet<String> = ["d".to_string()].into_iter().collect();
        let moves = estimate_moves(&src, &dst, &hints);
        assert_eq!(apply_estimate(&src, &moves, &dst), dst);
    }

    #[test]
    fn hint_seeding_order_is_deterministic() {
        // two hinted keys both out of place: the move list must come out the
        // same regardless of HashSet's internal iteration order.
        let src = ["a", "b", "c", "d", "e"];
        let dst = ["e", "a", "d", "b", "c"];
        let hints: HashSet<&str> = ["d", "e"].into_iter().collect();
        let first = estimate_moves(&src, &dst, &hints);
        for _ in 0..8 {
            assert_eq!(estimate_moves(&src, &dst, &hints), first);
        }
    }

    #[test]
    fn swap_two_adjacent() {
        let src = ["a", "b"];
        let dst = ["b", "a"];
        let moves = estimate_moves(&src, &dst, &HashSet::new());
        assert_eq!(apply_estimate(&src, &moves, &dst), dst);
    }
}
