//! Longest-increasing-subsequence chaining.
//!
//! Selects the longest subset of anchors that is strictly increasing and
//! non-overlapping in both the reference and the query coordinate: the
//! best-supported colinear skeleton through ambiguous, repetitive anchors.
//! Runs in O(n log n): matches are scanned in ascending (reference, query)
//! order while completed candidates are activated into a Fenwick tree
//! keyed by query end, giving the best chainable predecessor per match in
//! logarithmic time.

use crate::types::Match;

const NONE: u32 = u32::MAX;

/// Fenwick tree over compressed query ends holding, per prefix, the best
/// `(chain length, scan index)` seen. Longer chains win; equal lengths
/// keep the candidate reached earlier in scan order, which pins the
/// documented tie-break.
struct FenwickMax {
    tree: Vec<(u32, u32)>,
}

fn better(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 > b.0 || (a.0 == b.0 && a.0 > 0 && a.1 < b.1)
}

impl FenwickMax {
    fn new(size: usize) -> Self {
        Self {
            tree: vec![(0, NONE); size + 1],
        }
    }

    fn update(&mut self, position: usize, value: (u32, u32)) {
        let mut i = position + 1;
        while i < self.tree.len() {
            if better(value, self.tree[i]) {
                self.tree[i] = value;
            }
            i += i & i.wrapping_neg();
        }
    }

    /// Best value over the first `count` positions.
    fn prefix_max(&self, count: usize) -> (u32, u32) {
        let mut best = (0, NONE);
        let mut i = count;
        while i > 0 {
            if better(self.tree[i], best) {
                best = self.tree[i];
            }
            i -= i & i.wrapping_neg();
        }
        best
    }
}

/// Chain the matches: returns the longest subset in which every match
/// strictly precedes the next in both coordinates without overlap.
///
/// Deterministic: among maximal chains of equal length, the one reached
/// first when scanning matches sorted by ascending reference offset, then
/// ascending query offset, wins.
pub fn chain(matches: &[Match]) -> Vec<Match> {
    let n = matches.len();
    if n == 0 {
        return Vec::new();
    }

    // Scan order: ascending (reference, query, length).
    let mut order: Vec<u32> = (0..n as u32).collect();
    order.sort_unstable_by_key(|&i| {
        let m = &matches[i as usize];
        (m.reference_offset, m.query_offset, m.length)
    });

    // Activation order: a candidate becomes a legal predecessor once its
    // reference end is behind the scanned match's reference offset.
    let mut activation: Vec<u32> = (0..n as u32).collect();
    activation.sort_unstable_by_key(|&s| (matches[order[s as usize] as usize].reference_end(), s));

    let mut query_ends: Vec<u64> = order
        .iter()
        .map(|&i| matches[i as usize].query_end())
        .collect();
    query_ends.sort_unstable();
    query_ends.dedup();

    let mut tree = FenwickMax::new(query_ends.len());
    let mut chain_len = vec![0u32; n];
    let mut parent = vec![NONE; n];
    let mut activated = 0usize;
    let mut best = (0u32, NONE);

    for scan in 0..n {
        let m = &matches[order[scan] as usize];

        while activated < n {
            let candidate = activation[activated] as usize;
            let cm = &matches[order[candidate] as usize];
            if cm.reference_end() > m.reference_offset {
                break;
            }
            // Candidates activate strictly after their own scan turn, so
            // their chain length is final here.
            let slot = query_ends
                .binary_search(&cm.query_end())
                .expect("query end was collected");
            tree.update(slot, (chain_len[candidate], candidate as u32));
            activated += 1;
        }

        let eligible = query_ends.partition_point(|&qe| qe <= m.query_offset);
        let (predecessor_len, predecessor) = tree.prefix_max(eligible);
        chain_len[scan] = predecessor_len + 1;
        parent[scan] = predecessor;
        if chain_len[scan] > best.0 {
            best = (chain_len[scan], scan as u32);
        }
    }

    let mut selected = Vec::with_capacity(best.0 as usize);
    let mut cursor = best.1;
    while cursor != NONE {
        selected.push(matches[order[cursor as usize] as usize]);
        cursor = parent[cursor as usize];
    }
    selected.reverse();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// O(n^2) reference implementation over matches sorted in scan order.
    fn brute_force_chain_len(matches: &[Match]) -> usize {
        let mut sorted = matches.to_vec();
        sorted.sort_unstable_by_key(|m| (m.reference_offset, m.query_offset, m.length));
        let mut longest = vec![0usize; sorted.len()];
        let mut best = 0;
        for i in 0..sorted.len() {
            longest[i] = 1;
            for j in 0..i {
                if sorted[j].precedes(&sorted[i]) {
                    longest[i] = longest[i].max(longest[j] + 1);
                }
            }
            best = best.max(longest[i]);
        }
        best
    }

    fn assert_valid_chain(chain: &[Match]) {
        for pair in chain.windows(2) {
            assert!(
                pair[0].precedes(&pair[1]),
                "{:?} does not precede {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn empty_input_chains_to_nothing() {
        assert!(chain(&[]).is_empty());
    }

    #[test]
    fn colinear_matches_all_chain() {
        let matches = vec![Match::new(0, 0, 3), Match::new(4, 3, 3)];
        assert_eq!(chain(&matches), matches);
    }

    #[test]
    fn crossing_matches_cannot_share_a_chain() {
        // The middle match crosses both others; the chain keeps the
        // colinear pair.
        let matches = vec![
            Match::new(0, 4, 4),
            Match::new(4, 0, 3),
            Match::new(10, 10, 3),
        ];
        assert_eq!(
            chain(&matches),
            vec![Match::new(0, 4, 4), Match::new(10, 10, 3)]
        );
    }

    #[test]
    fn overlap_in_one_coordinate_blocks_chaining() {
        // Second match overlaps the first in query only.
        let matches = vec![Match::new(0, 0, 4), Match::new(10, 2, 4)];
        assert_eq!(chain(&matches).len(), 1);
    }

    #[test]
    fn equal_length_chains_break_ties_by_scan_order() {
        // Two interchangeable single-match chains: the lower reference
        // offset wins.
        let matches = vec![Match::new(4, 0, 4), Match::new(0, 0, 4)];
        assert_eq!(chain(&matches), vec![Match::new(0, 0, 4)]);
    }

    #[test]
    fn duplicate_matches_collapse_to_one() {
        let matches = vec![Match::new(0, 0, 4), Match::new(0, 0, 4)];
        assert_eq!(chain(&matches).len(), 1);
    }

    #[test]
    fn abutting_matches_chain() {
        // End offsets equal next start offsets: allowed, not overlapping.
        let matches = vec![Match::new(0, 0, 4), Match::new(4, 4, 4)];
        assert_eq!(chain(&matches).len(), 2);
    }

    proptest! {
        #[test]
        fn chain_is_valid_and_maximal(
            raw in proptest::collection::vec((0u64..40, 0u64..40, 1u64..5), 0..14),
        ) {
            let matches: Vec<Match> = raw
                .into_iter()
                .map(|(r, q, l)| Match::new(r, q, l))
                .collect();
            let selected = chain(&matches);
            assert_valid_chain(&selected);
            prop_assert_eq!(selected.len(), brute_force_chain_len(&matches));
        }
    }
}
