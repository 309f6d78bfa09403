//! Exact pattern search and anchor generation.
//!
//! Two entry points share the k-mer/substring machinery: a suffix-array
//! [`PatternIndex`] answering exact substring queries (one pre-processing
//! pass shared across a batch of patterns), and [`find_anchors`], which
//! emits the maximal exact matches between a reference and a query as
//! [`Match`] records for downstream chaining.

use std::cmp::Ordering;
use std::collections::HashMap;

use fnv::FnvHashMap;
use rayon::prelude::*;
use thiserror::Error;

use crate::cancel::{CancelToken, Progress};
use crate::kmer::{packed_kmers, PackedKmer, MAX_K};
use crate::types::{Match, SeqPos};

/// Errors raised by anchor generation. `OffsetOutOfBounds` flags an
/// internal algorithm defect and is always fatal; results are never
/// silently clamped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("internal defect: match (reference {reference_offset}, query {query_offset}, length {length}) exceeds sequence bounds")]
    OffsetOutOfBounds {
        reference_offset: SeqPos,
        query_offset: SeqPos,
        length: SeqPos,
    },
}

pub type MatchResult<T> = Result<T, MatchError>;

/// Suffix-array index over one sequence for exact substring queries.
pub struct PatternIndex {
    text: Vec<u8>,
    suffix_array: Vec<u32>,
    case_insensitive: bool,
}

impl PatternIndex {
    /// Build the index. With `case_insensitive`, both the sequence and
    /// every query pattern are canonicalized to upper case.
    pub fn new(sequence: &[u8], case_insensitive: bool) -> Self {
        let text = if case_insensitive {
            sequence.to_ascii_uppercase()
        } else {
            sequence.to_vec()
        };
        let suffix_array = build_suffix_array(&text);
        Self {
            text,
            suffix_array,
            case_insensitive,
        }
    }

    pub fn sequence_len(&self) -> usize {
        self.text.len()
    }

    /// Every starting offset of `pattern`, ascending. Overlapping
    /// occurrences are all reported. An empty pattern, empty sequence, or
    /// pattern longer than the sequence yields an empty result.
    pub fn find(&self, pattern: &[u8]) -> Vec<usize> {
        if pattern.is_empty() || self.text.is_empty() || pattern.len() > self.text.len() {
            return Vec::new();
        }
        let canonical;
        let pattern = if self.case_insensitive {
            canonical = pattern.to_ascii_uppercase();
            canonical.as_slice()
        } else {
            pattern
        };

        let lower = self
            .suffix_array
            .partition_point(|&i| compare_prefix(&self.text[i as usize..], pattern) == Ordering::Less);
        let upper = self
            .suffix_array
            .partition_point(|&i| compare_prefix(&self.text[i as usize..], pattern) != Ordering::Greater);

        let mut offsets: Vec<usize> = self.suffix_array[lower..upper]
            .iter()
            .map(|&i| i as usize)
            .collect();
        offsets.sort_unstable();
        offsets
    }

    /// Batch query: one result list per pattern, sharing this index.
    pub fn find_all(&self, patterns: &[&[u8]]) -> HashMap<Vec<u8>, Vec<usize>> {
        patterns
            .iter()
            .map(|&pattern| (pattern.to_vec(), self.find(pattern)))
            .collect()
    }
}

/// Compare a suffix against a pattern, prefix-wise: a suffix that starts
/// with the pattern compares `Equal`.
fn compare_prefix(suffix: &[u8], pattern: &[u8]) -> Ordering {
    let m = suffix.len().min(pattern.len());
    match suffix[..m].cmp(&pattern[..m]) {
        Ordering::Equal if suffix.len() < pattern.len() => Ordering::Less,
        ordering => ordering,
    }
}

/// Suffix array by prefix doubling: ranks are refined over windows of
/// doubling length until all suffixes are totally ordered.
fn build_suffix_array(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<u32> = (0..n as u32).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| b as i64).collect();
    let mut next_rank = vec![0i64; n];
    let mut len = 1;
    while len < n {
        let key = |i: usize| {
            let second = if i + len < n { rank[i + len] } else { -1 };
            (rank[i], second)
        };
        sa.sort_unstable_by_key(|&i| key(i as usize));
        next_rank[sa[0] as usize] = 0;
        for w in 1..n {
            let prev = sa[w - 1] as usize;
            let cur = sa[w] as usize;
            next_rank[cur] = next_rank[prev] + i64::from(key(cur) != key(prev));
        }
        rank.copy_from_slice(&next_rank);
        if rank[sa[n - 1] as usize] as usize == n - 1 {
            break;
        }
        len *= 2;
    }
    sa
}

/// Configuration for maximal-exact-match anchor generation.
#[derive(Debug, Clone)]
pub struct AnchorParams {
    /// Shortest match worth reporting as an anchor.
    pub min_match_length: usize,
}

impl Default for AnchorParams {
    fn default() -> Self {
        Self {
            min_match_length: 20,
        }
    }
}

fn same_base(a: u8, b: u8) -> bool {
    a == b && matches!(a, b'A' | b'C' | b'G' | b'T')
}

/// Find every maximal exact match of length >= `min_match_length` between
/// reference and query, as [`Match`] records sorted by ascending
/// (reference, query) offset.
///
/// Symbols are canonicalized to upper case; runs never span symbols
/// outside the alphabet. A maximal run is reported once, at its start:
/// seeds inside a run are recognized by their extendable left flank and
/// skipped, so partitioned scanning cannot drop or duplicate a run that
/// straddles a partition boundary.
pub fn find_anchors(
    reference: &[u8],
    query: &[u8],
    params: &AnchorParams,
) -> MatchResult<Vec<Match>> {
    match find_anchors_with_cancel(reference, query, params, &CancelToken::new())? {
        Progress::Finished(anchors) => Ok(anchors),
        Progress::Cancelled => unreachable!("fresh token is never cancelled"),
    }
}

/// Cancellable variant of [`find_anchors`]; the token is checked per query
/// partition.
pub fn find_anchors_with_cancel(
    reference: &[u8],
    query: &[u8],
    params: &AnchorParams,
    cancel: &CancelToken,
) -> MatchResult<Progress<Vec<Match>>> {
    if reference.is_empty() || query.is_empty() {
        return Ok(Progress::Finished(Vec::new()));
    }
    let min_len = params.min_match_length.max(1);
    let seed_len = min_len.min(MAX_K);

    let reference = reference.to_ascii_uppercase();
    let query = query.to_ascii_uppercase();

    let mut seeds: FnvHashMap<PackedKmer, Vec<u32>> = FnvHashMap::default();
    for (packed, offset) in packed_kmers(&reference, seed_len) {
        seeds.entry(packed).or_default().push(offset);
    }

    let query_kmers = packed_kmers(&query, seed_len);
    let partitions: Vec<Vec<Match>> = query_kmers
        .par_chunks(4096)
        .map(|chunk| {
            if cancel.is_cancelled() {
                return Vec::new();
            }
            let mut local = Vec::new();
            for &(packed, query_pos) in chunk {
                let Some(reference_positions) = seeds.get(&packed) else {
                    continue;
                };
                for &reference_pos in reference_positions {
                    let r = reference_pos as usize;
                    let q = query_pos as usize;
                    if r > 0 && q > 0 && same_base(reference[r - 1], query[q - 1]) {
                        // Not the start of the run; the leftmost seed of
                        // this run reports it.
                        continue;
                    }
                    let mut len = seed_len;
                    while r + len < reference.len()
                        && q + len < query.len()
                        && same_base(reference[r + len], query[q + len])
                    {
                        len += 1;
                    }
                    if len >= min_len {
                        local.push(Match::new(r as SeqPos, q as SeqPos, len as SeqPos));
                    }
                }
            }
            local
        })
        .collect();
    if cancel.is_cancelled() {
        return Ok(Progress::Cancelled);
    }

    let mut anchors: Vec<Match> = partitions.into_iter().flatten().collect();
    anchors.sort_unstable_by_key(|m| (m.reference_offset, m.query_offset));
    anchors.dedup();

    for anchor in &anchors {
        if anchor.reference_end() > reference.len() as SeqPos
            || anchor.query_end() > query.len() as SeqPos
            || anchor.length == 0
        {
            return Err(MatchError::OffsetOutOfBounds {
                reference_offset: anchor.reference_offset,
                query_offset: anchor.query_offset,
                length: anchor.length,
            });
        }
    }
    Ok(Progress::Finished(anchors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn naive_find(text: &[u8], pattern: &[u8]) -> Vec<usize> {
        if pattern.is_empty() || pattern.len() > text.len() {
            return Vec::new();
        }
        (0..=text.len() - pattern.len())
            .filter(|&i| &text[i..i + pattern.len()] == pattern)
            .collect()
    }

    #[test]
    fn overlapping_occurrences_are_all_reported() {
        let index = PatternIndex::new(b"ACACA", false);
        assert_eq!(index.find(b"ACA"), vec![0, 2]);
    }

    #[test]
    fn degenerate_queries_yield_empty_results() {
        let index = PatternIndex::new(b"ACGT", false);
        assert!(index.find(b"").is_empty());
        assert!(index.find(b"ACGTA").is_empty());
        let empty = PatternIndex::new(b"", false);
        assert!(empty.find(b"A").is_empty());
    }

    #[test]
    fn case_sensitivity_is_a_flag() {
        let insensitive = PatternIndex::new(b"acgtACGT", true);
        assert_eq!(insensitive.find(b"ACGT"), vec![0, 4]);
        assert_eq!(insensitive.find(b"acgt"), vec![0, 4]);

        let sensitive = PatternIndex::new(b"acgtACGT", false);
        assert_eq!(sensitive.find(b"ACGT"), vec![4]);
        assert_eq!(sensitive.find(b"acgt"), vec![0]);
    }

    #[test]
    fn batch_query_shares_one_index() {
        let index = PatternIndex::new(b"ACGTACGT", false);
        let results = index.find_all(&[b"ACGT".as_slice(), b"CG".as_slice(), b"TTT".as_slice()]);
        assert_eq!(results[b"ACGT".as_slice()], vec![0, 4]);
        assert_eq!(results[b"CG".as_slice()], vec![1, 5]);
        assert!(results[b"TTT".as_slice()].is_empty());
    }

    #[test]
    fn anchors_found_at_both_reference_copies() {
        let anchors = find_anchors(
            b"ACGTACGT",
            b"ACGT",
            &AnchorParams {
                min_match_length: 4,
            },
        )
        .unwrap();
        assert_eq!(
            anchors,
            vec![Match::new(0, 0, 4), Match::new(4, 0, 4)]
        );
    }

    #[test]
    fn anchors_are_maximal_runs() {
        let anchors = find_anchors(
            b"GGACGTGG",
            b"TTACGTTT",
            &AnchorParams {
                min_match_length: 3,
            },
        )
        .unwrap();
        // One shared run "ACGT"; no sub-run of it is reported separately.
        assert_eq!(anchors, vec![Match::new(2, 2, 4)]);
    }

    #[test]
    fn anchors_canonicalize_case() {
        let anchors = find_anchors(
            b"acgtacgt",
            b"ACGT",
            &AnchorParams {
                min_match_length: 4,
            },
        )
        .unwrap();
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn empty_inputs_yield_no_anchors() {
        let params = AnchorParams::default();
        assert!(find_anchors(b"", b"ACGT", &params).unwrap().is_empty());
        assert!(find_anchors(b"ACGT", b"", &params).unwrap().is_empty());
    }

    #[test]
    fn cancelled_anchor_search_reports_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let progress = find_anchors_with_cancel(
            b"ACGTACGT",
            b"ACGT",
            &AnchorParams {
                min_match_length: 4,
            },
            &token,
        )
        .unwrap();
        assert!(progress.is_cancelled());
    }

    proptest! {
        #[test]
        fn find_agrees_with_naive_scan(
            text in proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 0..120),
            pattern in proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 1..5),
        ) {
            let index = PatternIndex::new(&text, false);
            prop_assert_eq!(index.find(&pattern), naive_find(&text, &pattern));
        }
    }
}
