//! K-mer extraction and occurrence indexing.
//!
//! Every length-k window of the input sequences is 2-bit packed into a
//! `u64` and recorded with its (sequence, offset) occurrence. The index is
//! the shared substrate for de Bruijn graph construction and anchor
//! seeding.

use dashmap::DashMap;
use fnv::FnvHashMap;
use rayon::prelude::*;
use thiserror::Error;

use crate::cancel::{CancelToken, Progress};

/// Largest supported k: one symbol costs two bits of a `u64`.
pub const MAX_K: usize = 32;

/// A 2-bit packed k-mer; the first symbol occupies the highest bits.
pub type PackedKmer = u64;

/// Errors raised while building a k-mer index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KmerError {
    #[error("invalid k-mer length {k}: must be 1..={MAX_K} and no longer than the longest input sequence")]
    InvalidKmerLength { k: usize },

    #[error("at least one input sequence is required")]
    EmptySequenceInput,
}

pub type KmerResult<T> = Result<T, KmerError>;

/// One occurrence of a k-mer: which input sequence, and at what offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KmerOccurrence {
    pub sequence: u32,
    pub offset: u32,
}

/// Encode a symbol to its 2-bit representation.
pub fn encode_base(base: u8) -> Option<u64> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Decode a 2-bit code back to its upper-case symbol.
pub fn decode_base(code: u64) -> u8 {
    match code & 3 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => unreachable!(),
    }
}

/// Pack a window of exactly `window.len()` symbols, or `None` when any
/// symbol falls outside the alphabet.
pub fn pack_kmer(window: &[u8]) -> Option<PackedKmer> {
    debug_assert!(!window.is_empty() && window.len() <= MAX_K);
    let mut packed = 0u64;
    for &base in window {
        packed = (packed << 2) | encode_base(base)?;
    }
    Some(packed)
}

/// Unpack a k-mer into its symbol bytes.
pub fn unpack_kmer(kmer: PackedKmer, k: usize) -> Vec<u8> {
    (0..k)
        .map(|i| decode_base(kmer >> (2 * (k - 1 - i))))
        .collect()
}

/// Emit every valid (packed k-mer, offset) pair of one sequence.
///
/// Rolls a 2-bit window across the sequence, resetting on symbols outside
/// the alphabet so that no window containing them is emitted.
pub fn packed_kmers(sequence: &[u8], k: usize) -> Vec<(PackedKmer, u32)> {
    if k == 0 || k > MAX_K || sequence.len() < k {
        return Vec::new();
    }
    let mask = if k == MAX_K {
        u64::MAX
    } else {
        (1u64 << (2 * k)) - 1
    };
    let mut out = Vec::with_capacity(sequence.len() + 1 - k);
    let mut packed = 0u64;
    let mut valid = 0usize;
    for (i, &base) in sequence.iter().enumerate() {
        match encode_base(base) {
            Some(code) => {
                packed = ((packed << 2) | code) & mask;
                valid += 1;
            }
            None => {
                valid = 0;
            }
        }
        if valid >= k {
            out.push((packed, (i + 1 - k) as u32));
        }
    }
    out
}

/// Mapping from each distinct k-mer to its occurrences across a sequence
/// set. Occurrence lists are ascending by (sequence, offset); content is
/// independent of the number of worker threads used to build it.
#[derive(Debug, Clone, PartialEq)]
pub struct KmerIndex {
    k: usize,
    records: FnvHashMap<PackedKmer, Vec<KmerOccurrence>>,
    total_occurrences: u64,
}

impl KmerIndex {
    /// Index every sequence with the given k.
    ///
    /// Sequences shorter than k contribute zero k-mers; windows containing
    /// a symbol outside the alphabet are skipped. Fails before any work
    /// begins when k is out of range for every input or the input set is
    /// empty.
    pub fn build(sequences: &[&[u8]], k: usize) -> KmerResult<Self> {
        match Self::build_with_cancel(sequences, k, &CancelToken::new())? {
            Progress::Finished(index) => Ok(index),
            Progress::Cancelled => unreachable!("fresh token is never cancelled"),
        }
    }

    /// Cancellable variant of [`KmerIndex::build`]. The token is checked
    /// once per sequence; a cancelled build discards all partial
    /// accumulation and reports [`Progress::Cancelled`].
    pub fn build_with_cancel(
        sequences: &[&[u8]],
        k: usize,
        cancel: &CancelToken,
    ) -> KmerResult<Progress<Self>> {
        if sequences.is_empty() {
            return Err(KmerError::EmptySequenceInput);
        }
        let longest = sequences.iter().map(|s| s.len()).max().unwrap_or(0);
        if k == 0 || k > MAX_K || k > longest {
            return Err(KmerError::InvalidKmerLength { k });
        }

        // Sharded accumulation: sequences are indexed concurrently and
        // merged by k-mer key; the merge is commutative, so thread
        // interleaving cannot change the final content.
        let shards: DashMap<PackedKmer, Vec<KmerOccurrence>> = DashMap::new();
        sequences.par_iter().enumerate().for_each(|(seq_idx, seq)| {
            if cancel.is_cancelled() {
                return;
            }
            for (packed, offset) in packed_kmers(seq, k) {
                shards.entry(packed).or_default().push(KmerOccurrence {
                    sequence: seq_idx as u32,
                    offset,
                });
            }
        });
        if cancel.is_cancelled() {
            return Ok(Progress::Cancelled);
        }

        let mut total_occurrences = 0u64;
        let mut records =
            FnvHashMap::with_capacity_and_hasher(shards.len(), Default::default());
        for (kmer, mut occurrences) in shards.into_iter() {
            occurrences.sort_unstable();
            total_occurrences += occurrences.len() as u64;
            records.insert(kmer, occurrences);
        }
        Ok(Progress::Finished(Self {
            k,
            records,
            total_occurrences,
        }))
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of distinct k-mers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total occurrences over all k-mers, i.e. the number of valid
    /// length-k windows in the input.
    pub fn total_occurrences(&self) -> u64 {
        self.total_occurrences
    }

    pub fn contains(&self, kmer: PackedKmer) -> bool {
        self.records.contains_key(&kmer)
    }

    /// Occurrences of a packed k-mer, ascending by (sequence, offset).
    pub fn occurrences(&self, kmer: PackedKmer) -> &[KmerOccurrence] {
        self.records.get(&kmer).map_or(&[], Vec::as_slice)
    }

    /// Occurrences of a k-mer given as symbols.
    pub fn occurrences_of(&self, kmer: &[u8]) -> &[KmerOccurrence] {
        if kmer.len() != self.k {
            return &[];
        }
        match pack_kmer(kmer) {
            Some(packed) => self.occurrences(packed),
            None => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PackedKmer, &[KmerOccurrence])> {
        self.records.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Distinct k-mers in ascending packed order; the deterministic
    /// traversal used wherever downstream ids must be reproducible.
    pub fn sorted_kmers(&self) -> Vec<PackedKmer> {
        let mut kmers: Vec<PackedKmer> = self.records.keys().copied().collect();
        kmers.sort_unstable();
        kmers
    }

    /// True when `(sequence, offset)` holds this k-mer, by binary search
    /// over the sorted occurrence list.
    pub fn attests(&self, kmer: PackedKmer, sequence: u32, offset: u32) -> bool {
        self.occurrences(kmer)
            .binary_search(&KmerOccurrence { sequence, offset })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_roundtrip() {
        let packed = pack_kmer(b"ATGC").unwrap();
        assert_eq!(unpack_kmer(packed, 4), b"ATGC");
        assert_eq!(pack_kmer(b"atgc"), Some(packed));
        assert_eq!(pack_kmer(b"ATNX"), None);
    }

    #[test]
    fn window_scan_skips_invalid_symbols() {
        let kmers = packed_kmers(b"ACNGT", 2);
        let offsets: Vec<u32> = kmers.iter().map(|&(_, o)| o).collect();
        // Windows covering the N (offsets 1 and 2) are dropped.
        assert_eq!(offsets, vec![0, 3]);
    }

    #[test]
    fn repeated_kmers_collapse_with_counted_occurrences() {
        // k = 3 over "ATGCATGC": six windows, four distinct k-mers.
        let sequences: Vec<&[u8]> = vec![b"ATGCATGC"];
        let index = KmerIndex::build(&sequences, 3).unwrap();

        assert_eq!(index.len(), 4);
        assert_eq!(index.total_occurrences(), 6);
        assert_eq!(index.occurrences_of(b"ATG").len(), 2);
        assert_eq!(index.occurrences_of(b"TGC").len(), 2);
        assert_eq!(index.occurrences_of(b"GCA").len(), 1);
        assert_eq!(index.occurrences_of(b"CAT").len(), 1);

        let atg = index.occurrences_of(b"ATG");
        assert_eq!(atg[0], KmerOccurrence { sequence: 0, offset: 0 });
        assert_eq!(atg[1], KmerOccurrence { sequence: 0, offset: 4 });
    }

    #[test]
    fn occurrence_lists_are_ordered_across_sequences() {
        let sequences: Vec<&[u8]> = vec![b"TTACG", b"ACGTT", b"GACGT"];
        let index = KmerIndex::build(&sequences, 3).unwrap();
        let acg = index.occurrences_of(b"ACG");
        assert_eq!(
            acg,
            &[
                KmerOccurrence { sequence: 0, offset: 2 },
                KmerOccurrence { sequence: 1, offset: 0 },
                KmerOccurrence { sequence: 2, offset: 1 },
            ]
        );
        assert!(index.attests(pack_kmer(b"ACG").unwrap(), 1, 0));
        assert!(!index.attests(pack_kmer(b"ACG").unwrap(), 1, 1));
    }

    #[test]
    fn short_sequences_contribute_nothing() {
        let sequences: Vec<&[u8]> = vec![b"AC", b"ACGTAC"];
        let index = KmerIndex::build(&sequences, 4).unwrap();
        assert_eq!(index.total_occurrences(), 3);
        assert!(index
            .iter()
            .all(|(_, occurrences)| occurrences.iter().all(|o| o.sequence == 1)));
    }

    #[test]
    fn invalid_k_is_rejected_before_any_work() {
        let sequences: Vec<&[u8]> = vec![b"ACGT"];
        assert_eq!(
            KmerIndex::build(&sequences, 0),
            Err(KmerError::InvalidKmerLength { k: 0 })
        );
        assert_eq!(
            KmerIndex::build(&sequences, MAX_K + 1),
            Err(KmerError::InvalidKmerLength { k: MAX_K + 1 })
        );
        // k exceeding every input length is invalid too.
        assert_eq!(
            KmerIndex::build(&sequences, 5),
            Err(KmerError::InvalidKmerLength { k: 5 })
        );
        assert_eq!(
            KmerIndex::build(&[], 3),
            Err(KmerError::EmptySequenceInput)
        );
    }

    #[test]
    fn cancelled_build_returns_no_partial_index() {
        let sequences: Vec<&[u8]> = vec![b"ACGTACGT"; 8];
        let token = CancelToken::new();
        token.cancel();
        let progress = KmerIndex::build_with_cancel(&sequences, 3, &token).unwrap();
        assert!(progress.is_cancelled());
    }

    #[test]
    fn max_k_window_packs_without_overflow() {
        let sequence = [b'A'; 40];
        let kmers = packed_kmers(&sequence, MAX_K);
        assert_eq!(kmers.len(), 40 - MAX_K + 1);
        assert!(kmers.iter().all(|&(packed, _)| packed == 0));
    }
}
