use serde::{Deserialize, Serialize};

/// Position or length inside a symbol sequence.
pub type SeqPos = u64;

/// An exact equal-length run shared by the reference and the query.
///
/// Plain value record: copying a `Match` copies the three coordinates and
/// nothing else. Invariant: `length > 0`,
/// `reference_offset + length <= |reference|` and
/// `query_offset + length <= |query|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Match {
    pub reference_offset: SeqPos,
    pub query_offset: SeqPos,
    pub length: SeqPos,
}

impl Match {
    pub fn new(reference_offset: SeqPos, query_offset: SeqPos, length: SeqPos) -> Self {
        Self {
            reference_offset,
            query_offset,
            length,
        }
    }

    /// One past the last covered reference position.
    pub fn reference_end(&self) -> SeqPos {
        self.reference_offset + self.length
    }

    /// One past the last covered query position.
    pub fn query_end(&self) -> SeqPos {
        self.query_offset + self.length
    }

    /// Diagonal of the match in the (reference, query) plane.
    pub fn diagonal(&self) -> i64 {
        self.reference_offset as i64 - self.query_offset as i64
    }

    /// True when `other` can follow this match in a chain: strictly
    /// increasing and non-overlapping in both coordinates.
    pub fn precedes(&self, other: &Match) -> bool {
        other.reference_offset >= self.reference_end() && other.query_offset >= self.query_end()
    }
}

/// An ordered run of mutually consistent matches.
///
/// Matches are non-decreasing in both coordinates and never overlap; a
/// cluster is owned by exactly one [`Synteny`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    matches: Vec<Match>,
}

impl Cluster {
    pub fn new(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Total number of matched symbols across the cluster.
    pub fn total_match_length(&self) -> SeqPos {
        self.matches.iter().map(|m| m.length).sum()
    }

    /// Half-open reference span covered by the cluster.
    pub fn reference_range(&self) -> (SeqPos, SeqPos) {
        let start = self.matches.first().map_or(0, |m| m.reference_offset);
        let end = self.matches.last().map_or(0, |m| m.reference_end());
        (start, end)
    }

    /// Half-open query span covered by the cluster.
    pub fn query_range(&self) -> (SeqPos, SeqPos) {
        let start = self.matches.first().map_or(0, |m| m.query_offset);
        let end = self.matches.last().map_or(0, |m| m.query_end());
        (start, end)
    }
}

/// Ordered syntenic blocks between one reference and one query sequence.
///
/// The sequences are borrowed, never owned: a `Synteny` is valid for the
/// duration of the enclosing alignment call and does not extend the
/// lifetime of its inputs. Clusters are held in ascending reference
/// coordinate order.
#[derive(Debug)]
pub struct Synteny<'a> {
    reference: &'a [u8],
    query: &'a [u8],
    clusters: Vec<Cluster>,
}

impl<'a> Synteny<'a> {
    pub fn new(reference: &'a [u8], query: &'a [u8], clusters: Vec<Cluster>) -> Self {
        Self {
            reference,
            query,
            clusters,
        }
    }

    pub fn reference(&self) -> &'a [u8] {
        self.reference
    }

    pub fn query(&self) -> &'a [u8] {
        self.query
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total matched symbols summed over all clusters.
    pub fn total_matched(&self) -> SeqPos {
        self.clusters.iter().map(|c| c.total_match_length()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_ends_and_diagonal() {
        let m = Match::new(10, 4, 6);
        assert_eq!(m.reference_end(), 16);
        assert_eq!(m.query_end(), 10);
        assert_eq!(m.diagonal(), 6);
    }

    #[test]
    fn precedes_requires_both_coordinates() {
        let a = Match::new(0, 0, 4);
        assert!(a.precedes(&Match::new(4, 4, 2)));
        // Overlap in query only.
        assert!(!a.precedes(&Match::new(4, 3, 2)));
        // Overlap in reference only.
        assert!(!a.precedes(&Match::new(3, 4, 2)));
        // A match never precedes itself.
        assert!(!a.precedes(&a));
    }

    #[test]
    fn cluster_spans() {
        let cluster = Cluster::new(vec![Match::new(2, 1, 3), Match::new(8, 6, 4)]);
        assert_eq!(cluster.total_match_length(), 7);
        assert_eq!(cluster.reference_range(), (2, 12));
        assert_eq!(cluster.query_range(), (1, 10));
    }

    #[test]
    fn synteny_borrows_sequences() {
        let reference = b"ACGTACGT".to_vec();
        let query = b"ACGT".to_vec();
        let synteny = Synteny::new(
            &reference,
            &query,
            vec![Cluster::new(vec![Match::new(0, 0, 4)])],
        );
        assert_eq!(synteny.reference(), reference.as_slice());
        assert_eq!(synteny.len(), 1);
        assert_eq!(synteny.total_matched(), 4);
    }
}
