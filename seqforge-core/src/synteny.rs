//! Synteny construction: partitioning a chain of matches into clusters.
//!
//! A cluster is a maximal run of chained matches whose consecutive gaps
//! stay within a configurable separation bound and whose diagonal drift
//! stays within a fixed-plus-proportional tolerance. Clusters are ordered
//! by ascending reference coordinate and never interleave.

use serde::{Deserialize, Serialize};

use crate::lis;
use crate::types::{Cluster, Match, SeqPos, Synteny};

/// Clustering policy. Gap tolerance and the diagonal tie-break are
/// explicit parameters, not constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Maximum separation between adjacent matches, in either coordinate.
    pub max_separation: SeqPos,
    /// Diagonal difference always tolerated between adjacent matches.
    pub fixed_diagonal_difference: SeqPos,
    /// Fraction of the separation additionally tolerated as diagonal
    /// drift; higher values increase indel tolerance.
    pub separation_factor: f64,
    /// Minimum total matched symbols for a cluster to be reported.
    pub min_cluster_length: SeqPos,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            max_separation: 1000,
            fixed_diagonal_difference: 5,
            separation_factor: 0.05,
            min_cluster_length: 65,
        }
    }
}

/// Builds [`Synteny`] objects from chained (or raw) matches.
#[derive(Debug, Clone, Default)]
pub struct SyntenyBuilder {
    params: ClusterParams,
}

impl SyntenyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: ClusterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    /// Partition the matches into ordered clusters between the given
    /// sequence pair. Input that is not already a valid chain is chained
    /// internally first.
    pub fn build<'a>(
        &self,
        reference: &'a [u8],
        query: &'a [u8],
        matches: &[Match],
    ) -> Synteny<'a> {
        let chained;
        let chain: &[Match] = if is_chain(matches) {
            matches
        } else {
            chained = lis::chain(matches);
            &chained
        };

        let mut clusters = Vec::new();
        let mut run: Vec<Match> = Vec::new();
        for &m in chain {
            if let Some(&previous) = run.last() {
                if !self.belongs_to_run(&previous, &m) {
                    self.flush(&mut clusters, std::mem::take(&mut run));
                }
            }
            run.push(m);
        }
        self.flush(&mut clusters, run);

        Synteny::new(reference, query, clusters)
    }

    /// Adjacent-match test: separation within bounds, diagonal drift
    /// within the fixed-plus-proportional tolerance.
    fn belongs_to_run(&self, previous: &Match, next: &Match) -> bool {
        let reference_gap = next.reference_offset - previous.reference_end();
        let query_gap = next.query_offset - previous.query_end();
        let separation = reference_gap.max(query_gap);
        if separation > self.params.max_separation {
            return false;
        }
        let drift = previous.diagonal().abs_diff(next.diagonal());
        let tolerated = (self.params.fixed_diagonal_difference as f64)
            .max(self.params.separation_factor * separation as f64);
        drift as f64 <= tolerated
    }

    fn flush(&self, clusters: &mut Vec<Cluster>, run: Vec<Match>) {
        if run.is_empty() {
            return;
        }
        let cluster = Cluster::new(run);
        if cluster.total_match_length() >= self.params.min_cluster_length {
            clusters.push(cluster);
        }
    }
}

/// True when every match strictly precedes the next in both coordinates.
fn is_chain(matches: &[Match]) -> bool {
    matches.windows(2).all(|pair| pair[0].precedes(&pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissive() -> ClusterParams {
        ClusterParams {
            min_cluster_length: 0,
            ..ClusterParams::default()
        }
    }

    const REFERENCE: &[u8] = b"ACGTACGTACGT";
    const QUERY: &[u8] = b"ACGTACGT";

    #[test]
    fn colinear_chain_forms_one_cluster() {
        let builder = SyntenyBuilder::with_params(permissive());
        let matches = vec![
            Match::new(0, 0, 10),
            Match::new(12, 11, 10),
            Match::new(25, 24, 10),
        ];
        let synteny = builder.build(REFERENCE, QUERY, &matches);
        assert_eq!(synteny.len(), 1);
        assert_eq!(synteny.clusters()[0].len(), 3);
    }

    #[test]
    fn wide_separation_splits_clusters() {
        let builder = SyntenyBuilder::with_params(ClusterParams {
            max_separation: 50,
            min_cluster_length: 0,
            ..ClusterParams::default()
        });
        let matches = vec![Match::new(0, 0, 10), Match::new(200, 200, 10)];
        let synteny = builder.build(REFERENCE, QUERY, &matches);
        assert_eq!(synteny.len(), 2);
    }

    #[test]
    fn diagonal_jump_splits_clusters() {
        let builder = SyntenyBuilder::with_params(permissive());
        // Separation 45 tolerates drift max(5, 2.25) = 5; the jump is 40.
        let matches = vec![Match::new(0, 0, 20), Match::new(25, 65, 20)];
        let synteny = builder.build(REFERENCE, QUERY, &matches);
        assert_eq!(synteny.len(), 2);
    }

    #[test]
    fn proportional_tolerance_absorbs_small_drift() {
        let builder = SyntenyBuilder::with_params(ClusterParams {
            separation_factor: 0.5,
            min_cluster_length: 0,
            ..ClusterParams::default()
        });
        // Drift 10 against separation 30: tolerated at factor 0.5.
        let matches = vec![Match::new(0, 0, 20), Match::new(40, 50, 20)];
        let synteny = builder.build(REFERENCE, QUERY, &matches);
        assert_eq!(synteny.len(), 1);
    }

    #[test]
    fn short_clusters_are_dropped() {
        let builder = SyntenyBuilder::with_params(ClusterParams {
            min_cluster_length: 15,
            ..ClusterParams::default()
        });
        let matches = vec![Match::new(0, 0, 10), Match::new(2000, 2000, 20)];
        let synteny = builder.build(REFERENCE, QUERY, &matches);
        assert_eq!(synteny.len(), 1);
        assert_eq!(synteny.clusters()[0].total_match_length(), 20);
    }

    #[test]
    fn partition_covers_every_chained_match_exactly_once() {
        let builder = SyntenyBuilder::with_params(permissive());
        let matches = vec![
            Match::new(0, 0, 5),
            Match::new(6, 6, 5),
            Match::new(2000, 2000, 5),
            Match::new(2006, 2006, 5),
        ];
        let synteny = builder.build(REFERENCE, QUERY, &matches);
        let total: usize = synteny.clusters().iter().map(Cluster::len).sum();
        assert_eq!(total, matches.len());

        // Clusters ascend in reference coordinate and never interleave.
        for pair in synteny.clusters().windows(2) {
            assert!(pair[0].reference_range().1 <= pair[1].reference_range().0);
            assert!(pair[0].query_range().1 <= pair[1].query_range().0);
        }
    }

    #[test]
    fn unordered_input_is_rechained_internally() {
        let builder = SyntenyBuilder::with_params(permissive());
        let matches = vec![
            Match::new(12, 11, 10),
            Match::new(0, 0, 10),
            Match::new(5, 30, 2),
        ];
        let synteny = builder.build(REFERENCE, QUERY, &matches);
        assert_eq!(synteny.len(), 1);
        // The crossing two-symbol match is excluded by the chainer.
        assert_eq!(synteny.clusters()[0].len(), 2);
        assert_eq!(synteny.clusters()[0].matches()[0], Match::new(0, 0, 10));
    }
}
