//! De Bruijn graph construction.
//!
//! One node per distinct k-mer, held in an arena indexed by `NodeId` with a
//! packed-kmer lookup table on the side. Adjacency is explicit: an edge
//! A -> B exists when the last k-1 symbols of A equal the first k-1 symbols
//! of B and at least one input occurrence attests that adjacency.
//! Construction is additive and order-independent; the same input always
//! yields an isomorphic graph.

use fnv::FnvHashMap;
use rayon::prelude::*;
use thiserror::Error;

use crate::kmer::{unpack_kmer, KmerIndex, PackedKmer, MAX_K};

/// Arena index of a graph node.
pub type NodeId = u32;

/// Errors indicating a violated graph invariant. Always fatal: a corrupted
/// partial graph is never returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph inconsistency: {0}")]
    Inconsistency(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// A single k-mer node with its coverage and adjacency.
#[derive(Debug, Clone)]
pub struct DeBruijnNode {
    kmer: PackedKmer,
    coverage: u32,
    deleted: bool,
    predecessors: Vec<NodeId>,
    successors: Vec<NodeId>,
}

impl DeBruijnNode {
    pub fn kmer(&self) -> PackedKmer {
        self.kmer
    }

    /// Number of occurrences of this k-mer across all input.
    pub fn coverage(&self) -> u32 {
        self.coverage
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// The assembly graph. Mutable while building and simplifying; treated as
/// read-only once contig extraction starts.
#[derive(Debug, Clone)]
pub struct DeBruijnGraph {
    k: usize,
    nodes: Vec<DeBruijnNode>,
    lookup: FnvHashMap<PackedKmer, NodeId>,
    live_count: usize,
}

impl DeBruijnGraph {
    /// Build the graph from a k-mer index.
    ///
    /// Node ids are assigned in ascending packed-kmer order, so identical
    /// input yields identical ids. Link generation probes the four
    /// possible left and four possible right neighbor k-mers of every node
    /// and keeps only adjacencies attested by consecutive occurrences in
    /// some input sequence; each node writes only its own adjacency, so
    /// the probe loop runs in parallel.
    pub fn from_index(index: &KmerIndex) -> Self {
        let k = index.k();
        debug_assert!(k >= 1 && k <= MAX_K);

        let kmers = index.sorted_kmers();
        let mut lookup =
            FnvHashMap::with_capacity_and_hasher(kmers.len(), Default::default());
        let mut nodes = Vec::with_capacity(kmers.len());
        for (id, &kmer) in kmers.iter().enumerate() {
            lookup.insert(kmer, id as NodeId);
            let occurrences = index.occurrences(kmer).len();
            nodes.push(DeBruijnNode {
                kmer,
                coverage: u32::try_from(occurrences).unwrap_or(u32::MAX),
                deleted: false,
                predecessors: Vec::new(),
                successors: Vec::new(),
            });
        }

        let mask = if k == MAX_K {
            u64::MAX
        } else {
            (1u64 << (2 * k)) - 1
        };
        let shift = 2 * (k - 1);
        nodes.par_iter_mut().for_each(|node| {
            // Right neighbors: drop the first symbol, append each base.
            let stem = (node.kmer << 2) & mask;
            for base in 0..4u64 {
                let candidate = stem | base;
                if let Some(&other) = lookup.get(&candidate) {
                    if attested_adjacency(index, node.kmer, candidate) {
                        node.successors.push(other);
                    }
                }
            }
            // Left neighbors: drop the last symbol, prepend each base.
            let stem = node.kmer >> 2;
            for base in 0..4u64 {
                let candidate = (base << shift) | stem;
                if let Some(&other) = lookup.get(&candidate) {
                    if attested_adjacency(index, candidate, node.kmer) {
                        node.predecessors.push(other);
                    }
                }
            }
        });

        let live_count = nodes.len();
        Self {
            k,
            nodes,
            lookup,
            live_count,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of live (not deleted) nodes.
    pub fn node_count(&self) -> usize {
        self.live_count
    }

    /// Arena capacity, counting tombstones.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&DeBruijnNode> {
        self.nodes.get(id as usize)
    }

    /// Look up the live node holding the given k-mer symbols.
    pub fn find_node(&self, kmer: &[u8]) -> Option<NodeId> {
        if kmer.len() != self.k {
            return None;
        }
        let packed = crate::kmer::pack_kmer(kmer)?;
        let id = *self.lookup.get(&packed)?;
        if self.nodes[id as usize].deleted {
            None
        } else {
            Some(id)
        }
    }

    /// Ids of all live nodes, ascending.
    pub fn live_node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.deleted)
            .map(|(id, _)| id as NodeId)
            .collect()
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &DeBruijnNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.deleted)
            .map(|(id, n)| (id as NodeId, n))
    }

    /// Live successors of a node (deleted neighbors are skipped).
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id as usize]
            .successors
            .iter()
            .copied()
            .filter(|&n| !self.nodes[n as usize].deleted)
            .collect()
    }

    /// Live predecessors of a node (deleted neighbors are skipped).
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id as usize]
            .predecessors
            .iter()
            .copied()
            .filter(|&n| !self.nodes[n as usize].deleted)
            .collect()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.nodes[id as usize]
            .successors
            .iter()
            .filter(|&&n| !self.nodes[n as usize].deleted)
            .count()
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.nodes[id as usize]
            .predecessors
            .iter()
            .filter(|&&n| !self.nodes[n as usize].deleted)
            .count()
    }

    /// A tip is a live dead end: in-degree or out-degree zero.
    pub fn is_tip(&self, id: NodeId) -> bool {
        !self.nodes[id as usize].deleted
            && (self.in_degree(id) == 0 || self.out_degree(id) == 0)
    }

    /// Tombstone every listed node in one batch; returns how many were
    /// actually removed (already-deleted ids are ignored).
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> usize {
        let mut removed = 0;
        for &id in ids {
            let node = &mut self.nodes[id as usize];
            if !node.deleted {
                node.deleted = true;
                removed += 1;
            }
        }
        self.live_count -= removed;
        removed
    }

    /// Sum of coverage over live nodes.
    pub fn coverage_total(&self) -> u64 {
        self.live_nodes().map(|(_, n)| n.coverage as u64).sum()
    }

    /// Mean coverage over live nodes, 0.0 for a drained graph.
    pub fn mean_coverage(&self) -> f64 {
        if self.live_count == 0 {
            0.0
        } else {
            self.coverage_total() as f64 / self.live_count as f64
        }
    }

    /// Symbols of the node's k-mer.
    pub fn node_sequence(&self, id: NodeId) -> Vec<u8> {
        unpack_kmer(self.nodes[id as usize].kmer, self.k)
    }

    /// Check structural invariants: every adjacency entry must reference a
    /// slot inside the arena. A failure indicates a construction defect
    /// and aborts the caller's operation.
    pub fn validate(&self) -> GraphResult<()> {
        let len = self.nodes.len() as u32;
        for (id, node) in self.nodes.iter().enumerate() {
            for &edge in node.successors.iter().chain(node.predecessors.iter()) {
                if edge >= len {
                    return Err(GraphError::Inconsistency(format!(
                        "node {id} references missing node {edge}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// True when some input sequence contains `left` immediately followed by
/// `right` (occurrence offsets differing by one).
fn attested_adjacency(index: &KmerIndex, left: PackedKmer, right: PackedKmer) -> bool {
    index.occurrences(left).iter().any(|occ| {
        occ.offset
            .checked_add(1)
            .is_some_and(|next| index.attests(right, occ.sequence, next))
    })
}
