//! Contig extraction from a simplified graph.
//!
//! Walks maximal unbranched chains of the frozen graph; every chain
//! decodes to one contig. Pure reads over the graph, deterministic
//! (chains start from the lowest eligible node id).

use serde::{Deserialize, Serialize};

use crate::graph::{DeBruijnGraph, NodeId};

/// One assembled contiguous sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contig {
    pub sequence: Vec<u8>,
    /// Mean node coverage along the chain.
    pub mean_coverage: f64,
}

impl Contig {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// True when the chain through `id` continues uniquely from its
/// predecessor: exactly one live predecessor, which itself has exactly one
/// live successor.
fn continues_from_predecessor(graph: &DeBruijnGraph, id: NodeId) -> bool {
    let preds = graph.predecessors(id);
    preds.len() == 1 && graph.out_degree(preds[0]) == 1
}

/// Extract all contigs from a simplified graph.
///
/// Chain starts are nodes where the unbranched run cannot be extended to
/// the left; remaining unvisited nodes belong to simple cycles, which are
/// emitted once each.
pub fn extract_contigs(graph: &DeBruijnGraph) -> Vec<Contig> {
    let mut visited = vec![false; graph.arena_len()];
    let mut contigs = Vec::new();

    for (id, _) in graph.live_nodes() {
        if visited[id as usize] || continues_from_predecessor(graph, id) {
            continue;
        }
        contigs.push(walk_chain(graph, id, &mut visited));
    }

    // Whatever is left lives on cycles with no chain start.
    for (id, _) in graph.live_nodes() {
        if !visited[id as usize] {
            contigs.push(walk_chain(graph, id, &mut visited));
        }
    }

    contigs
}

fn walk_chain(graph: &DeBruijnGraph, start: NodeId, visited: &mut [bool]) -> Contig {
    let mut sequence = graph.node_sequence(start);
    let mut coverage_sum = graph.node(start).unwrap().coverage() as u64;
    let mut nodes = 1u64;
    visited[start as usize] = true;

    let mut current = start;
    loop {
        if graph.out_degree(current) != 1 {
            break;
        }
        let next = graph.successors(current)[0];
        if visited[next as usize] || graph.in_degree(next) != 1 {
            break;
        }
        visited[next as usize] = true;
        // Each extension appends exactly one symbol: the last base of the
        // next node's k-mer.
        let next_kmer = graph.node_sequence(next);
        sequence.push(*next_kmer.last().expect("k >= 1"));
        coverage_sum += graph.node(next).unwrap().coverage() as u64;
        nodes += 1;
        current = next;
    }

    Contig {
        sequence,
        mean_coverage: coverage_sum as f64 / nodes as f64,
    }
}
