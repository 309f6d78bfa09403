//! Graph simplification passes.
//!
//! Each pass operates on the graph and reports how many nodes it removed;
//! passes compose into an ordered pipeline applied until the graph
//! stabilizes. Erosion of low-coverage ends and dangling-link purging are
//! the two stock passes.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::{CancelToken, Progress};
use crate::graph::{DeBruijnGraph, NodeId};

/// A topology-cleanup pass: operate on the graph, report nodes removed.
pub trait SimplifyPass {
    fn name(&self) -> &'static str;

    /// Run the pass to convergence and return the total node count removed.
    fn run(&self, graph: &mut DeBruijnGraph) -> usize;
}

/// Outcome of one pass application inside a pipeline sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass: String,
    pub removed: usize,
}

/// Removes tips (dead-end nodes) whose coverage is strictly below the
/// threshold, in synchronized rounds: tips are evaluated against the graph
/// as it stood at the start of the round and removed as one atomic batch,
/// so results are independent of visitation order within a round.
#[derive(Debug, Clone)]
pub struct EndEroder {
    threshold: u32,
}

impl EndEroder {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Erode to convergence, returning the node count removed per round.
    /// A round that removes nothing signals convergence and is not
    /// reported. Idempotent at a fixed threshold; threshold 0 removes
    /// nothing (coverage is always at least 1).
    pub fn erode_rounds(&self, graph: &mut DeBruijnGraph) -> Vec<usize> {
        match self.erode_rounds_with_cancel(graph, &CancelToken::new()) {
            Progress::Finished(rounds) => rounds,
            Progress::Cancelled => unreachable!("fresh token is never cancelled"),
        }
    }

    /// Cancellable variant of [`EndEroder::erode_rounds`]; the token is
    /// checked between rounds, so a cancelled erosion leaves the graph in
    /// the consistent state produced by the last completed round.
    pub fn erode_rounds_with_cancel(
        &self,
        graph: &mut DeBruijnGraph,
        cancel: &CancelToken,
    ) -> Progress<Vec<usize>> {
        let mut rounds = Vec::new();
        let started_populated = graph.node_count() > 0;
        loop {
            if cancel.is_cancelled() {
                return Progress::Cancelled;
            }
            let snapshot: &DeBruijnGraph = graph;
            let candidates = snapshot.live_node_ids();
            let marked: Vec<NodeId> = candidates
                .par_iter()
                .copied()
                .filter(|&id| {
                    snapshot.is_tip(id)
                        && snapshot.node(id).unwrap().coverage() < self.threshold
                })
                .collect();
            if marked.is_empty() {
                break;
            }
            let removed = graph.remove_nodes(&marked);
            rounds.push(removed);
        }
        if started_populated && graph.node_count() == 0 {
            log::warn!(
                "erosion at threshold {} removed every node in the graph",
                self.threshold
            );
        }
        Progress::Finished(rounds)
    }
}

impl SimplifyPass for EndEroder {
    fn name(&self) -> &'static str {
        "end-eroder"
    }

    fn run(&self, graph: &mut DeBruijnGraph) -> usize {
        self.erode_rounds(graph).iter().sum()
    }
}

/// Removes dangling links: unbranched paths hanging off the graph that end
/// in a tip and are shorter than the length threshold. Such spurs are
/// typically caused by errors near read ends.
#[derive(Debug, Clone)]
pub struct DanglingLinkPurger {
    length_threshold: usize,
}

impl DanglingLinkPurger {
    pub fn new(length_threshold: usize) -> Self {
        Self { length_threshold }
    }

    /// Trace the unbranched path that ends at `tip`, walking against the
    /// dead direction, up to the length threshold. Returns the path when
    /// it is a removable spur, longest node first.
    fn trace_spur(&self, graph: &DeBruijnGraph, tip: NodeId) -> Option<Vec<NodeId>> {
        let forward = graph.in_degree(tip) == 0;
        let mut path = vec![tip];
        let mut current = tip;
        loop {
            if path.len() > self.length_threshold {
                // Too long to be an error artifact; keep it.
                return None;
            }
            let next = if forward {
                graph.successors(current)
            } else {
                graph.predecessors(current)
            };
            if next.len() != 1 {
                // Reached a dead end (isolated island) or a junction.
                return Some(path);
            }
            let next = next[0];
            let branches = if forward {
                graph.in_degree(next)
            } else {
                graph.out_degree(next)
            };
            if branches > 1 {
                // `next` belongs to the main body; the spur stops here.
                return Some(path);
            }
            path.push(next);
            current = next;
        }
    }
}

impl SimplifyPass for DanglingLinkPurger {
    fn name(&self) -> &'static str {
        "dangling-link-purger"
    }

    fn run(&self, graph: &mut DeBruijnGraph) -> usize {
        let mut removed_total = 0;
        loop {
            let snapshot: &DeBruijnGraph = graph;
            let tips: Vec<NodeId> = snapshot
                .live_node_ids()
                .into_iter()
                .filter(|&id| snapshot.is_tip(id))
                .collect();
            let mut marked: Vec<NodeId> = tips
                .par_iter()
                .filter_map(|&tip| self.trace_spur(snapshot, tip))
                .flatten()
                .collect();
            marked.sort_unstable();
            marked.dedup();
            if marked.is_empty() {
                break;
            }
            let removed = graph.remove_nodes(&marked);
            removed_total += removed;
            if removed == 0 {
                break;
            }
        }
        removed_total
    }
}

/// Ordered list of passes applied until a full sweep removes zero nodes.
#[derive(Default)]
pub struct SimplifyPipeline {
    passes: Vec<Box<dyn SimplifyPass + Send + Sync>>,
}

impl SimplifyPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, pass: Box<dyn SimplifyPass + Send + Sync>) -> Self {
        self.passes.push(pass);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Apply all passes in order, repeating until one full sweep removes
    /// nothing. Returns one report per pass application.
    pub fn run(&self, graph: &mut DeBruijnGraph) -> Vec<PassReport> {
        match self.run_with_cancel(graph, &CancelToken::new()) {
            Progress::Finished(reports) => reports,
            Progress::Cancelled => unreachable!("fresh token is never cancelled"),
        }
    }

    /// Cancellable variant of [`SimplifyPipeline::run`]; checked between
    /// passes.
    pub fn run_with_cancel(
        &self,
        graph: &mut DeBruijnGraph,
        cancel: &CancelToken,
    ) -> Progress<Vec<PassReport>> {
        let mut reports = Vec::new();
        if self.passes.is_empty() {
            return Progress::Finished(reports);
        }
        loop {
            let mut sweep_removed = 0;
            for pass in &self.passes {
                if cancel.is_cancelled() {
                    return Progress::Cancelled;
                }
                let removed = pass.run(graph);
                log::debug!("pass {} removed {} nodes", pass.name(), removed);
                sweep_removed += removed;
                reports.push(PassReport {
                    pass: pass.name().to_string(),
                    removed,
                });
            }
            if sweep_removed == 0 {
                break;
            }
        }
        Progress::Finished(reports)
    }
}
