//! End-to-end de novo assembly orchestration.
//!
//! Wires the phases together: k-mer indexing, graph construction, the
//! simplification pipeline, and contig extraction.

use thiserror::Error;

use crate::cancel::{CancelToken, Progress};
use crate::contig::{extract_contigs, Contig};
use crate::graph::{DeBruijnGraph, GraphError};
use crate::kmer::{KmerError, KmerIndex};
use crate::simplify::{DanglingLinkPurger, EndEroder, PassReport, SimplifyPipeline};

/// Errors surfaced by an assembly run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error(transparent)]
    Kmer(#[from] KmerError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Assembly configuration.
#[derive(Debug, Clone)]
pub struct AssemblyParams {
    /// K-mer length, 1..=32.
    pub k: usize,
    /// Allow erosion of low-coverage graph ends.
    pub allow_erosion: bool,
    /// Erosion coverage threshold; `None` estimates one from the graph's
    /// mean coverage.
    pub erosion_threshold: Option<u32>,
    /// Maximum dangling-link length to purge, in nodes.
    pub dangling_link_threshold: usize,
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            k: 15,
            allow_erosion: true,
            erosion_threshold: None,
            dangling_link_threshold: 16,
        }
    }
}

/// Result of one assembly run: contigs plus per-pass accounting.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub contigs: Vec<Contig>,
    pub pass_reports: Vec<PassReport>,
    pub nodes_before_simplification: usize,
    pub nodes_after_simplification: usize,
}

/// De Bruijn assembler over in-memory reads.
pub struct Assembler {
    params: AssemblyParams,
}

impl Assembler {
    pub fn new(params: AssemblyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AssemblyParams {
        &self.params
    }

    /// Assemble the reads into contigs.
    pub fn assemble(&self, sequences: &[&[u8]]) -> AssemblyResult<Assembly> {
        match self.assemble_with_cancel(sequences, &CancelToken::new())? {
            Progress::Finished(assembly) => Ok(assembly),
            Progress::Cancelled => unreachable!("fresh token is never cancelled"),
        }
    }

    /// Cancellable variant of [`Assembler::assemble`]. Input validation
    /// errors are reported before any work begins; cancellation aborts
    /// between phases and rounds without returning partial output.
    pub fn assemble_with_cancel(
        &self,
        sequences: &[&[u8]],
        cancel: &CancelToken,
    ) -> AssemblyResult<Progress<Assembly>> {
        let index = match KmerIndex::build_with_cancel(sequences, self.params.k, cancel)? {
            Progress::Finished(index) => index,
            Progress::Cancelled => return Ok(Progress::Cancelled),
        };
        log::debug!(
            "indexed {} distinct k-mers ({} occurrences)",
            index.len(),
            index.total_occurrences()
        );

        let mut graph = DeBruijnGraph::from_index(&index);
        graph.validate()?;
        let nodes_before = graph.node_count();
        log::debug!("graph built: {} nodes", nodes_before);

        let pipeline = self.build_pipeline(&graph);
        let pass_reports = match pipeline.run_with_cancel(&mut graph, cancel) {
            Progress::Finished(reports) => reports,
            Progress::Cancelled => return Ok(Progress::Cancelled),
        };
        let nodes_after = graph.node_count();
        log::debug!(
            "simplification done: {} -> {} nodes",
            nodes_before,
            nodes_after
        );

        let contigs = extract_contigs(&graph);
        Ok(Progress::Finished(Assembly {
            contigs,
            pass_reports,
            nodes_before_simplification: nodes_before,
            nodes_after_simplification: nodes_after,
        }))
    }

    fn build_pipeline(&self, graph: &DeBruijnGraph) -> SimplifyPipeline {
        let mut pipeline = SimplifyPipeline::new();
        if self.params.allow_erosion {
            let threshold = self
                .params
                .erosion_threshold
                .unwrap_or_else(|| estimate_erosion_threshold(graph));
            pipeline = pipeline.push(Box::new(EndEroder::new(threshold)));
        }
        if self.params.dangling_link_threshold > 0 {
            pipeline = pipeline.push(Box::new(DanglingLinkPurger::new(
                self.params.dangling_link_threshold,
            )));
        }
        pipeline
    }
}

/// Estimated erosion threshold: half the mean node coverage, rounded down.
/// Low-coverage data (mean below 2) disables erosion rather than eat into
/// genuine signal.
fn estimate_erosion_threshold(graph: &DeBruijnGraph) -> u32 {
    let mean = graph.mean_coverage();
    if mean < 2.0 {
        0
    } else {
        (mean / 2.0) as u32
    }
}
