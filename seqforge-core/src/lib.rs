//! SeqForge Core Library
//!
//! Two engines over in-memory symbol sequences: a de Bruijn graph
//! assembler with pluggable simplification passes, and an anchor-based
//! aligner that finds maximal exact matches, chains them into a colinear
//! skeleton, and groups the chain into ordered synteny clusters.

pub mod aligner;
pub mod assembler;
pub mod cancel;
pub mod contig;
pub mod graph;
pub mod kmer;
pub mod lis;
pub mod matcher;
pub mod simplify;
pub mod synteny;
pub mod types;

// Re-export commonly used types and functions
pub use aligner::{AlignerParams, SyntenyAligner};
pub use assembler::{Assembler, Assembly, AssemblyError, AssemblyParams};
pub use cancel::{CancelToken, Progress};
pub use contig::{extract_contigs, Contig};
pub use graph::{DeBruijnGraph, GraphError, NodeId};
pub use kmer::{KmerError, KmerIndex, KmerOccurrence, MAX_K};
pub use matcher::{find_anchors, AnchorParams, MatchError, PatternIndex};
pub use simplify::{DanglingLinkPurger, EndEroder, PassReport, SimplifyPass, SimplifyPipeline};
pub use synteny::{ClusterParams, SyntenyBuilder};
pub use types::{Cluster, Match, SeqPos, Synteny};

/// Version information for the SeqForge core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
