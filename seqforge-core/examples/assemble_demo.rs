//! Assemble a small simulated read set, then align the result back
//! against the original genome.
//!
//! Run with: cargo run --example assemble_demo

use anyhow::Result;
use seqforge_core::{
    AlignerParams, AnchorParams, Assembler, AssemblyParams, ClusterParams, SyntenyAligner,
};

const GENOME: &[u8] = b"TTTCCTCATGCAATTCAAAACCATGTCCGTAATGTAGGCGAAATAGTAAACCATTTTACGGAGGATACCAAATTCCTCCTTATTCAGGACCTAACCTGAGGTAAACCAGGTCTCTCCGCCCCCTTATAAAAGCTGTTGCACCTAGCCAAG";

fn main() -> Result<()> {
    env_logger::init();

    // Simulated shotgun reads: 40 bp windows, 10 bp stride.
    let reads: Vec<Vec<u8>> = GENOME.windows(40).step_by(10).map(|w| w.to_vec()).collect();
    let read_refs: Vec<&[u8]> = reads.iter().map(Vec::as_slice).collect();

    let assembler = Assembler::new(AssemblyParams {
        k: 15,
        allow_erosion: false,
        dangling_link_threshold: 0,
        ..AssemblyParams::default()
    });
    let assembly = assembler.assemble(&read_refs)?;

    println!(
        "assembled {} contig(s) from {} reads ({} -> {} graph nodes)",
        assembly.contigs.len(),
        reads.len(),
        assembly.nodes_before_simplification,
        assembly.nodes_after_simplification,
    );
    println!("pass reports: {}", serde_json::to_string(&assembly.pass_reports)?);

    // Align the longest contig back against the genome.
    let contig = assembly
        .contigs
        .iter()
        .max_by_key(|c| c.len())
        .expect("at least one contig");
    let aligner = SyntenyAligner::new(AlignerParams {
        anchor: AnchorParams {
            min_match_length: 20,
        },
        cluster: ClusterParams::default(),
    });
    let synteny = aligner.align(GENOME, &contig.sequence)?;

    for (i, cluster) in synteny.clusters().iter().enumerate() {
        let (ref_start, ref_end) = cluster.reference_range();
        let (query_start, query_end) = cluster.query_range();
        println!(
            "cluster {i}: reference {ref_start}..{ref_end} ~ contig {query_start}..{query_end} ({} matched)",
            cluster.total_match_length(),
        );
    }
    Ok(())
}
