//! End-to-end anchor alignment for one (reference, query) pair.
//!
//! Step flow: maximal exact matches, LIS chaining, synteny clustering.
//! Pairs are independent; running many pairs concurrently is safe.

use crate::cancel::{CancelToken, Progress};
use crate::lis;
use crate::matcher::{find_anchors_with_cancel, AnchorParams, MatchResult};
use crate::synteny::{ClusterParams, SyntenyBuilder};
use crate::types::Synteny;

/// Combined configuration for one alignment run.
#[derive(Debug, Clone, Default)]
pub struct AlignerParams {
    pub anchor: AnchorParams,
    pub cluster: ClusterParams,
}

/// Anchor-based aligner producing ordered synteny output.
#[derive(Debug, Clone, Default)]
pub struct SyntenyAligner {
    params: AlignerParams,
}

impl SyntenyAligner {
    pub fn new(params: AlignerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AlignerParams {
        &self.params
    }

    /// Align the query against the reference.
    pub fn align<'a>(&self, reference: &'a [u8], query: &'a [u8]) -> MatchResult<Synteny<'a>> {
        match self.align_with_cancel(reference, query, &CancelToken::new())? {
            Progress::Finished(synteny) => Ok(synteny),
            Progress::Cancelled => unreachable!("fresh token is never cancelled"),
        }
    }

    /// Cancellable variant of [`SyntenyAligner::align`].
    pub fn align_with_cancel<'a>(
        &self,
        reference: &'a [u8],
        query: &'a [u8],
        cancel: &CancelToken,
    ) -> MatchResult<Progress<Synteny<'a>>> {
        let anchors =
            match find_anchors_with_cancel(reference, query, &self.params.anchor, cancel)? {
                Progress::Finished(anchors) => anchors,
                Progress::Cancelled => return Ok(Progress::Cancelled),
            };
        let chained = lis::chain(&anchors);
        log::debug!(
            "alignment: {} anchors, {} chained",
            anchors.len(),
            chained.len()
        );
        let synteny =
            SyntenyBuilder::with_params(self.params.cluster.clone()).build(reference, query, &chained);
        Ok(Progress::Finished(synteny))
    }
}
