// Pipeline processing: normalization, freshness resolution and the three table transforms

pub mod dedupe;
pub mod games;
pub mod linescore;
pub mod normalize;
pub mod runner_play;

use rayon::prelude::*;

use crate::types::TableStats;

/// Knobs shared by every transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingOptions {
    /// Run independent groups (one game, one play) on the rayon pool
    pub parallel: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Finished records for one destination table plus the counters that produced them
#[derive(Debug, Clone)]
pub struct TableOutput<T> {
    pub records: Vec<T>,
    pub stats: TableStats,
}

/// Apply `f` to every group, keeping group order in the result.
pub(crate) fn map_groups<G, O, F>(groups: Vec<G>, options: ProcessingOptions, f: F) -> Vec<O>
where
    G: Send,
    O: Send,
    F: Fn(G) -> O + Sync + Send,
{
    if options.parallel {
        groups.into_par_iter().map(f).collect()
    } else {
        groups.into_iter().map(f).collect()
    }
}
