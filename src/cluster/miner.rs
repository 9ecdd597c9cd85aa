//! The agglomerative merge loop.

use tracing::{debug, trace};

use super::dendrogram::Dendrogram;
use super::linkage::Linkage;
use super::set::ClusterSet;
use super::traits::{ClusterDistance, LanceWilliams, Merge};
use super::util::DistanceMatrix;
use crate::data::Dataset;
use crate::error::{Error, Result};

fn check_depth(data: &Dataset, depth: usize) -> Result<()> {
    if depth == 0 || depth > data.len() {
        return Err(Error::InvalidDepth {
            requested: depth as i64,
            n_items: data.len(),
        });
    }
    Ok(())
}

/// Build a dendrogram of `depth` levels by rescanning examples at every level.
///
/// Each level costs O(k²) cluster comparisons, each of which is O(|a|·|b|) example
/// distances.
///
/// # Errors
///
/// - [`Error::InvalidDepth`] unless `1 <= depth <= data.len()`.
/// - [`Error::SizeMismatch`] if two compared examples differ in length.
pub fn mine(data: &Dataset, strategy: &dyn ClusterDistance, depth: usize) -> Result<Dendrogram> {
    check_depth(data, depth)?;

    let mut levels = Vec::with_capacity(depth);
    levels.push(ClusterSet::singletons(data.len()));

    for level in 1..depth {
        let prev = &levels[level - 1];
        let (i, j, d) = prev.closest_pair(strategy, data)?;
        trace!(level, i, j, distance = d, "merge");
        let next = prev.merge_pair(i, j)?;
        levels.push(next);
    }

    debug!(n_items = data.len(), depth, "mined dendrogram (direct)");
    Ok(Dendrogram::from_levels(levels))
}

/// Build a dendrogram of `depth` levels with Lance–Williams updates.
///
/// Pairwise example distances are computed once; afterwards every merge updates the
/// distances of the merged cluster in O(1) per remaining cluster. Pair selection uses
/// the same ascending `(i, j)`, first-strict-minimum rule as [`mine`].
pub fn mine_recurrence(
    data: &Dataset,
    strategy: &dyn LanceWilliams,
    depth: usize,
) -> Result<Dendrogram> {
    check_depth(data, depth)?;

    let mut levels = Vec::with_capacity(depth);
    levels.push(ClusterSet::singletons(data.len()));
    let mut dist = if depth > 1 {
        DistanceMatrix::from_dataset(data)?
    } else {
        DistanceMatrix::from_fn(0, |_, _| 0.0)
    };

    for level in 1..depth {
        let prev = &levels[level - 1];
        debug_assert_eq!(dist.len(), prev.len());
        let (x, y, dxy) = dist.argmin().ok_or(Error::ClusterSetTooSmall { len: prev.len() })?;
        trace!(level, i = x, j = y, distance = dxy, "merge");

        let size = |k: usize| prev.get(k).map_or(0, |c| c.len());
        let (nx, ny) = (size(x), size(y));

        // Old position of every cluster in the next level (y disappears, x holds the merge).
        let carried: Vec<usize> = (0..prev.len()).filter(|&k| k != y).collect();
        let merged_at = x;
        let next_dist = DistanceMatrix::from_fn(carried.len(), |a, b| {
            let (oa, ob) = (carried[a], carried[b]);
            if oa == merged_at || ob == merged_at {
                let oi = if oa == merged_at { ob } else { oa };
                strategy.update(&Merge {
                    dxi: dist.get(x, oi),
                    dyi: dist.get(y, oi),
                    dxy,
                    nx,
                    ny,
                    ni: size(oi),
                })
            } else {
                dist.get(oa, ob)
            }
        });

        let next = prev.merge_pair(x, y)?;
        levels.push(next);
        dist = next_dist;
    }

    debug!(n_items = data.len(), depth, "mined dendrogram (recurrence)");
    Ok(Dendrogram::from_levels(levels))
}

/// Agglomerative clustering with a chosen [`Linkage`].
///
/// Single- and average-link rescan examples by default; every other method runs on
/// Lance–Williams updates.
#[derive(Debug, Clone)]
pub struct Agglomerative {
    linkage: Linkage,
    recurrence: bool,
}

impl Agglomerative {
    /// Create a miner for `linkage`.
    pub fn new(linkage: Linkage) -> Self {
        Self {
            linkage,
            recurrence: false,
        }
    }

    /// Force the Lance–Williams path even when a direct scan is available.
    pub fn with_recurrence(mut self, recurrence: bool) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// The configured linkage.
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Build a dendrogram of `depth` levels over `data`.
    pub fn mine(&self, data: &Dataset, depth: usize) -> Result<Dendrogram> {
        match self.linkage {
            Linkage::Single | Linkage::Average if !self.recurrence => {
                let direct = self
                    .linkage
                    .direct()
                    .ok_or(Error::UnknownLinkage(self.linkage.id()))?;
                mine(data, direct, depth)
            }
            linkage => mine_recurrence(data, linkage.recurrence(), depth),
        }
    }
}

impl Default for Agglomerative {
    fn default() -> Self {
        Self::new(Linkage::Single)
    }
}
