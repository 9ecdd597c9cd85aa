use std::fmt;

use super::set::ClusterSet;
use crate::error::{Error, Result};

/// The levels of an agglomerative clustering, finest first.
///
/// Level 0 holds one singleton per example; level `i` is level `i - 1` with exactly
/// one pair of clusters merged. Unmerged clusters are shared between levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    levels: Vec<ClusterSet>,
}

impl Dendrogram {
    pub(crate) fn from_levels(levels: Vec<ClusterSet>) -> Self {
        debug_assert!(!levels.is_empty());
        Self { levels }
    }

    /// Number of levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Level `i`, if present.
    pub fn level(&self, i: usize) -> Option<&ClusterSet> {
        self.levels.get(i)
    }

    /// All levels, level 0 first.
    pub fn levels(&self) -> &[ClusterSet] {
        &self.levels
    }

    /// The coarsest level.
    pub fn last(&self) -> Option<&ClusterSet> {
        self.levels.last()
    }

    /// Number of examples the dendrogram was built over (the size of level 0).
    pub fn n_items(&self) -> usize {
        self.levels.first().map_or(0, ClusterSet::len)
    }

    /// Iterate levels, level 0 first.
    pub fn iter(&self) -> std::slice::Iter<'_, ClusterSet> {
        self.levels.iter()
    }

    /// Check the dendrogram can be served against a dataset of `n_examples`.
    ///
    /// Level 0 must not be larger than the dataset, level `i` must hold exactly
    /// `n_items() - i` clusters, and every level must partition `[0, n_items())`.
    pub fn validate(&self, n_examples: usize) -> Result<()> {
        let n = self.n_items();
        if n > n_examples {
            return Err(Error::InvalidDepth {
                requested: n as i64,
                n_items: n_examples,
            });
        }
        if self.depth() > n.max(1) {
            return Err(Error::InvalidDepth {
                requested: self.depth() as i64,
                n_items: n,
            });
        }
        for (i, level) in self.levels.iter().enumerate() {
            if level.len() != n - i {
                return Err(Error::Protocol(format!(
                    "level {i} has {} clusters, expected {}",
                    level.len(),
                    n - i
                )));
            }
            if !level.is_partition_of(n) {
                if let Some(bad) = level
                    .iter()
                    .filter_map(|c| c.max_index())
                    .find(|&m| m >= n_examples)
                {
                    return Err(Error::InvalidIndex {
                        index: bad as i64,
                        n_items: n_examples,
                    });
                }
                return Err(Error::Protocol(format!(
                    "level {i} is not a partition of the examples"
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Dendrogram {
    type Item = &'a ClusterSet;
    type IntoIter = std::slice::Iter<'a, ClusterSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.iter()
    }
}

impl fmt::Display for Dendrogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, level) in self.levels.iter().enumerate() {
            writeln!(f, "level {i}: {level}")?;
        }
        Ok(())
    }
}
