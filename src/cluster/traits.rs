use super::set::Cluster;
use crate::data::Dataset;
use crate::error::Result;

/// Distance between two clusters computed directly from their examples.
pub trait ClusterDistance: Send + Sync {
    /// Distance between `a` and `b` over `data`.
    ///
    /// Implementations must be symmetric in `a` and `b`.
    fn distance(&self, a: &Cluster, b: &Cluster, data: &Dataset) -> Result<f64>;
}

/// Inputs of one Lance–Williams update.
///
/// Clusters `x` and `y` are about to merge; `i` is any third cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// `d(x, i)`.
    pub dxi: f64,
    /// `d(y, i)`.
    pub dyi: f64,
    /// `d(x, y)`.
    pub dxy: f64,
    /// `|x|`.
    pub nx: usize,
    /// `|y|`.
    pub ny: usize,
    /// `|i|`.
    pub ni: usize,
}

/// Distance of a freshly merged cluster expressed from previously known distances.
pub trait LanceWilliams: Send + Sync {
    /// `d(x ∪ y, i)` from the distances and sizes in `m`.
    fn update(&self, m: &Merge) -> f64;
}
