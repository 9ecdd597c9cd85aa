//! Hierarchical agglomerative clustering.
//!
//! Agglomerative clustering starts from one singleton cluster per example and
//! repeatedly merges the two closest clusters. Recording every intermediate partition
//! gives a [`Dendrogram`]: level 0 is all singletons, level `k` has `n - k` clusters.
//!
//! ## Cluster distance
//!
//! "Closest" depends on the linkage:
//!
//! - **single**: closest pair of members. Follows thin chains of points.
//! - **complete**: farthest pair of members. Compact, similarly sized clusters.
//! - **average**: mean member distance (UPGMA).
//! - **weighted average**: WPGMA, both merged halves weigh the same.
//! - **centroid** / **median**: distance between (weighted) centroids.
//! - **ward**: smallest increase in within-cluster variance.
//!
//! Single and average linkage are computed by scanning the cross product of the two
//! clusters ([`ClusterDistance`]). Every linkage also has a Lance–Williams form
//! ([`LanceWilliams`]) that derives the distance of a merged cluster from distances
//! that are already known, so the raw examples are only read once.
//!
//! ## Tie-breaking
//!
//! Pairs are scanned in ascending `(i, j)` position order and only a strictly smaller
//! distance replaces the current best. Mining is therefore deterministic, and when two
//! pairs are equally close the one found first is merged.
//!
//! ## Usage
//!
//! ```rust
//! use dendro::cluster::{Agglomerative, Linkage};
//! use dendro::Dataset;
//!
//! let data = Dataset::from_rows(vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ]);
//!
//! let dendrogram = Agglomerative::new(Linkage::Single).mine(&data, 3).unwrap();
//! assert_eq!(dendrogram.depth(), 3);
//! assert_eq!(dendrogram.last().unwrap().len(), 2);
//! ```

mod dendrogram;
mod linkage;
mod miner;
mod set;
mod traits;
mod util;

pub use dendrogram::Dendrogram;
pub use linkage::{
    AverageLink, CentroidLink, CompleteLink, Linkage, MedianLink, SingleLink, WardLink,
    WeightedAverageLink,
};
pub use miner::{mine, mine_recurrence, Agglomerative};
pub use set::{Cluster, ClusterSet};
pub use traits::{ClusterDistance, LanceWilliams, Merge};
