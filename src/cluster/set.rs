use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::traits::ClusterDistance;
use crate::data::Dataset;
use crate::error::{Error, Result};

/// A set of example indices.
///
/// Clusters are built once and then shared between dendrogram levels through
/// `Arc<Cluster>`; merging never mutates either input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cluster {
    members: BTreeSet<usize>,
}

impl Cluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cluster holding a single example.
    pub fn singleton(index: usize) -> Self {
        let mut c = Self::new();
        c.add(index);
        c
    }

    /// Add an example index. Adding an index twice has no effect.
    pub fn add(&mut self, index: usize) {
        self.members.insert(index);
    }

    /// Number of examples in the cluster.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the cluster has no examples.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `index` belongs to the cluster.
    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }

    /// Member indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().copied()
    }

    /// Largest member index, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.members.last().copied()
    }

    /// A new cluster holding the union of `self` and `other`.
    pub fn merge(&self, other: &Cluster) -> Cluster {
        let mut members = self.members.clone();
        members.extend(other.members.iter().copied());
        Cluster { members }
    }
}

impl FromIterator<usize> for Cluster {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (k, i) in self.iter().enumerate() {
            if k > 0 {
                write!(f, ",")?;
            }
            write!(f, "{i}")?;
        }
        write!(f, "}}")
    }
}

/// One level of the hierarchy: a fixed-capacity collection of disjoint clusters.
#[derive(Debug, Clone)]
pub struct ClusterSet {
    clusters: Vec<Arc<Cluster>>,
    capacity: usize,
}

impl ClusterSet {
    /// Create an empty level that can hold `capacity` clusters.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            clusters: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// The all-singletons level for `n` examples, in index order.
    pub fn singletons(n: usize) -> Self {
        Self {
            clusters: (0..n).map(|i| Arc::new(Cluster::singleton(i))).collect(),
            capacity: n,
        }
    }

    /// Append a cluster.
    ///
    /// Adding the same cluster object again is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::ClusterSetFull`] if the level is already at capacity.
    pub fn add(&mut self, cluster: Arc<Cluster>) -> Result<()> {
        if self.clusters.iter().any(|c| Arc::ptr_eq(c, &cluster)) {
            return Ok(());
        }
        if self.clusters.len() >= self.capacity {
            return Err(Error::ClusterSetFull {
                capacity: self.capacity,
            });
        }
        self.clusters.push(cluster);
        Ok(())
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether the level has no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cluster at position `i`.
    pub fn get(&self, i: usize) -> Option<&Arc<Cluster>> {
        self.clusters.get(i)
    }

    /// Clusters in position order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Cluster>> {
        self.clusters.iter()
    }

    /// Total number of example indices across all clusters.
    pub fn n_members(&self) -> usize {
        self.clusters.iter().map(|c| c.len()).sum()
    }

    /// Positions `(i, j)`, `i < j`, of the closest pair and their distance.
    ///
    /// Pairs are scanned in ascending `(i, j)` order and a pair only replaces the
    /// current best when strictly closer, so ties go to the first pair seen.
    ///
    /// # Errors
    ///
    /// [`Error::ClusterSetTooSmall`] with fewer than two clusters; any error from the
    /// distance strategy.
    pub fn closest_pair(
        &self,
        strategy: &dyn ClusterDistance,
        data: &Dataset,
    ) -> Result<(usize, usize, f64)> {
        let k = self.clusters.len();
        if k < 2 {
            return Err(Error::ClusterSetTooSmall { len: k });
        }

        let mut best = (0, 1, f64::INFINITY);
        for i in 0..k {
            for j in (i + 1)..k {
                let d = strategy.distance(&self.clusters[i], &self.clusters[j], data)?;
                if d < best.2 {
                    best = (i, j, d);
                }
            }
        }
        Ok(best)
    }

    /// The next level: clusters `i` and `j` replaced by their union.
    ///
    /// The merged cluster takes position `min(i, j)`; every other cluster is carried
    /// over by reference, in order.
    pub fn merge_pair(&self, i: usize, j: usize) -> Result<ClusterSet> {
        let k = self.clusters.len();
        if k < 2 {
            return Err(Error::ClusterSetTooSmall { len: k });
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        if i == j || j >= k {
            return Err(Error::InvalidIndex {
                index: j as i64,
                n_items: k,
            });
        }

        let merged = Arc::new(self.clusters[i].merge(&self.clusters[j]));
        let mut next = ClusterSet::with_capacity(k - 1);
        for (pos, cluster) in self.clusters.iter().enumerate() {
            if pos == i {
                next.add(Arc::clone(&merged))?;
            } else if pos != j {
                next.add(Arc::clone(cluster))?;
            }
        }
        Ok(next)
    }

    /// Find the closest pair under `strategy` and merge it.
    pub fn merge_closest(
        &self,
        strategy: &dyn ClusterDistance,
        data: &Dataset,
    ) -> Result<ClusterSet> {
        let (i, j, _) = self.closest_pair(strategy, data)?;
        self.merge_pair(i, j)
    }

    /// Whether the clusters are pairwise disjoint and cover exactly `[0, n)`.
    pub fn is_partition_of(&self, n: usize) -> bool {
        let mut seen = vec![false; n];
        for cluster in &self.clusters {
            for i in cluster.iter() {
                if i >= n || seen[i] {
                    return false;
                }
                seen[i] = true;
            }
        }
        seen.into_iter().all(|s| s)
    }
}

impl PartialEq for ClusterSet {
    fn eq(&self, other: &Self) -> bool {
        self.clusters == other.clusters
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a Arc<Cluster>;
    type IntoIter = std::slice::Iter<'a, Arc<Cluster>>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

impl fmt::Display for ClusterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, c) in self.clusters.iter().enumerate() {
            if k > 0 {
                write!(f, " ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::linkage::SingleLink;

    #[test]
    fn test_cluster_add_is_idempotent() {
        let mut c = Cluster::new();
        c.add(3);
        c.add(1);
        c.add(3);
        assert_eq!(c.len(), 2);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let a: Cluster = [0, 4].into_iter().collect();
        let b = Cluster::singleton(2);
        let m = a.merge(&b);
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![0, 2, 4]);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_add_same_object_is_noop_and_capacity_enforced() {
        let mut set = ClusterSet::with_capacity(1);
        assert_eq!(set.capacity(), 1);
        assert_eq!(set.n_members(), 0);
        let c = Arc::new(Cluster::singleton(0));
        set.add(Arc::clone(&c)).unwrap();
        set.add(Arc::clone(&c)).unwrap();
        assert_eq!(set.len(), 1);

        let err = set.add(Arc::new(Cluster::singleton(1))).unwrap_err();
        assert!(matches!(err, Error::ClusterSetFull { capacity: 1 }));
    }

    #[test]
    fn test_merge_pair_shares_unmerged_clusters() {
        let level = ClusterSet::singletons(4);
        let next = level.merge_pair(1, 3).unwrap();

        assert_eq!(next.len(), 3);
        assert_eq!(next.to_string(), "{0} {1,3} {2}");
        assert!(Arc::ptr_eq(next.get(0).unwrap(), level.get(0).unwrap()));
        assert!(Arc::ptr_eq(next.get(2).unwrap(), level.get(2).unwrap()));
        assert!(next.is_partition_of(4));
    }

    #[test]
    fn test_closest_pair_prefers_first_tie() {
        let data = Dataset::from_rows(vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]]);
        let level = ClusterSet::singletons(4);
        let (i, j, d) = level.closest_pair(&SingleLink, &data).unwrap();
        assert_eq!((i, j), (0, 1));
        assert_eq!(d, 1.0);
    }

    #[test]
    fn test_merge_closest_joins_the_nearest_pair() {
        let data = Dataset::from_rows(vec![vec![0.0], vec![5.0], vec![9.0], vec![5.5]]);
        let level = ClusterSet::singletons(4);
        let next = level.merge_closest(&SingleLink, &data).unwrap();

        assert_eq!(next.to_string(), "{0} {1,3} {2}");
        assert_eq!(next.capacity(), 3);
        assert_eq!(next.n_members(), 4);
        assert!(Arc::ptr_eq(next.get(2).unwrap(), level.get(2).unwrap()));

        let last = next
            .merge_closest(&SingleLink, &data)
            .and_then(|s| s.merge_closest(&SingleLink, &data))
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last.n_members(), 4);
        assert!(matches!(
            last.merge_closest(&SingleLink, &data),
            Err(Error::ClusterSetTooSmall { len: 1 })
        ));
    }

    #[test]
    fn test_closest_pair_too_small() {
        let data = Dataset::from_rows(vec![vec![0.0]]);
        let level = ClusterSet::singletons(1);
        assert!(matches!(
            level.closest_pair(&SingleLink, &data),
            Err(Error::ClusterSetTooSmall { len: 1 })
        ));
    }

    #[test]
    fn test_partition_check_detects_overlap_and_gaps() {
        let mut set = ClusterSet::with_capacity(2);
        set.add(Arc::new([0, 1].into_iter().collect())).unwrap();
        set.add(Arc::new([1, 2].into_iter().collect())).unwrap();
        assert!(!set.is_partition_of(3));

        let mut gap = ClusterSet::with_capacity(1);
        gap.add(Arc::new(Cluster::singleton(0))).unwrap();
        assert!(!gap.is_partition_of(2));
    }
}
